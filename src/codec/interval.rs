//! Interval codec: durations to and from native interval structures.
//!
//! The native interval structure carries exactly one subtype out of thirteen
//! (single fields, YEAR TO MONTH, and the day/time spans). Encoding selects
//! the smallest subtype that represents the normalized duration exactly; a
//! value mixing year/month with day/time components has no native subtype
//! and is rejected. Some back-ends surface intervals as formatted text
//! instead; the text path lives here as well.

use crate::error::MisuseError;
use crate::value::Duration;

/// The thirteen native interval subtypes, in native code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum IntervalKind {
    Year = 1,
    Month = 2,
    Day = 3,
    Hour = 4,
    Minute = 5,
    Second = 6,
    YearToMonth = 7,
    DayToHour = 8,
    DayToMinute = 9,
    DayToSecond = 10,
    HourToMinute = 11,
    HourToSecond = 12,
    MinuteToSecond = 13,
}

impl IntervalKind {
    /// Map a native subtype code.
    pub fn from_code(code: i32) -> Option<IntervalKind> {
        use IntervalKind::*;
        Some(match code {
            1 => Year,
            2 => Month,
            3 => Day,
            4 => Hour,
            5 => Minute,
            6 => Second,
            7 => YearToMonth,
            8 => DayToHour,
            9 => DayToMinute,
            10 => DayToSecond,
            11 => HourToMinute,
            12 => HourToSecond,
            13 => MinuteToSecond,
            _ => return None,
        })
    }

    /// The native subtype code.
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// True for YEAR, MONTH and YEAR TO MONTH.
    pub fn is_year_month(&self) -> bool {
        matches!(
            self,
            IntervalKind::Year | IntervalKind::Month | IntervalKind::YearToMonth
        )
    }
}

/// Decoded form of the native interval structure.
///
/// All component fields are non-negative; `negative` carries the single sign
/// flag. `fraction` is in microseconds (fractional-second precision 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlInterval {
    pub kind: IntervalKind,
    pub negative: bool,
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub fraction: u32,
}

impl SqlInterval {
    /// Byte length of the ABI structure: type code, sign, and a five-field
    /// union, laid out with natural alignment.
    pub const WIRE_LEN: usize = 28;

    fn zero(kind: IntervalKind) -> SqlInterval {
        SqlInterval {
            kind,
            negative: false,
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
            second: 0,
            fraction: 0,
        }
    }

    /// Serialize into the ABI byte layout.
    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0..4].copy_from_slice(&self.kind.code().to_ne_bytes());
        bytes[4..6].copy_from_slice(&(self.negative as i16).to_ne_bytes());
        if self.kind.is_year_month() {
            bytes[8..12].copy_from_slice(&self.year.to_ne_bytes());
            bytes[12..16].copy_from_slice(&self.month.to_ne_bytes());
        } else {
            bytes[8..12].copy_from_slice(&self.day.to_ne_bytes());
            bytes[12..16].copy_from_slice(&self.hour.to_ne_bytes());
            bytes[16..20].copy_from_slice(&self.minute.to_ne_bytes());
            bytes[20..24].copy_from_slice(&self.second.to_ne_bytes());
            bytes[24..28].copy_from_slice(&self.fraction.to_ne_bytes());
        }
        bytes
    }

    /// Deserialize from the ABI byte layout.
    pub fn from_bytes(buffer: &[u8]) -> Option<SqlInterval> {
        if buffer.len() < Self::WIRE_LEN {
            return None;
        }
        let code = i32::from_ne_bytes(buffer[0..4].try_into().ok()?);
        let kind = IntervalKind::from_code(code)?;
        let negative = i16::from_ne_bytes(buffer[4..6].try_into().ok()?) != 0;
        let field = |range: std::ops::Range<usize>| {
            u32::from_ne_bytes(buffer[range].try_into().expect("field width"))
        };
        let mut interval = SqlInterval::zero(kind);
        interval.negative = negative;
        if kind.is_year_month() {
            interval.year = field(8..12);
            interval.month = field(12..16);
        } else {
            interval.day = field(8..12);
            interval.hour = field(12..16);
            interval.minute = field(16..20);
            interval.second = field(20..24);
            interval.fraction = field(24..28);
        }
        Some(interval)
    }
}

/// Individual component bounds for a bindable duration: the native structure
/// stores 32-bit unsigned fields and each component must already be within
/// its carry range.
pub fn check_bind_range(duration: &Duration) -> Result<(), MisuseError> {
    let d = duration;
    let in_range = d.year >= -(i32::MAX as i64)
        && d.year <= i32::MAX as i64
        && (-12..=12).contains(&d.month)
        && (-31..=31).contains(&d.day)
        && d.hour.abs() < 24
        && d.minute.abs() < 60
        && d.second.abs() < 60
        && d.micro_second.abs() < 1_000_000;
    if in_range {
        Ok(())
    } else {
        Err(MisuseError::DurationOutOfRange {
            detail: duration.to_string(),
        })
    }
}

/// Encode a duration into the smallest native interval subtype that
/// represents it exactly.
///
/// The duration is normalized first, so 13 months encodes as 1 year
/// 1 month. A normalized value with both calendar and clock components has
/// no native representation and is rejected; the all-zero duration encodes
/// as zero seconds.
pub fn encode(duration: &Duration) -> Result<SqlInterval, MisuseError> {
    use IntervalKind::*;
    let d = duration.normalized();
    if d.has_year_month() && d.has_day_time() {
        return Err(MisuseError::MixedIntervalFields);
    }
    if d.has_year_month() {
        let negative = d.year < 0 || d.month < 0;
        let mut interval = SqlInterval::zero(if d.year != 0 && d.month != 0 {
            YearToMonth
        } else if d.year != 0 {
            Year
        } else {
            Month
        });
        interval.negative = negative;
        interval.year = d.year.unsigned_abs() as u32;
        interval.month = d.month.unsigned_abs() as u32;
        return Ok(interval);
    }
    let negative =
        d.day < 0 || d.hour < 0 || d.minute < 0 || d.second < 0 || d.micro_second < 0;
    // Span from the most significant non-zero field down to the least
    // significant non-zero field. Zero overall becomes zero seconds.
    let kind = if d.day != 0 {
        if d.micro_second != 0 || d.second != 0 {
            DayToSecond
        } else if d.minute != 0 {
            DayToMinute
        } else if d.hour != 0 {
            DayToHour
        } else {
            Day
        }
    } else if d.hour != 0 {
        if d.micro_second != 0 || d.second != 0 {
            HourToSecond
        } else if d.minute != 0 {
            HourToMinute
        } else {
            Hour
        }
    } else if d.minute != 0 {
        if d.micro_second != 0 || d.second != 0 {
            MinuteToSecond
        } else {
            Minute
        }
    } else {
        Second
    };
    let mut interval = SqlInterval::zero(kind);
    interval.negative = negative;
    interval.day = d.day.unsigned_abs() as u32;
    interval.hour = d.hour.unsigned_abs() as u32;
    interval.minute = d.minute.unsigned_abs() as u32;
    interval.second = d.second.unsigned_abs() as u32;
    interval.fraction = d.micro_second.unsigned_abs() as u32;
    Ok(interval)
}

/// Decode a native interval structure: inverse table lookup by subtype,
/// re-applying the sign to every component.
pub fn decode(interval: &SqlInterval) -> Duration {
    use IntervalKind::*;
    let mut d = Duration::zero();
    match interval.kind {
        Year => d.year = interval.year as i64,
        Month => d.month = interval.month as i64,
        Day => d.day = interval.day as i64,
        Hour => d.hour = interval.hour as i64,
        Minute => d.minute = interval.minute as i64,
        Second => {
            d.second = interval.second as i64;
            d.micro_second = interval.fraction as i64;
        }
        YearToMonth => {
            d.year = interval.year as i64;
            d.month = interval.month as i64;
        }
        DayToHour => {
            d.day = interval.day as i64;
            d.hour = interval.hour as i64;
        }
        DayToMinute => {
            d.day = interval.day as i64;
            d.hour = interval.hour as i64;
            d.minute = interval.minute as i64;
        }
        DayToSecond => {
            d.day = interval.day as i64;
            d.hour = interval.hour as i64;
            d.minute = interval.minute as i64;
            d.second = interval.second as i64;
            d.micro_second = interval.fraction as i64;
        }
        HourToMinute => {
            d.hour = interval.hour as i64;
            d.minute = interval.minute as i64;
        }
        HourToSecond => {
            d.hour = interval.hour as i64;
            d.minute = interval.minute as i64;
            d.second = interval.second as i64;
            d.micro_second = interval.fraction as i64;
        }
        MinuteToSecond => {
            d.minute = interval.minute as i64;
            d.second = interval.second as i64;
            d.micro_second = interval.fraction as i64;
        }
    }
    if interval.negative {
        d.negated()
    } else {
        d
    }
}

/// Parse a formatted interval string as some back-ends surface them:
/// `+'…' UNIT` / `-'…' UNIT` (optionally prefixed `INTERVAL `), plain
/// `HH:MM:SS`, or `-HH:MM:SS`. Returns `None` when the text is not a
/// recognizable interval.
pub fn parse_text(text: &str) -> Option<Duration> {
    let text = text.strip_prefix("INTERVAL ").unwrap_or(text);
    if let Some(duration) = parse_quoted(text) {
        return Some(duration);
    }
    parse_clock(text)
}

fn parse_clock(text: &str) -> Option<Duration> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let bytes = body.as_bytes();
    if bytes.len() != 8 || bytes[2] != b':' || bytes[5] != b':' {
        return None;
    }
    let hour: i64 = body[0..2].parse().ok()?;
    let minute: i64 = body[3..5].parse().ok()?;
    let second: i64 = body[6..8].parse().ok()?;
    let d = Duration::new(0, 0, 0, hour, minute, second, 0);
    Some(if negative { d.negated() } else { d })
}

/// Cursor over the digits inside the quoted section.
struct NumberScanner<'a> {
    rest: &'a str,
}

impl<'a> NumberScanner<'a> {
    fn take_number(&mut self) -> Option<(i64, &'a str)> {
        let digits = self.rest.find(|c: char| !c.is_ascii_digit());
        let (number, rest) = match digits {
            Some(0) => return None,
            Some(end) => self.rest.split_at(end),
            None => (self.rest, ""),
        };
        self.rest = rest;
        Some((number.parse().ok()?, number))
    }

    fn eat(&mut self, ch: char) -> bool {
        if let Some(rest) = self.rest.strip_prefix(ch) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn done(&self) -> bool {
        self.rest.is_empty()
    }
}

fn parse_quoted(text: &str) -> Option<Duration> {
    let negative = match text.as_bytes().first()? {
        b'+' => false,
        b'-' => true,
        _ => return None,
    };
    let body = text[1..].strip_prefix('\'')?;
    let close = body.find('\'')?;
    let numbers = &body[..close];
    let unit = body[close + 1..].trim_start();
    let unit_word: String = unit
        .chars()
        .take_while(|c| c.is_ascii_uppercase())
        .collect();

    let mut d = Duration::zero();
    let mut scanner = NumberScanner { rest: numbers };
    match unit_word.as_str() {
        "YEAR" => {
            d.year = scanner.take_number()?.0;
            if scanner.eat('-') {
                d.month = scanner.take_number()?.0;
            }
            if !scanner.done() {
                return None;
            }
        }
        "MONTH" => {
            d.month = scanner.take_number()?.0;
            if !scanner.done() {
                return None;
            }
        }
        "DAY" | "HOUR" | "MINUTE" | "SECOND" => {
            let mut next = unit_word.as_str();
            if next == "DAY" {
                d.day = scanner.take_number()?.0;
                next = if scanner.eat(' ') { "HOUR" } else { "" };
            }
            if next == "HOUR" {
                d.hour = scanner.take_number()?.0;
                next = if scanner.eat(':') { "MINUTE" } else { "" };
            }
            if next == "MINUTE" {
                d.minute = scanner.take_number()?.0;
                next = if scanner.eat(':') { "SECOND" } else { "" };
            }
            if next == "SECOND" {
                d.second = scanner.take_number()?.0;
                if scanner.eat('.') {
                    let (_, digits) = scanner.take_number()?;
                    d.micro_second = scale_fraction(digits)?;
                }
            }
            if !scanner.done() {
                return None;
            }
        }
        _ => return None,
    }
    Some(if negative { d.negated() } else { d })
}

/// Scale a fractional-second digit string to microseconds, rounding half up
/// when more than six digits are present.
fn scale_fraction(digits: &str) -> Option<i64> {
    let mut micros: i64 = digits
        .chars()
        .take(6)
        .collect::<String>()
        .parse()
        .ok()?;
    for _ in digits.len()..6 {
        micros *= 10;
    }
    if digits.len() > 6 && digits.as_bytes()[6] >= b'5' {
        micros += 1;
    }
    Some(micros)
}
