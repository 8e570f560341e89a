//! Date, time and timestamp buffer codecs.
//!
//! Native clients transport calendar values in fixed structures (date, time,
//! timestamp, and a vendor time-with-fraction shape) or, for some column
//! types, as formatted text. Fractional seconds travel in nanoseconds on the
//! wire but are scaled to the digit count the column declares, truncating;
//! only the text parse path rounds.

use crate::error::MisuseError;
use crate::value::Timestamp;

/// Native date structure: year, month, day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqlDate {
    pub year: i16,
    pub month: u16,
    pub day: u16,
}

impl SqlDate {
    pub const WIRE_LEN: usize = 6;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0..2].copy_from_slice(&self.year.to_ne_bytes());
        bytes[2..4].copy_from_slice(&self.month.to_ne_bytes());
        bytes[4..6].copy_from_slice(&self.day.to_ne_bytes());
        bytes
    }

    pub fn from_bytes(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::WIRE_LEN {
            return None;
        }
        Some(SqlDate {
            year: i16::from_ne_bytes(buffer[0..2].try_into().ok()?),
            month: u16::from_ne_bytes(buffer[2..4].try_into().ok()?),
            day: u16::from_ne_bytes(buffer[4..6].try_into().ok()?),
        })
    }
}

/// Native time structure: hour, minute, second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqlTime {
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

impl SqlTime {
    pub const WIRE_LEN: usize = 6;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0..2].copy_from_slice(&self.hour.to_ne_bytes());
        bytes[2..4].copy_from_slice(&self.minute.to_ne_bytes());
        bytes[4..6].copy_from_slice(&self.second.to_ne_bytes());
        bytes
    }

    pub fn from_bytes(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::WIRE_LEN {
            return None;
        }
        Some(SqlTime {
            hour: u16::from_ne_bytes(buffer[0..2].try_into().ok()?),
            minute: u16::from_ne_bytes(buffer[2..4].try_into().ok()?),
            second: u16::from_ne_bytes(buffer[4..6].try_into().ok()?),
        })
    }
}

/// Native timestamp structure. `fraction` is in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqlTimestamp {
    pub year: i16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub fraction: u32,
}

impl SqlTimestamp {
    pub const WIRE_LEN: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0..2].copy_from_slice(&self.year.to_ne_bytes());
        bytes[2..4].copy_from_slice(&self.month.to_ne_bytes());
        bytes[4..6].copy_from_slice(&self.day.to_ne_bytes());
        bytes[6..8].copy_from_slice(&self.hour.to_ne_bytes());
        bytes[8..10].copy_from_slice(&self.minute.to_ne_bytes());
        bytes[10..12].copy_from_slice(&self.second.to_ne_bytes());
        bytes[12..16].copy_from_slice(&self.fraction.to_ne_bytes());
        bytes
    }

    pub fn from_bytes(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::WIRE_LEN {
            return None;
        }
        Some(SqlTimestamp {
            year: i16::from_ne_bytes(buffer[0..2].try_into().ok()?),
            month: u16::from_ne_bytes(buffer[2..4].try_into().ok()?),
            day: u16::from_ne_bytes(buffer[4..6].try_into().ok()?),
            hour: u16::from_ne_bytes(buffer[6..8].try_into().ok()?),
            minute: u16::from_ne_bytes(buffer[8..10].try_into().ok()?),
            second: u16::from_ne_bytes(buffer[10..12].try_into().ok()?),
            fraction: u32::from_ne_bytes(buffer[12..16].try_into().ok()?),
        })
    }
}

/// Vendor time-with-fraction structure. `fraction` is in nanoseconds; the
/// layout carries two bytes of alignment padding before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqlTime2 {
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub fraction: u32,
}

impl SqlTime2 {
    pub const WIRE_LEN: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0..2].copy_from_slice(&self.hour.to_ne_bytes());
        bytes[2..4].copy_from_slice(&self.minute.to_ne_bytes());
        bytes[4..6].copy_from_slice(&self.second.to_ne_bytes());
        bytes[8..12].copy_from_slice(&self.fraction.to_ne_bytes());
        bytes
    }

    pub fn from_bytes(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::WIRE_LEN {
            return None;
        }
        Some(SqlTime2 {
            hour: u16::from_ne_bytes(buffer[0..2].try_into().ok()?),
            minute: u16::from_ne_bytes(buffer[2..4].try_into().ok()?),
            second: u16::from_ne_bytes(buffer[4..6].try_into().ok()?),
            fraction: u32::from_ne_bytes(buffer[8..12].try_into().ok()?),
        })
    }
}

/// Scale microseconds to the wire fraction (nanoseconds), truncated to the
/// number of fractional digits the column declares.
pub fn fraction_from_micros(micro_second: u32, decimal_digits: i16) -> u32 {
    match decimal_digits {
        0 => 0,
        1 => micro_second / 100_000 * 100_000_000,
        2 => micro_second / 10_000 * 10_000_000,
        3 => micro_second / 1_000 * 1_000_000,
        4 => micro_second / 100 * 100_000,
        5 => micro_second / 10 * 10_000,
        _ => micro_second * 1_000,
    }
}

/// Wire fraction (nanoseconds) back to microseconds, truncating.
pub fn micros_from_fraction(fraction: u32) -> u32 {
    fraction / 1_000
}

/// Result of parsing a formatted date/time string: the clock fields plus a
/// marker telling whether the text carried only a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub micro_second: u32,
    pub time_only: bool,
}

fn parse_fraction_digits(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut micros: u32 = digits.chars().take(6).collect::<String>().parse().ok()?;
    for _ in digits.len()..6 {
        micros *= 10;
    }
    if digits.len() > 6 && digits.as_bytes()[6] >= b'5' {
        micros += 1;
    }
    Some(micros)
}

fn parse_clock_part(text: &str) -> Option<(u32, u32, u32, u32)> {
    let (clock, fraction) = match text.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (text, None),
    };
    let mut parts = clock.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let second: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let micro = match fraction {
        Some(digits) => parse_fraction_digits(digits)?,
        None => 0,
    };
    Some((hour, minute, second, micro))
}

fn parse_date_part(text: &str) -> Option<(i32, u32, u32)> {
    let mut parts = text.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    Some((year, month, day))
}

/// Parse a formatted date/time value: `YYYY-MM-DD hh:mm:ss[.f…]`,
/// `YYYY-MM-DD`, or `hh:mm:ss[.f…]`. Excess fractional digits round half
/// up into microseconds.
pub fn parse_text(text: &str) -> Result<ParsedDateTime, MisuseError> {
    let text = text.trim();
    let fail = || MisuseError::ParseFailed {
        what: "date/time",
        text: text.to_string(),
    };
    if let Some((date, clock)) = text.split_once(' ') {
        let (year, month, day) = parse_date_part(date).ok_or_else(fail)?;
        let (hour, minute, second, micro_second) = parse_clock_part(clock).ok_or_else(fail)?;
        return Ok(ParsedDateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
            micro_second,
            time_only: false,
        });
    }
    if text.contains(':') {
        let (hour, minute, second, micro_second) = parse_clock_part(text).ok_or_else(fail)?;
        return Ok(ParsedDateTime {
            year: 0,
            month: 1,
            day: 1,
            hour,
            minute,
            second,
            micro_second,
            time_only: true,
        });
    }
    let (year, month, day) = parse_date_part(text).ok_or_else(fail)?;
    Ok(ParsedDateTime {
        year,
        month,
        day,
        hour: 0,
        minute: 0,
        second: 0,
        micro_second: 0,
        time_only: false,
    })
}

/// Render a timestamp as text for columns that transport date/time values as
/// strings. The declared column size picks the shape: a 10-character column
/// takes a plain date (when the clock part is zero and the date is not the
/// epoch placeholder), a column of 8 or more takes a plain time when the
/// date is the placeholder, and 19 or more takes the full form, truncated to
/// the column size.
pub fn format_datetime2(value: &Timestamp, column_size: usize) -> Result<String, MisuseError> {
    if value.year < -999 || value.year > 9999 {
        return Err(MisuseError::ParseFailed {
            what: "year renderable as text",
            text: value.year.to_string(),
        });
    }
    let clock_is_zero =
        value.hour == 0 && value.minute == 0 && value.second == 0 && value.micro_second == 0;
    let date_is_placeholder = value.year == 0 && value.month == 1 && value.day == 1;
    if column_size == 10 && clock_is_zero && !date_is_placeholder {
        return Ok(format!(
            "{:04}-{:02}-{:02}",
            value.year, value.month, value.day
        ));
    }
    if column_size >= 8 && date_is_placeholder {
        return Ok(format!(
            "{:02}:{:02}:{:02}.{:07}",
            value.hour,
            value.minute,
            value.second,
            value.micro_second * 10
        ));
    }
    if column_size >= 19 {
        let mut text = format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:07}",
            value.year,
            value.month,
            value.day,
            value.hour,
            value.minute,
            value.second,
            value.micro_second * 10
        );
        text.truncate(column_size.min(text.len()));
        return Ok(text);
    }
    Err(MisuseError::ParseFailed {
        what: "date/time shape for column size",
        text: column_size.to_string(),
    })
}
