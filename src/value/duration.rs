//! Seven-component signed durations.
//!
//! A duration carries year, month, day, hour, minute, second and microsecond
//! components, each individually signed. Normalization reduces the tuple to
//! two signed totals (whole months and whole microseconds) and re-expands
//! them into canonical fields, which is the form the interval codec encodes.

use std::fmt;

/// A signed duration with calendar (year/month) and clock
/// (day/hour/minute/second/microsecond) components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Duration {
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
    pub second: i64,
    pub micro_second: i64,
}

impl Duration {
    /// Create a duration from all seven components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        year: i64,
        month: i64,
        day: i64,
        hour: i64,
        minute: i64,
        second: i64,
        micro_second: i64,
    ) -> Self {
        Duration {
            year,
            month,
            day,
            hour,
            minute,
            second,
            micro_second,
        }
    }

    /// The zero duration.
    pub fn zero() -> Self {
        Duration::default()
    }

    /// True if every component is zero.
    pub fn is_zero(&self) -> bool {
        *self == Duration::default()
    }

    /// Collapse to the two signed totals: whole months and whole
    /// microseconds. The calendar and clock parts never mix.
    pub fn totals(&self) -> (i64, i64) {
        let months = self.year * 12 + self.month;
        let micros = (((self.day * 24 + self.hour) * 60 + self.minute) * 60 + self.second)
            * 1_000_000
            + self.micro_second;
        (months, micros)
    }

    /// Normalize into canonical component ranges: months split into
    /// year/month, microseconds split into day/hour/minute/second/micro.
    /// Signs follow the totals (truncating division), so 13 months becomes
    /// 1 year 1 month and -90 seconds becomes -1 minute -30 seconds.
    pub fn normalized(&self) -> Duration {
        let (months, micros) = self.totals();
        let mut rest = micros;
        let micro_second = rest % 1_000_000;
        rest /= 1_000_000;
        let second = rest % 60;
        rest /= 60;
        let minute = rest % 60;
        rest /= 60;
        Duration {
            year: months / 12,
            month: months % 12,
            day: rest / 24,
            hour: rest % 24,
            minute,
            second,
            micro_second,
        }
    }

    /// True if the calendar part (year/month) is non-zero.
    pub fn has_year_month(&self) -> bool {
        self.year != 0 || self.month != 0
    }

    /// True if the clock part (day..microsecond) is non-zero.
    pub fn has_day_time(&self) -> bool {
        self.day != 0
            || self.hour != 0
            || self.minute != 0
            || self.second != 0
            || self.micro_second != 0
    }

    /// Negate every component.
    pub fn negated(&self) -> Duration {
        Duration {
            year: -self.year,
            month: -self.month,
            day: -self.day,
            hour: -self.hour,
            minute: -self.minute,
            second: -self.second,
            micro_second: -self.micro_second,
        }
    }
}

impl fmt::Display for Duration {
    /// ISO-8601-style rendering, e.g. `P1Y2M3DT4H5M6.000007S`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.second < 0 || self.micro_second < 0 {
            "-"
        } else {
            ""
        };
        write!(
            f,
            "P{}Y{}M{}DT{}H{}M{}{}.{:06}S",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            sign,
            self.second.unsigned_abs(),
            self.micro_second.unsigned_abs()
        )
    }
}
