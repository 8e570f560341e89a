//! Calendar timestamps and the local time-zone service.
//!
//! The engine assembles timestamps from native buffers and then asks a
//! [`TimeZoneService`] for the offset and daylight-saving flag of the
//! assembled local wall-clock value. The service is an external collaborator
//! of the runtime; [`LocalZone`] is the chrono-backed default.

use chrono::{Local, NaiveDate, Offset, TimeZone};

/// A wall-clock timestamp with the derived zone information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub micro_second: u32,
    /// Offset from UTC in seconds for this local value
    pub time_zone: i32,
    /// Daylight-saving flag for this local value
    pub is_dst: bool,
}

impl Timestamp {
    /// The NULL-column default: year 0, January 1st, midnight, no offset.
    pub fn epoch() -> Self {
        Timestamp {
            year: 0,
            month: 1,
            day: 1,
            ..Timestamp::default()
        }
    }
}

/// Derives the local offset and daylight-saving flag for a wall-clock value.
pub trait TimeZoneService: Send + Sync {
    /// Offset from UTC in seconds and DST flag for the given local value.
    /// Values outside the zone database's range yield a zero offset.
    fn local_offset(
        &self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> (i32, bool);
}

/// The process-local time zone, answered by chrono.
///
/// The daylight-saving flag is derived by comparing the value's offset with
/// the offset in force on January 1st of the same year, which holds for
/// northern-hemisphere zones and is the closest chrono gets to the flag the
/// original collaborator reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalZone;

impl LocalZone {
    fn offset_of(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<i32> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let datetime = date.and_hms_opt(hour, minute, second)?;
        match Local.from_local_datetime(&datetime) {
            chrono::LocalResult::Single(dt) => Some(dt.offset().fix().local_minus_utc()),
            chrono::LocalResult::Ambiguous(dt, _) => Some(dt.offset().fix().local_minus_utc()),
            chrono::LocalResult::None => None,
        }
    }
}

impl TimeZoneService for LocalZone {
    fn local_offset(
        &self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> (i32, bool) {
        let Some(offset) = Self::offset_of(year, month, day, hour, minute, second) else {
            return (0, false);
        };
        let base = Self::offset_of(year, 1, 1, 12, 0, 0).unwrap_or(offset);
        (offset, offset != base)
    }
}

/// Number of days in the given month, accounting for leap years.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            let leap = NaiveDate::from_ymd_opt(year, 2, 29).is_some();
            if leap {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

impl Timestamp {
    /// True if the date and clock fields are individually in range.
    pub fn is_valid(&self) -> bool {
        self.month >= 1
            && self.month <= 12
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
            && self.micro_second < 1_000_000
    }

    /// Fill in `time_zone` and `is_dst` from the given service.
    pub fn with_zone(mut self, service: &dyn TimeZoneService) -> Self {
        let (offset, dst) = service.local_offset(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        );
        self.time_zone = offset;
        self.is_dst = dst;
        self
    }
}

/// Extension used by time-of-day columns: the zone lookup uses the year 2000
/// as the anchor date, then the year field reverts to zero.
pub fn time_of_day(hour: u32, minute: u32, second: u32, micro_second: u32, service: &dyn TimeZoneService) -> Timestamp {
    let anchored = Timestamp {
        year: 2000,
        month: 1,
        day: 1,
        hour,
        minute,
        second,
        micro_second,
        ..Timestamp::default()
    }
    .with_zone(service);
    Timestamp {
        year: 0,
        ..anchored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedZone;

    impl TimeZoneService for FixedZone {
        fn local_offset(&self, _y: i32, month: u32, _d: u32, _h: u32, _mi: u32, _s: u32) -> (i32, bool) {
            // +1h standard, +2h in "summer" months
            if (4..=9).contains(&month) {
                (7200, true)
            } else {
                (3600, false)
            }
        }
    }

    #[test]
    fn test_epoch_default() {
        let ts = Timestamp::epoch();
        assert_eq!((ts.year, ts.month, ts.day), (0, 1, 1));
        assert_eq!((ts.hour, ts.minute, ts.second, ts.micro_second), (0, 0, 0, 0));
    }

    #[test]
    fn test_with_zone() {
        let ts = Timestamp {
            year: 2024,
            month: 7,
            day: 15,
            hour: 12,
            ..Timestamp::default()
        }
        .with_zone(&FixedZone);
        assert_eq!(ts.time_zone, 7200);
        assert!(ts.is_dst);
    }

    #[test]
    fn test_time_of_day_anchor() {
        let ts = time_of_day(13, 30, 0, 0, &FixedZone);
        assert_eq!(ts.year, 0);
        assert_eq!(ts.hour, 13);
        // January anchor: standard offset
        assert_eq!(ts.time_zone, 3600);
        assert!(!ts.is_dst);
    }

    #[test]
    fn test_validity() {
        let ts = Timestamp {
            year: 2024,
            month: 2,
            day: 29,
            ..Timestamp::default()
        };
        assert!(ts.is_valid());

        let ts = Timestamp {
            year: 2023,
            month: 2,
            day: 29,
            ..Timestamp::default()
        };
        assert!(!ts.is_valid());

        let ts = Timestamp {
            year: 2023,
            month: 0,
            day: 1,
            ..Timestamp::default()
        };
        assert!(!ts.is_valid());
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2023, 4), 30);
    }

    #[test]
    fn test_local_zone_in_range() {
        // Whatever the host zone is, the lookup must not panic and must
        // return a plausible offset.
        let (offset, _dst) = LocalZone.local_offset(2024, 6, 1, 12, 0, 0);
        assert!(offset.abs() <= 14 * 3600);
    }

    #[test]
    fn test_local_zone_out_of_range() {
        let (offset, dst) = LocalZone.local_offset(0, 1, 1, 0, 0, 0);
        // Year 0 is representable in chrono; mostly this checks no panic.
        assert!(offset.abs() <= 14 * 3600);
        let _ = dst;
    }
}
