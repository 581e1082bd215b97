//! Wall-clock access for timestamps and generated control ids.
//!
//! Builders read the time through [`Clock`] so tests can pin it.

use chrono::{Local, NaiveDateTime};

pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system clock in the local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always returns the same instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// HL7 `TS` rendering with second precision: `YYYYMMDDHHMMSS`.
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%d%H%M%S").to_string()
}

/// HL7 `DT` rendering: `YYYYMMDD`.
pub fn format_date(date: &chrono::NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn formats_hl7_timestamps() {
        let dt = NaiveDate::from_ymd_opt(2024, 12, 10)
            .and_then(|d| d.and_hms_opt(9, 5, 7))
            .expect("valid datetime");
        assert_eq!(format_timestamp(&dt), "20241210090507");
        assert_eq!(format_date(&dt.date()), "20241210");
    }

    #[test]
    fn fixed_clock_is_stable() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid datetime");
        let clock = FixedClock(dt);
        assert_eq!(clock.now(), clock.now());
    }
}
