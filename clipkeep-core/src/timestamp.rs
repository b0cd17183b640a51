//! Capture timestamps.
//!
//! Timestamps are fixed-width `YYYY-MM-DD HH:MM:SS` strings, so comparing
//! them as strings compares them chronologically. Retention cutoffs and the
//! sync key both depend on that.

use chrono::{Duration, Local, NaiveDateTime};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_LEN: usize = 19;

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time in capture format
pub fn now_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}

/// Whether `s` is a zero-padded capture timestamp
pub fn is_valid_timestamp(s: &str) -> bool {
    s.len() == TIMESTAMP_LEN && NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).is_ok()
}

/// `now - days`, formatted for comparison against stored timestamps.
///
/// A threshold reaching past the earliest representable time clamps to
/// it, so no stored timestamp is older than the cutoff.
pub fn cutoff_timestamp(now: NaiveDateTime, days: u32) -> String {
    let cutoff = now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDateTime::MIN);
    format_timestamp(cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_format_is_zero_padded() {
        assert_eq!(format_timestamp(at(2024, 1, 2, 3, 4, 5)), "2024-01-02 03:04:05");
        assert!(is_valid_timestamp(&now_timestamp()));
    }

    #[test]
    fn test_string_order_matches_time_order() {
        let earlier = format_timestamp(at(2024, 9, 30, 23, 59, 59));
        let later = format_timestamp(at(2024, 10, 1, 0, 0, 0));
        assert!(earlier < later);
    }

    #[test]
    fn test_validation() {
        assert!(is_valid_timestamp("2024-01-01 00:00:00"));
        assert!(!is_valid_timestamp("2024-1-1 0:0:0"));
        assert!(!is_valid_timestamp("2024-01-01T00:00:00"));
        assert!(!is_valid_timestamp("2024-13-01 00:00:00"));
        assert!(!is_valid_timestamp(""));
    }

    #[test]
    fn test_cutoff() {
        let now = at(2024, 3, 1, 12, 0, 0);
        assert_eq!(cutoff_timestamp(now, 30), "2024-01-31 12:00:00");
        assert_eq!(cutoff_timestamp(now, 0), "2024-03-01 12:00:00");
    }

    #[test]
    fn test_cutoff_beyond_calendar_clamps() {
        let now = at(2024, 3, 1, 12, 0, 0);
        let cutoff = cutoff_timestamp(now, 100_000_000);
        assert_eq!(cutoff, format_timestamp(NaiveDateTime::MIN));
        assert!(cutoff.as_str() < "0000-01-01 00:00:00");
        assert!(cutoff_timestamp(now, u32::MAX).as_str() < "0000-01-01 00:00:00");
    }
}
