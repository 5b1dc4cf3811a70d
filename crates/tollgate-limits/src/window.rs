//! Fixed time-window labels for counter keys.
//!
//! A window label is the timestamp truncated to the window length; two
//! requests in the same window share a counter key, and a new window means
//! a new key whose predecessor simply expires.

use chrono::{DateTime, NaiveDate, Utc};

/// Length of the coarse rate window in seconds.
pub const MINUTE_WINDOW_SECS: u64 = 60;

/// Length of the burst rate window in seconds.
pub const BURST_WINDOW_SECS: u64 = 10;

/// Label for the per-minute window containing `now`.
#[must_use]
pub fn minute_label(now: DateTime<Utc>) -> i64 {
    now.timestamp() / 60
}

/// Label for the 10-second burst window containing `now`.
#[must_use]
pub fn burst_label(now: DateTime<Utc>) -> i64 {
    now.timestamp() / 10
}

/// UTC calendar-day label, e.g. `2026-08-30`.
#[must_use]
pub fn day_label(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Day label for an explicit date (admin queries).
#[must_use]
pub fn day_label_for(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Seconds until the per-minute window containing `now` rolls over.
#[must_use]
pub fn seconds_to_minute_end(now: DateTime<Utc>) -> u64 {
    let into = now.timestamp().rem_euclid(60);
    (60 - into).unsigned_abs()
}

/// Seconds until the burst window containing `now` rolls over.
#[must_use]
pub fn seconds_to_burst_end(now: DateTime<Utc>) -> u64 {
    let into = now.timestamp().rem_euclid(10);
    (10 - into).unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn labels_are_stable_within_a_window() {
        let a = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 59).unwrap();
        assert_eq!(minute_label(a), minute_label(b));

        let c = Utc.with_ymd_and_hms(2026, 8, 30, 12, 1, 0).unwrap();
        assert_ne!(minute_label(a), minute_label(c));
    }

    #[test]
    fn burst_windows_are_ten_seconds() {
        let a = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 11).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 19).unwrap();
        let c = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 20).unwrap();
        assert_eq!(burst_label(a), burst_label(b));
        assert_ne!(burst_label(b), burst_label(c));
    }

    #[test]
    fn day_labels_split_at_utc_midnight() {
        let before = Utc.with_ymd_and_hms(2026, 8, 30, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 8, 31, 0, 0, 0).unwrap();
        assert_eq!(day_label(before), "2026-08-30");
        assert_eq!(day_label(after), "2026-08-31");
    }

    #[test]
    fn reset_seconds_count_down() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 45).unwrap();
        assert_eq!(seconds_to_minute_end(now), 15);
        assert_eq!(seconds_to_burst_end(now), 5);
    }
}
