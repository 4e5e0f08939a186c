//! Date/time utilities for feedhub.
//!
//! Timestamps are persisted as INTEGER unix milliseconds.

use chrono::{DateTime, Utc};

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Convert a timestamp to unix milliseconds.
pub fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert unix milliseconds back to a timestamp.
///
/// Returns `None` for values outside chrono's range.
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Length of a retention window in milliseconds.
pub fn retention_millis(days: i64) -> i64 {
    days.saturating_mul(MILLIS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_millis_round_trip() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(from_millis(to_millis(dt)), Some(dt));
        assert_eq!(to_millis(Utc.timestamp_opt(0, 0).unwrap()), 0);
    }

    #[test]
    fn test_retention_millis() {
        assert_eq!(retention_millis(0), 0);
        assert_eq!(retention_millis(7), 7 * MILLIS_PER_DAY);
        assert_eq!(retention_millis(i64::MAX), i64::MAX);
    }
}
