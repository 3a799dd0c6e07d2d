//! Wall-clock timestamps for identities and message frames.

use chrono::{DateTime, Utc};

/// Current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Current Unix timestamp in milliseconds, as carried in message frames.
pub fn now_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp as RFC 3339, or `None` if out of range.
pub fn format_millis(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_is_reasonable() {
        let ts = now_timestamp();
        // After 2024-01-01, before 2100-01-01
        assert!(ts > 1_704_067_200, "Timestamp {} is too old", ts);
        assert!(ts < 4_102_444_800, "Timestamp {} is too far in future", ts);
    }

    #[test]
    fn test_millis_agree_with_seconds() {
        let secs = now_timestamp();
        let millis = now_timestamp_millis();
        assert!((millis / 1000 - secs).abs() <= 1);
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(
            format_millis(0).as_deref(),
            Some("1970-01-01T00:00:00+00:00")
        );
        assert!(format_millis(i64::MAX).is_none());
    }
}
