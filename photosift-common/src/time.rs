//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for embedding in a file name
///
/// Produces `yyyy-MM-dd_HH-mm-ss` so names stay valid on every filesystem
/// (no colons) and sort chronologically.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        // Second call should be after first call
        assert!(time2 > time1);
    }

    #[test]
    fn test_file_stamp_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 30, 5).unwrap();
        assert_eq!(file_stamp(at), "2025-03-09_14-30-05");
    }

    #[test]
    fn test_file_stamp_has_no_separators_hostile_to_filesystems() {
        let stamp = file_stamp(now());
        assert!(!stamp.contains(':'), "file stamp must not contain colons");
        assert!(!stamp.contains('/'), "file stamp must not contain slashes");
    }

    #[test]
    fn test_file_stamp_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 11, 30, 23, 59, 59).unwrap();
        assert!(file_stamp(earlier) < file_stamp(later));
    }
}
