//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Format a run-relative offset the way the playback log shows it: `[1.2s]`
///
/// Tenths are truncated, never rounded up, so a step that fired at 999ms
/// still reads `[0.9s]` and log lines stay monotone.
pub fn format_elapsed(elapsed: Duration) -> String {
    let tenths = elapsed.as_millis() / 100;
    format!("[{}.{}s]", tenths / 10, tenths % 10)
}

/// Duration as whole milliseconds, saturating at `u64::MAX`
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, Duration::from_secs(1));
    }

    #[test]
    fn test_format_elapsed_zero() {
        assert_eq!(format_elapsed(Duration::ZERO), "[0.0s]");
    }

    #[test]
    fn test_format_elapsed_truncates_tenths() {
        assert_eq!(format_elapsed(Duration::from_millis(999)), "[0.9s]");
        assert_eq!(format_elapsed(Duration::from_millis(1_100)), "[1.1s]");
        assert_eq!(format_elapsed(Duration::from_millis(29_150)), "[29.1s]");
    }

    #[test]
    fn test_duration_to_millis_saturates() {
        assert_eq!(duration_to_millis(Duration::from_millis(1234)), 1234);
        assert_eq!(duration_to_millis(Duration::MAX), u64::MAX);
    }
}
