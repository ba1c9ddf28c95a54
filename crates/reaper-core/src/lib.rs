//! Shared domain types and low-level helpers for the channel reaper.
//!
//! Holds the channel and queue record shapes exchanged between the Slack
//! client, the purge queue store and the sweep runtime, plus the inactivity
//! threshold and Slack timestamp helpers.

pub mod channel_types;
pub mod inactivity;
pub mod queue_types;
pub mod time_utils;

pub use channel_types::{Channel, NoticeRef};
pub use inactivity::{InactivityThreshold, InactivityThresholdParseError};
pub use queue_types::{QueueRecord, QueueStatus};
pub use time_utils::{current_unix_timestamp_ms, format_slack_ts, parse_slack_ts};

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn unit_pending_record_starts_without_cancellation() {
        let enqueued_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let record = QueueRecord::pending(NoticeRef::new("C1", "1709283600.000100"), enqueued_at);
        assert_eq!(record.channel_id, "C1");
        assert_eq!(record.message_ts, "1709283600.000100");
        assert_eq!(record.status, QueueStatus::Pending);
        assert!(record.cancelled_at.is_none());
        assert_eq!(record.notice_ref(), NoticeRef::new("C1", "1709283600.000100"));
    }

    #[test]
    fn unit_queue_status_serializes_snake_case() {
        let raw = serde_json::to_string(&QueueStatus::Cancelled).expect("serialize");
        assert_eq!(raw, "\"cancelled\"");
        assert_eq!(QueueStatus::Pending.as_str(), "pending");
    }
}
