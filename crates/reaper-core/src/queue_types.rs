use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NoticeRef;

/// Lifecycle state for a purge queue record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    #[default]
    Pending,
    Cancelled,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Durable record of a channel that was notified and awaits archival.
///
/// At most one record exists per `channel_id`. Cancelled records are kept as
/// opt-out tombstones so the channel is not notified again until they are
/// pruned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub channel_id: String,
    pub message_ts: String,
    pub enqueued_at: DateTime<Utc>,
    pub status: QueueStatus,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl QueueRecord {
    /// Builds a fresh pending record for a posted notice.
    pub fn pending(notice: NoticeRef, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            channel_id: notice.channel_id,
            message_ts: notice.message_ts,
            enqueued_at,
            status: QueueStatus::Pending,
            cancelled_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueueStatus::Pending
    }

    pub fn notice_ref(&self) -> NoticeRef {
        NoticeRef::new(self.channel_id.clone(), self.message_ts.clone())
    }
}
