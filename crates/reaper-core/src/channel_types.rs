use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A workspace channel as seen during one sweep. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_archived: bool,
    /// The workspace default channel; the service refuses to archive it.
    #[serde(default)]
    pub is_general: bool,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_archived: false,
            is_general: false,
            last_activity: None,
        }
    }
}

/// Handle to a posted archival notice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoticeRef {
    pub channel_id: String,
    pub message_ts: String,
}

impl NoticeRef {
    pub fn new(channel_id: impl Into<String>, message_ts: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_ts: message_ts.into(),
        }
    }
}
