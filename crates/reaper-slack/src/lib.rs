//! Slack Web API collaborator for the channel reaper.
//!
//! Exposes the [`WorkspaceApi`] seam used by the sweeps, its reqwest-backed
//! implementation [`SlackApiClient`], and the helpers needed to accept Slack
//! interactive callbacks (payload parsing and v0 request signatures).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reaper_core::{Channel, NoticeRef};

mod slack_api_client;
mod slack_api_error;
mod slack_interactive;
mod slack_message;
mod slack_signature;

pub use slack_api_client::SlackApiClient;
pub use slack_api_error::{SlackApiError, SlackResult};
pub use slack_interactive::{
    parse_interactive_form_body, parse_interactive_payload, InteractiveAction,
    InteractivePayloadError,
};
pub use slack_message::{SlackAttachment, SlackAttachmentAction, SlackMessage};
pub use slack_signature::{
    verify_slack_request, SlackSignatureError, SLACK_SIGNATURE_HEADER, SLACK_TIMESTAMP_HEADER,
};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Operations the reaper needs from the workspace messaging service.
///
/// Implementations never retry internally; a failed call is reported once and
/// the next scheduled sweep is the retry.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Lists public channels that are not archived.
    async fn list_active_channels(&self) -> SlackResult<Vec<Channel>>;

    /// Returns the timestamp of the newest message, or `None` for an empty history.
    async fn latest_activity(&self, channel_id: &str) -> SlackResult<Option<DateTime<Utc>>>;

    async fn post_message(&self, channel_id: &str, message: &SlackMessage)
        -> SlackResult<NoticeRef>;

    async fn pin_message(&self, notice: &NoticeRef) -> SlackResult<()>;

    async fn unpin_message(&self, notice: &NoticeRef) -> SlackResult<()>;

    async fn archive_channel(&self, channel_id: &str) -> SlackResult<()>;
}
