//! Archival notice rendering and delivery.

use std::sync::Arc;

use reaper_core::{InactivityThreshold, NoticeRef};
use reaper_slack::{
    SlackApiError, SlackAttachment, SlackAttachmentAction, SlackMessage, WorkspaceApi,
};
use thiserror::Error;

/// `callback_id` Slack echoes back when a notice button is pressed.
pub const NOTICE_CALLBACK_ID: &str = "archive_channels";
pub const DO_NOT_ARCHIVE_ACTION: &str = "do_not_archive";
pub const I_HATE_ROBOTS_ACTION: &str = "i_hate_robots";

const NOTICE_COLOR: &str = "#E0644F";

/// Returns true for button values that cancel a pending archival.
pub fn is_opt_out_action(action_value: &str) -> bool {
    matches!(action_value, DO_NOT_ARCHIVE_ACTION | I_HATE_ROBOTS_ACTION)
}

/// The notice could not be posted; nothing was written anywhere.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to post archival notice to channel {channel_id}")]
    Post {
        channel_id: String,
        #[source]
        source: SlackApiError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeOutcome {
    pub notice: NoticeRef,
    pub pinned: bool,
}

/// Builds the warning posted into an inactive channel.
pub fn render_purge_notice(channel_id: &str, threshold: &InactivityThreshold) -> SlackMessage {
    let inactivity = threshold.describe();
    SlackMessage {
        text: format!(
            "Hi <#{channel_id}>! This channel has had no activity for over {inactivity}, \
             so it will be archived at the next cleanup. Press *Don't Archive* below to keep it."
        ),
        attachments: vec![SlackAttachment {
            fallback: format!(
                "This channel will be archived after {inactivity} of inactivity. \
                 Post a message here to keep it."
            ),
            color: Some(NOTICE_COLOR.to_string()),
            callback_id: NOTICE_CALLBACK_ID.to_string(),
            actions: vec![
                SlackAttachmentAction {
                    style: Some("primary".to_string()),
                    ..SlackAttachmentAction::button(
                        "archive",
                        "Don't Archive",
                        DO_NOT_ARCHIVE_ACTION,
                    )
                },
                SlackAttachmentAction::button("archive", "I hate robots", I_HATE_ROBOTS_ACTION),
            ],
        }],
    }
}

/// Posts and pins archival notices.
#[derive(Clone)]
pub struct NoticeDispatcher {
    workspace: Arc<dyn WorkspaceApi>,
    threshold: InactivityThreshold,
}

impl NoticeDispatcher {
    pub fn new(workspace: Arc<dyn WorkspaceApi>, threshold: InactivityThreshold) -> Self {
        Self {
            workspace,
            threshold,
        }
    }

    /// Posts the notice, then pins it. A pin failure is logged and reported
    /// through `pinned`; the posted notice stays valid.
    pub async fn notify(&self, channel_id: &str) -> Result<NoticeOutcome, DispatchError> {
        let message = render_purge_notice(channel_id, &self.threshold);
        let notice = self
            .workspace
            .post_message(channel_id, &message)
            .await
            .map_err(|source| DispatchError::Post {
                channel_id: channel_id.to_string(),
                source,
            })?;

        let pinned = match self.workspace.pin_message(&notice).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    channel_id,
                    message_ts = %notice.message_ts,
                    error = %error,
                    "archival notice posted but pin failed"
                );
                false
            }
        };

        Ok(NoticeOutcome { notice, pinned })
    }
}
