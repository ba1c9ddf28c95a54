//! Opt-out handling for notice button clicks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reaper_queue::{PurgeQueueError, PurgeQueueStore};
use reaper_slack::{InteractiveAction, WorkspaceApi};
use serde::Serialize;

use crate::notice_dispatcher::is_opt_out_action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptOutOutcome {
    /// A pending record was cancelled by this callback.
    Cancelled,
    /// Nothing pending for the channel: already cancelled, archived or never queued.
    AlreadyResolved,
    /// The action value is not an opt-out.
    Ignored,
}

impl OptOutOutcome {
    /// Text shown to the user who pressed the button, if any.
    pub fn acknowledgement(self, channel_id: &str) -> Option<String> {
        match self {
            Self::Cancelled => Some(format!("Got it! <#{channel_id}> will not be archived.")),
            Self::AlreadyResolved => Some(format!(
                "No pending archival found for <#{channel_id}>. \
                 If you just received the notice, press the button again in a moment."
            )),
            Self::Ignored => None,
        }
    }
}

/// Cancels pending archivals in response to interactive callbacks.
///
/// Callbacks are delivered at least once, so every path is idempotent.
#[derive(Clone)]
pub struct OptOutHandler {
    store: Arc<dyn PurgeQueueStore>,
    workspace: Arc<dyn WorkspaceApi>,
}

impl OptOutHandler {
    pub fn new(store: Arc<dyn PurgeQueueStore>, workspace: Arc<dyn WorkspaceApi>) -> Self {
        Self { store, workspace }
    }

    pub async fn handle(
        &self,
        action: &InteractiveAction,
        now: DateTime<Utc>,
    ) -> Result<OptOutOutcome, PurgeQueueError> {
        let channel_id = action.channel_id.as_str();
        if !is_opt_out_action(&action.action_value) {
            tracing::debug!(
                channel_id,
                action_value = %action.action_value,
                "ignoring non opt-out action"
            );
            return Ok(OptOutOutcome::Ignored);
        }

        let record = match self.store.get(channel_id).await? {
            Some(record) if record.is_pending() => record,
            _ => {
                tracing::info!(channel_id, "opt-out received for channel with nothing pending");
                return Ok(OptOutOutcome::AlreadyResolved);
            }
        };

        match self.store.cancel(channel_id, now).await {
            Ok(()) => {}
            Err(PurgeQueueError::NotFound(_)) => return Ok(OptOutOutcome::AlreadyResolved),
            Err(error) => return Err(error),
        }
        tracing::info!(
            channel_id,
            user_id = action.user_id.as_deref().unwrap_or("unknown"),
            action_value = %action.action_value,
            "channel archival cancelled"
        );

        if let Err(error) = self.workspace.unpin_message(&record.notice_ref()).await {
            tracing::warn!(channel_id, error = %error, "failed to unpin archival notice");
        }
        Ok(OptOutOutcome::Cancelled)
    }
}
