//! Scripted workspace double shared by the runtime unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reaper_core::{Channel, NoticeRef};
use reaper_slack::{SlackApiError, SlackMessage, SlackResult, WorkspaceApi};

#[derive(Default)]
pub(crate) struct ScriptedWorkspaceState {
    pub(crate) channels: Vec<Channel>,
    pub(crate) activity: HashMap<String, DateTime<Utc>>,
    pub(crate) fail_listing: bool,
    pub(crate) fail_history: HashSet<String>,
    pub(crate) fail_post: HashSet<String>,
    pub(crate) fail_pin: HashSet<String>,
    pub(crate) fail_archive: HashMap<String, String>,
    pub(crate) fail_unpin: bool,
    pub(crate) posted: Vec<(String, SlackMessage)>,
    pub(crate) pinned: Vec<NoticeRef>,
    pub(crate) unpinned: Vec<NoticeRef>,
    pub(crate) archived: Vec<String>,
    pub(crate) archive_attempts: Vec<String>,
    pub(crate) history_calls: Vec<String>,
}

#[derive(Default)]
pub(crate) struct ScriptedWorkspace {
    pub(crate) state: Mutex<ScriptedWorkspaceState>,
}

impl ScriptedWorkspace {
    pub(crate) fn with_channels(channels: Vec<Channel>) -> Self {
        let workspace = Self::default();
        workspace.lock().channels = channels;
        workspace
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedWorkspaceState> {
        self.state.lock().expect("scripted workspace lock")
    }

    pub(crate) fn set_activity(&self, channel_id: &str, at: DateTime<Utc>) {
        self.lock().activity.insert(channel_id.to_string(), at);
    }

    pub(crate) fn posted_channels(&self) -> Vec<String> {
        let mut channels = self
            .lock()
            .posted
            .iter()
            .map(|(channel_id, _)| channel_id.clone())
            .collect::<Vec<_>>();
        channels.sort();
        channels
    }

    pub(crate) fn archived(&self) -> Vec<String> {
        let mut archived = self.lock().archived.clone();
        archived.sort();
        archived
    }
}

fn api_error(operation: &'static str, code: &str) -> SlackApiError {
    SlackApiError::Api {
        operation,
        code: code.to_string(),
    }
}

#[async_trait]
impl WorkspaceApi for ScriptedWorkspace {
    async fn list_active_channels(&self) -> SlackResult<Vec<Channel>> {
        let state = self.lock();
        if state.fail_listing {
            return Err(api_error("conversations.list", "ratelimited"));
        }
        Ok(state
            .channels
            .iter()
            .filter(|channel| !channel.is_archived)
            .cloned()
            .collect())
    }

    async fn latest_activity(&self, channel_id: &str) -> SlackResult<Option<DateTime<Utc>>> {
        let mut state = self.lock();
        state.history_calls.push(channel_id.to_string());
        if state.fail_history.contains(channel_id) {
            return Err(api_error("conversations.history", "channel_not_found"));
        }
        Ok(state.activity.get(channel_id).copied())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &SlackMessage,
    ) -> SlackResult<NoticeRef> {
        let mut state = self.lock();
        if state.fail_post.contains(channel_id) {
            return Err(api_error("chat.postMessage", "not_in_channel"));
        }
        state
            .posted
            .push((channel_id.to_string(), message.clone()));
        let ts = format!("1700000000.{:06}", state.posted.len());
        Ok(NoticeRef::new(channel_id, ts))
    }

    async fn pin_message(&self, notice: &NoticeRef) -> SlackResult<()> {
        let mut state = self.lock();
        if state.fail_pin.contains(&notice.channel_id) {
            return Err(api_error("pins.add", "restricted_action"));
        }
        state.pinned.push(notice.clone());
        Ok(())
    }

    async fn unpin_message(&self, notice: &NoticeRef) -> SlackResult<()> {
        let mut state = self.lock();
        if state.fail_unpin {
            return Err(api_error("pins.remove", "restricted_action"));
        }
        state.unpinned.push(notice.clone());
        Ok(())
    }

    async fn archive_channel(&self, channel_id: &str) -> SlackResult<()> {
        let mut state = self.lock();
        state.archive_attempts.push(channel_id.to_string());
        if let Some(code) = state.fail_archive.get(channel_id).cloned() {
            return Err(api_error("conversations.archive", &code));
        }
        state.archived.push(channel_id.to_string());
        Ok(())
    }
}

pub(crate) fn channel(id: &str) -> Channel {
    Channel::new(id, format!("name-{}", id.to_ascii_lowercase()))
}
