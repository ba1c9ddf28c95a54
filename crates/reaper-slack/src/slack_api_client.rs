//! Slack Web API client used by the notify and purge sweeps.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reaper_core::{parse_slack_ts, Channel, NoticeRef};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{SlackApiError, SlackMessage, SlackResult, WorkspaceApi};

const CONVERSATIONS_PAGE_LIMIT: &str = "200";
const MAX_CONVERSATIONS_PAGES: usize = 500;

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationsListResponse {
    ok: bool,
    #[serde(default)]
    channels: Vec<SlackConversation>,
    #[serde(default)]
    response_metadata: Option<SlackResponseMetadata>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversation {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_archived: bool,
    #[serde(default)]
    is_general: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SlackResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackHistoryResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<SlackHistoryMessage>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackHistoryMessage {
    ts: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    ts: Option<String>,
    channel: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackAckResponse {
    ok: bool,
    error: Option<String>,
}

/// Bearer-token Slack Web API client.
#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackApiClient {
    pub fn new(api_base: String, bot_token: String, request_timeout_ms: u64) -> SlackResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("channel-reaper"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .map_err(SlackApiError::ClientBuild)?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn post_form<T>(&self, operation: &'static str, form: &[(&str, &str)]) -> SlackResult<T>
    where
        T: DeserializeOwned,
    {
        let request = self
            .http
            .post(self.endpoint(operation))
            .bearer_auth(&self.bot_token)
            .form(form);
        send_json(operation, request).await
    }

    async fn post_json<T>(&self, operation: &'static str, payload: &Value) -> SlackResult<T>
    where
        T: DeserializeOwned,
    {
        let request = self
            .http
            .post(self.endpoint(operation))
            .bearer_auth(&self.bot_token)
            .json(payload);
        send_json(operation, request).await
    }
}

#[async_trait]
impl WorkspaceApi for SlackApiClient {
    async fn list_active_channels(&self) -> SlackResult<Vec<Channel>> {
        let mut channels = Vec::new();
        let mut cursor = String::new();
        for page in 1..=MAX_CONVERSATIONS_PAGES {
            let mut form = vec![
                ("types", "public_channel"),
                ("exclude_archived", "true"),
                ("limit", CONVERSATIONS_PAGE_LIMIT),
            ];
            if !cursor.is_empty() {
                form.push(("cursor", cursor.as_str()));
            }
            let response: SlackConversationsListResponse =
                self.post_form("conversations.list", &form).await?;
            ensure_ok("conversations.list", response.ok, response.error)?;

            channels.extend(
                response
                    .channels
                    .into_iter()
                    .filter(|conversation| !conversation.is_archived)
                    .map(|conversation| Channel {
                        id: conversation.id,
                        name: conversation.name,
                        is_archived: false,
                        is_general: conversation.is_general,
                        last_activity: None,
                    }),
            );

            let next_cursor = response
                .response_metadata
                .map(|metadata| metadata.next_cursor.trim().to_string())
                .unwrap_or_default();
            if next_cursor.is_empty() {
                return Ok(channels);
            }
            if next_cursor == cursor {
                tracing::warn!(page, "slack conversations.list repeated its cursor; stopping");
                return Ok(channels);
            }
            cursor = next_cursor;
        }
        tracing::warn!(
            pages = MAX_CONVERSATIONS_PAGES,
            "slack conversations.list page cap reached; channel list may be partial"
        );
        Ok(channels)
    }

    async fn latest_activity(&self, channel_id: &str) -> SlackResult<Option<DateTime<Utc>>> {
        let response: SlackHistoryResponse = self
            .post_form(
                "conversations.history",
                &[("channel", channel_id), ("limit", "1")],
            )
            .await?;
        ensure_ok("conversations.history", response.ok, response.error)?;
        // Empty history is a valid answer: the channel has never been used.
        let Some(latest) = response.messages.into_iter().next() else {
            return Ok(None);
        };
        parse_slack_ts(&latest.ts)
            .map(Some)
            .ok_or(SlackApiError::MissingField {
                operation: "conversations.history",
                field: "messages[0].ts",
            })
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &SlackMessage,
    ) -> SlackResult<NoticeRef> {
        let mut payload = json!({
            "channel": channel_id,
            "text": message.text,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        if !message.attachments.is_empty() {
            payload["attachments"] = json!(message.attachments);
        }

        let response: SlackChatMessageResponse =
            self.post_json("chat.postMessage", &payload).await?;
        ensure_ok("chat.postMessage", response.ok, response.error)?;

        let ts = response
            .ts
            .filter(|value| !value.trim().is_empty())
            .ok_or(SlackApiError::MissingField {
                operation: "chat.postMessage",
                field: "ts",
            })?;
        Ok(NoticeRef::new(
            response.channel.unwrap_or_else(|| channel_id.to_string()),
            ts,
        ))
    }

    async fn pin_message(&self, notice: &NoticeRef) -> SlackResult<()> {
        let response: SlackAckResponse = self
            .post_json(
                "pins.add",
                &json!({"channel": notice.channel_id, "timestamp": notice.message_ts}),
            )
            .await?;
        if response.error.as_deref() == Some("already_pinned") {
            return Ok(());
        }
        ensure_ok("pins.add", response.ok, response.error)
    }

    async fn unpin_message(&self, notice: &NoticeRef) -> SlackResult<()> {
        let response: SlackAckResponse = self
            .post_json(
                "pins.remove",
                &json!({"channel": notice.channel_id, "timestamp": notice.message_ts}),
            )
            .await?;
        if response.error.as_deref() == Some("no_pin") {
            return Ok(());
        }
        ensure_ok("pins.remove", response.ok, response.error)
    }

    async fn archive_channel(&self, channel_id: &str) -> SlackResult<()> {
        let response: SlackAckResponse = self
            .post_json("conversations.archive", &json!({"channel": channel_id}))
            .await?;
        ensure_ok("conversations.archive", response.ok, response.error)
    }
}

fn ensure_ok(operation: &'static str, ok: bool, error: Option<String>) -> SlackResult<()> {
    if ok {
        return Ok(());
    }
    Err(SlackApiError::Api {
        operation,
        code: error
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| "unknown_error".to_string()),
    })
}

async fn send_json<T>(operation: &'static str, request: reqwest::RequestBuilder) -> SlackResult<T>
where
    T: DeserializeOwned,
{
    tracing::debug!(operation, "slack api request");
    let response = request
        .send()
        .await
        .map_err(|source| SlackApiError::Transport { operation, source })?;
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(SlackApiError::rate_limited(operation, response.headers()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SlackApiError::status(operation, status.as_u16(), &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|source| SlackApiError::Decode { operation, source })
}
