//! Slack interactive callback payload parsing.
//!
//! Slack posts button clicks as `application/x-www-form-urlencoded` with a
//! single `payload` field holding JSON. Legacy attachment buttons arrive as
//! `interactive_message`, Block Kit buttons as `block_actions`; both carry the
//! channel and the clicked action value.

use serde::Deserialize;
use thiserror::Error;

/// A button click relevant to the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveAction {
    pub channel_id: String,
    pub action_value: String,
    pub user_id: Option<String>,
    pub callback_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractivePayloadError {
    #[error("interactive request body has no payload field")]
    MissingPayload,
    #[error("interactive payload is not valid json: {0}")]
    InvalidJson(String),
    #[error("interactive payload has no channel id")]
    MissingChannel,
    #[error("interactive payload has no action value")]
    MissingAction,
}

#[derive(Debug, Deserialize)]
struct SlackInteractivePayload {
    #[serde(rename = "type", default)]
    payload_type: String,
    #[serde(default)]
    callback_id: Option<String>,
    #[serde(default)]
    channel: Option<SlackIdRef>,
    #[serde(default)]
    container: Option<SlackContainer>,
    #[serde(default)]
    user: Option<SlackIdRef>,
    #[serde(default)]
    actions: Vec<SlackActionValue>,
}

#[derive(Debug, Deserialize)]
struct SlackIdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SlackContainer {
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackActionValue {
    #[serde(default)]
    value: Option<String>,
}

/// Extracts and parses the `payload` field of a form-encoded callback body.
pub fn parse_interactive_form_body(
    body: &[u8],
) -> Result<InteractiveAction, InteractivePayloadError> {
    let payload = url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
        .ok_or(InteractivePayloadError::MissingPayload)?;
    parse_interactive_payload(&payload)
}

pub fn parse_interactive_payload(raw: &str) -> Result<InteractiveAction, InteractivePayloadError> {
    let payload = serde_json::from_str::<SlackInteractivePayload>(raw)
        .map_err(|error| InteractivePayloadError::InvalidJson(error.to_string()))?;
    tracing::debug!(payload_type = %payload.payload_type, "parsed slack interactive payload");

    let channel_id = payload
        .channel
        .map(|channel| channel.id)
        .or_else(|| payload.container.and_then(|container| container.channel_id))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(InteractivePayloadError::MissingChannel)?;
    let action_value = payload
        .actions
        .into_iter()
        .find_map(|action| action.value)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(InteractivePayloadError::MissingAction)?;

    Ok(InteractiveAction {
        channel_id,
        action_value,
        user_id: payload.user.map(|user| user.id),
        callback_id: payload.callback_id,
    })
}
