use serde::Serialize;

/// Outbound `chat.postMessage` content with optional interactive attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<SlackAttachment>,
}

impl SlackMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Legacy message attachment. Interactive buttons post back with `callback_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackAttachment {
    pub fallback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub callback_id: String,
    pub actions: Vec<SlackAttachmentAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackAttachmentAction {
    pub name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl SlackAttachmentAction {
    pub fn button(name: &str, text: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            action_type: "button".to_string(),
            value: value.to_string(),
            style: None,
        }
    }
}
