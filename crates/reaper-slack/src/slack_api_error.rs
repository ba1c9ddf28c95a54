use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

const MAX_ERROR_BODY_CHARS: usize = 800;

/// Result type for Slack Web API calls.
pub type SlackResult<T> = Result<T, SlackApiError>;

/// A Slack Web API call that did not produce a usable success payload.
#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("failed to build slack api client")]
    ClientBuild(#[source] reqwest::Error),
    #[error("slack api {operation} request failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack api {operation} rate limited (retry after {retry_after_seconds:?}s)")]
    RateLimited {
        operation: &'static str,
        retry_after_seconds: Option<u64>,
    },
    #[error("slack api {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("slack {operation} failed: {code}")]
    Api {
        operation: &'static str,
        code: String,
    },
    #[error("failed to decode slack {operation}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack {operation} response missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
}

impl SlackApiError {
    /// The Slack error code (`channel_not_found`, `already_archived`, ...) when
    /// the service answered with `ok=false`.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. }) || self.api_code() == Some("ratelimited")
    }

    /// HTTP 429; Slack sends the back-off in whole seconds.
    pub(crate) fn rate_limited(operation: &'static str, headers: &HeaderMap) -> Self {
        let retry_after_seconds = headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        Self::RateLimited {
            operation,
            retry_after_seconds,
        }
    }

    /// Non-2xx status. The body is clipped so error logs stay one line.
    pub(crate) fn status(operation: &'static str, status: u16, body: &str) -> Self {
        let mut clipped = body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
        if body.chars().nth(MAX_ERROR_BODY_CHARS).is_some() {
            clipped.push_str("...");
        }
        Self::Status {
            operation,
            status,
            body: clipped,
        }
    }
}
