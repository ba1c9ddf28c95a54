//! Slack v0 request signature verification for interactive callbacks.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const SLACK_SIGNATURE_HEADER: &str = "x-slack-signature";
pub const SLACK_TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Reasons an inbound request is rejected as not coming from Slack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlackSignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("slack signature must use v0=<hex> format")]
    MalformedSignature,
    #[error("invalid slack request timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("slack request timestamp skew {skew_seconds}s exceeds max {max_skew_seconds}s")]
    StaleTimestamp {
        skew_seconds: u64,
        max_skew_seconds: u64,
    },
    #[error("slack signature verification failed")]
    Mismatch,
}

/// Verifies `v0=<hex>` HMAC-SHA256 over `v0:{timestamp}:{body}` and the
/// timestamp skew. `max_skew_seconds == 0` disables the skew check.
pub fn verify_slack_request(
    body: &[u8],
    signature: Option<&str>,
    timestamp: Option<&str>,
    signing_secret: &str,
    now_unix_ms: u64,
    max_skew_seconds: u64,
) -> Result<(), SlackSignatureError> {
    let signature = signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SlackSignatureError::MissingHeader(SLACK_SIGNATURE_HEADER))?;
    let timestamp = timestamp
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SlackSignatureError::MissingHeader(SLACK_TIMESTAMP_HEADER))?;

    validate_timestamp_skew(timestamp, now_unix_ms, max_skew_seconds)?;

    let digest_hex = signature
        .strip_prefix("v0=")
        .ok_or(SlackSignatureError::MalformedSignature)?;
    let signature_bytes = decode_hex(digest_hex).ok_or(SlackSignatureError::MalformedSignature)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SlackSignatureError::Mismatch)?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&signature_bytes)
        .map_err(|_| SlackSignatureError::Mismatch)
}

fn validate_timestamp_skew(
    timestamp: &str,
    now_unix_ms: u64,
    max_skew_seconds: u64,
) -> Result<(), SlackSignatureError> {
    let timestamp_seconds = timestamp
        .parse::<u64>()
        .map_err(|_| SlackSignatureError::InvalidTimestamp(timestamp.to_string()))?;
    if max_skew_seconds == 0 {
        return Ok(());
    }
    let skew_seconds = (now_unix_ms / 1_000).abs_diff(timestamp_seconds);
    if skew_seconds > max_skew_seconds {
        return Err(SlackSignatureError::StaleTimestamp {
            skew_seconds,
            max_skew_seconds,
        });
    }
    Ok(())
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() % 2 != 0 {
        return None;
    }
    (0..trimmed.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(trimmed.get(index..index + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
pub(crate) fn sign_for_tests(body: &[u8], timestamp: &str, signing_secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes()).expect("hmac accepts any key");
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let hex = digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("v0={hex}")
}
