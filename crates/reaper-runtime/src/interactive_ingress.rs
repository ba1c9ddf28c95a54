//! HTTP ingress for Slack interactive callbacks (notice button clicks).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use reaper_core::current_unix_timestamp_ms;
use reaper_slack::{
    parse_interactive_form_body, verify_slack_request, SLACK_SIGNATURE_HEADER,
    SLACK_TIMESTAMP_HEADER,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::opt_out::OptOutHandler;

pub const INTERACTIVE_ENDPOINT: &str = "/slack/interactive";
pub const HEALTH_ENDPOINT: &str = "/healthz";
pub const DEFAULT_SIGNATURE_MAX_SKEW_SECONDS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveIngressConfig {
    pub bind_addr: SocketAddr,
    /// When unset, request signatures are not checked.
    pub signing_secret: Option<String>,
    pub max_skew_seconds: u64,
}

pub struct InteractiveIngressState {
    config: InteractiveIngressConfig,
    handler: OptOutHandler,
}

impl InteractiveIngressState {
    pub fn new(config: InteractiveIngressConfig, handler: OptOutHandler) -> Self {
        Self { config, handler }
    }
}

pub fn build_interactive_router(state: Arc<InteractiveIngressState>) -> Router {
    Router::new()
        .route(INTERACTIVE_ENDPOINT, post(handle_interactive_callback))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

/// Serves the ingress until `shutdown` flips to true.
pub async fn serve_interactive_ingress(
    state: Arc<InteractiveIngressState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let bind_addr = state.config.bind_addr;
    if state.config.signing_secret.is_none() {
        tracing::warn!(
            "slack signing secret not configured; interactive requests are not verified"
        );
    }
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind interactive ingress to {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve interactive ingress address")?;
    tracing::info!(addr = %local_addr, "interactive ingress listening");

    axum::serve(listener, build_interactive_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("interactive ingress exited unexpectedly")
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn handle_interactive_callback(
    State(state): State<Arc<InteractiveIngressState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.config.signing_secret.as_deref() {
        let signature = header_value(&headers, SLACK_SIGNATURE_HEADER);
        let timestamp = header_value(&headers, SLACK_TIMESTAMP_HEADER);
        if let Err(error) = verify_slack_request(
            &body,
            signature,
            timestamp,
            secret,
            current_unix_timestamp_ms(),
            state.config.max_skew_seconds,
        ) {
            tracing::warn!(error = %error, "rejected interactive request");
            return (StatusCode::UNAUTHORIZED, error.to_string()).into_response();
        }
    }

    let action = match parse_interactive_form_body(&body) {
        Ok(action) => action,
        Err(error) => {
            tracing::warn!(error = %error, "malformed interactive payload");
            return (StatusCode::BAD_REQUEST, error.to_string()).into_response();
        }
    };

    match state.handler.handle(&action, Utc::now()).await {
        Ok(outcome) => match outcome.acknowledgement(&action.channel_id) {
            Some(text) => (
                StatusCode::OK,
                Json(json!({
                    "response_type": "ephemeral",
                    "replace_original": false,
                    "text": text,
                })),
            )
                .into_response(),
            None => StatusCode::OK.into_response(),
        },
        Err(error) => {
            tracing::error!(
                channel_id = %action.channel_id,
                error = %error,
                "failed to apply opt-out"
            );
            // Non-2xx makes Slack redeliver the callback.
            (StatusCode::INTERNAL_SERVER_ERROR, "opt-out could not be recorded").into_response()
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
