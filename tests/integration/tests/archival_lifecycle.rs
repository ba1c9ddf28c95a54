use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use httpmock::prelude::*;
use reaper_core::{current_unix_timestamp_ms, format_slack_ts, InactivityThreshold, QueueStatus};
use reaper_queue::{PurgeQueueStore, SqlitePurgeQueueStore};
use reaper_runtime::{
    build_interactive_router, InteractiveIngressConfig, InteractiveIngressState, NotifySweep,
    NotifySweepConfig, OptOutHandler, PurgeSweep,
};
use reaper_slack::{SlackApiClient, WorkspaceApi};
use serde_json::json;
use sha2::Sha256;
use tempfile::tempdir;
use tokio::net::TcpListener;

const SIGNING_SECRET: &str = "lifecycle-secret";

fn slack_client(server: &MockServer) -> Arc<dyn WorkspaceApi> {
    Arc::new(
        SlackApiClient::new(server.base_url(), "xoxb-lifecycle".to_string(), 2_000)
            .expect("slack client"),
    )
}

fn history_body(last_activity: Option<DateTime<Utc>>) -> serde_json::Value {
    match last_activity {
        Some(at) => json!({
            "ok": true,
            "messages": [{"type": "message", "ts": format_slack_ts(at)}]
        }),
        None => json!({"ok": true, "messages": []}),
    }
}

fn signed_opt_out(channel_id: &str, value: &str) -> (String, String, String) {
    let payload = json!({
        "type": "interactive_message",
        "callback_id": "archive_channels",
        "channel": {"id": channel_id},
        "user": {"id": "U42"},
        "actions": [{"name": "archive", "type": "button", "value": value}]
    })
    .to_string();
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payload", &payload)
        .finish();
    let timestamp = (current_unix_timestamp_ms() / 1_000).to_string();
    let mut mac = Hmac::<Sha256>::new_from_slice(SIGNING_SECRET.as_bytes()).expect("hmac");
    mac.update(format!("v0:{timestamp}:{body}").as_bytes());
    let signature = format!(
        "v0={}",
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>()
    );
    (body, timestamp, signature)
}

async fn spawn_ingress(
    store: Arc<dyn PurgeQueueStore>,
    workspace: Arc<dyn WorkspaceApi>,
) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = Arc::new(InteractiveIngressState::new(
        InteractiveIngressConfig {
            bind_addr: addr,
            signing_secret: Some(SIGNING_SECRET.to_string()),
            max_skew_seconds: 300,
        },
        OptOutHandler::new(store, workspace),
    ));
    let app = build_interactive_router(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(25)).await;
    (addr, handle)
}

#[tokio::test]
async fn integration_notify_opt_out_and_purge_lifecycle() {
    let temp = tempdir().expect("tempdir");
    let server = MockServer::start();
    let now = Utc::now();

    server.mock(|when, then| {
        when.method(POST).path("/conversations.list");
        then.status(200).json_body(json!({
            "ok": true,
            "channels": [
                {"id": "C0", "name": "general", "is_general": true},
                {"id": "C1", "name": "busy"},
                {"id": "C2", "name": "stale"},
                {"id": "C3", "name": "empty"}
            ],
            "response_metadata": {"next_cursor": ""}
        }));
    });
    for (channel_id, last_activity) in [
        ("C1", Some(now - ChronoDuration::days(2))),
        ("C2", Some(now - ChronoDuration::days(45))),
        ("C3", None),
    ] {
        let body = history_body(last_activity);
        server.mock(move |when, then| {
            when.method(POST)
                .path("/conversations.history")
                .body_includes(format!("channel={channel_id}"));
            then.status(200).json_body(body);
        });
    }
    let post_c2 = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"C2\"")
            .body_includes("archive_channels");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C2", "ts": "1717245000.000200"}));
    });
    let post_c3 = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"C3\"");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C3", "ts": "1717245000.000300"}));
    });
    let pins = server.mock(|when, then| {
        when.method(POST).path("/pins.add");
        then.status(200).json_body(json!({"ok": true}));
    });
    let unpin_c3 = server.mock(|when, then| {
        when.method(POST)
            .path("/pins.remove")
            .body_includes("1717245000.000300");
        then.status(200).json_body(json!({"ok": true}));
    });
    let archive_c2 = server.mock(|when, then| {
        when.method(POST)
            .path("/conversations.archive")
            .body_includes("\"channel\":\"C2\"");
        then.status(200).json_body(json!({"ok": true}));
    });
    let archive_c3 = server.mock(|when, then| {
        when.method(POST)
            .path("/conversations.archive")
            .body_includes("\"channel\":\"C3\"");
        then.status(200).json_body(json!({"ok": true}));
    });

    let db_path = temp.path().join("state/purge-queue.sqlite");
    let store: Arc<dyn PurgeQueueStore> =
        Arc::new(SqlitePurgeQueueStore::new(&db_path).expect("store"));
    let workspace = slack_client(&server);

    let notify = NotifySweep::new(
        workspace.clone(),
        store.clone(),
        NotifySweepConfig {
            threshold: InactivityThreshold::Days(30),
            ..NotifySweepConfig::default()
        },
    );
    let report = notify.run_at(now).await.expect("notify sweep");
    assert_eq!(report.discovered, 4);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.candidate_channels, vec!["C2", "C3"]);
    assert_eq!(report.notified, 2);
    assert_eq!(post_c2.calls(), 1);
    assert_eq!(post_c3.calls(), 1);
    assert_eq!(pins.calls(), 2);

    // A fresh process sees the same queue.
    let reopened = SqlitePurgeQueueStore::new(&db_path).expect("reopen");
    let pending = reopened.list_pending().await.expect("pending");
    assert_eq!(
        pending
            .iter()
            .map(|record| (record.channel_id.as_str(), record.message_ts.as_str()))
            .collect::<Vec<_>>(),
        vec![("C2", "1717245000.000200"), ("C3", "1717245000.000300")]
    );

    let (addr, ingress) = spawn_ingress(store.clone(), workspace.clone()).await;
    let (body, timestamp, signature) = signed_opt_out("C3", "do_not_archive");
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/slack/interactive"))
        .header("content-type", "application/x-www-form-urlencoded")
        .header("x-slack-request-timestamp", timestamp)
        .header("x-slack-signature", signature)
        .body(body)
        .send()
        .await
        .expect("send opt-out");
    assert_eq!(response.status().as_u16(), 200);
    ingress.abort();
    assert_eq!(unpin_c3.calls(), 1);
    assert_eq!(
        store.get("C3").await.expect("get").expect("record").status,
        QueueStatus::Cancelled
    );

    let purge = PurgeSweep::new(workspace.clone(), store.clone(), 2);
    let purge_report = purge.run().await.expect("purge sweep");
    assert_eq!(purge_report.pending, 1);
    assert_eq!(purge_report.archived_channels, vec!["C2"]);
    assert_eq!(archive_c2.calls(), 1);
    assert_eq!(archive_c3.calls(), 0);
    assert!(store.get("C2").await.expect("get").is_none());

    // The opt-out tombstone keeps C3 from being warned again.
    let second = notify
        .run_at(now + ChronoDuration::days(1))
        .await
        .expect("second notify sweep");
    assert_eq!(second.already_queued, 1);
    assert_eq!(post_c3.calls(), 1);
}

#[tokio::test]
async fn integration_failed_archive_keeps_record_for_next_sweep() {
    let temp = tempdir().expect("tempdir");
    let server = MockServer::start();
    let mut archive = server.mock(|when, then| {
        when.method(POST).path("/conversations.archive");
        then.status(200)
            .json_body(json!({"ok": false, "error": "ratelimited"}));
    });

    let store: Arc<dyn PurgeQueueStore> = Arc::new(
        SqlitePurgeQueueStore::new(temp.path().join("queue.sqlite")).expect("store"),
    );
    store
        .insert(reaper_core::QueueRecord::pending(
            reaper_core::NoticeRef::new("C7", "1717245000.000700"),
            Utc::now(),
        ))
        .await
        .expect("insert");
    let purge = PurgeSweep::new(slack_client(&server), store.clone(), 1);

    let first = purge.run().await.expect("first purge");
    assert_eq!(first.failed_channels, vec!["C7"]);
    assert!(store.get("C7").await.expect("get").is_some());

    archive.delete();
    server.mock(|when, then| {
        when.method(POST).path("/conversations.archive");
        then.status(200).json_body(json!({"ok": true}));
    });
    let second = purge.run().await.expect("second purge");
    assert_eq!(second.archived_channels, vec!["C7"]);
    assert!(store.list_all().await.expect("list").is_empty());
}
