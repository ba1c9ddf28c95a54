//! Purge sweep: archive every channel still pending in the purge queue.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reaper_core::QueueRecord;
use reaper_queue::{PurgeQueueError, PurgeQueueStore};
use reaper_slack::WorkspaceApi;
use serde::Serialize;

use crate::sweep_scheduler::SweepJob;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSweepReport {
    pub pending: usize,
    pub archived: usize,
    pub skipped_cancelled: usize,
    pub failed: usize,
    pub archived_channels: Vec<String>,
    pub failed_channels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordPurgeOutcome {
    Archived,
    SkippedCancelled,
    Failed,
}

pub struct PurgeSweep {
    workspace: Arc<dyn WorkspaceApi>,
    store: Arc<dyn PurgeQueueStore>,
    concurrency: usize,
}

impl PurgeSweep {
    pub fn new(
        workspace: Arc<dyn WorkspaceApi>,
        store: Arc<dyn PurgeQueueStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            workspace,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Archives every pending channel. A failed record stays queued for the
    /// next sweep and never stops the others.
    pub async fn run(&self) -> Result<PurgeSweepReport> {
        let pending = self
            .store
            .list_pending()
            .await
            .context("failed to list pending purge records")?;
        let mut report = PurgeSweepReport {
            pending: pending.len(),
            ..PurgeSweepReport::default()
        };
        if pending.is_empty() {
            tracing::info!("purge queue is empty");
            return Ok(report);
        }

        let outcomes = stream::iter(pending)
            .map(|record| async move {
                let outcome = self.purge_record(&record).await;
                (record.channel_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        for (channel_id, outcome) in outcomes {
            match outcome {
                RecordPurgeOutcome::Archived => {
                    report.archived += 1;
                    report.archived_channels.push(channel_id);
                }
                RecordPurgeOutcome::SkippedCancelled => report.skipped_cancelled += 1,
                RecordPurgeOutcome::Failed => {
                    report.failed += 1;
                    report.failed_channels.push(channel_id);
                }
            }
        }
        report.archived_channels.sort();
        report.failed_channels.sort();
        Ok(report)
    }

    async fn purge_record(&self, record: &QueueRecord) -> RecordPurgeOutcome {
        let channel_id = record.channel_id.as_str();
        // Opt-outs can land between the listing and this point.
        match self.store.get(channel_id).await {
            Ok(Some(current)) if current.is_pending() => {}
            Ok(_) => {
                tracing::info!(channel_id, "purge skipped: archival was cancelled");
                return RecordPurgeOutcome::SkippedCancelled;
            }
            Err(error) => {
                tracing::error!(channel_id, error = %error, "failed to re-read purge record");
                return RecordPurgeOutcome::Failed;
            }
        }

        if let Err(error) = self.workspace.archive_channel(channel_id).await {
            tracing::warn!(
                channel_id,
                rate_limited = error.is_rate_limited(),
                error = %error,
                "channel archive failed; record retained for next sweep"
            );
            return RecordPurgeOutcome::Failed;
        }

        match self.store.remove(channel_id).await {
            Ok(()) | Err(PurgeQueueError::NotFound(_)) => {
                tracing::info!(channel_id, "channel archived");
                RecordPurgeOutcome::Archived
            }
            Err(error) => {
                tracing::error!(
                    channel_id,
                    error = %error,
                    "channel archived but purge record was not removed"
                );
                RecordPurgeOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl SweepJob for PurgeSweep {
    fn name(&self) -> &'static str {
        "purge"
    }

    async fn run_sweep(&self) -> Result<()> {
        let report = self.run().await?;
        tracing::info!(
            pending = report.pending,
            archived = report.archived,
            skipped_cancelled = report.skipped_cancelled,
            failed = report.failed,
            "purge sweep finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use reaper_core::{NoticeRef, QueueRecord, QueueStatus};
    use reaper_queue::{InMemoryPurgeQueueStore, PurgeQueueStore, QueueResult};
    use tokio::sync::oneshot;

    use super::PurgeSweep;
    use crate::test_support::ScriptedWorkspace;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 13, 0, 0).unwrap()
    }

    async fn queued_store(channel_ids: &[&str]) -> Arc<InMemoryPurgeQueueStore> {
        let store = Arc::new(InMemoryPurgeQueueStore::new());
        for (index, channel_id) in channel_ids.iter().enumerate() {
            store
                .insert(QueueRecord::pending(
                    NoticeRef::new(*channel_id, format!("1700000000.00000{index}")),
                    at(1),
                ))
                .await
                .expect("insert");
        }
        store
    }

    #[tokio::test]
    async fn functional_purge_archives_and_removes_pending_records() {
        let workspace = Arc::new(ScriptedWorkspace::default());
        let store = queued_store(&["C1", "C2"]).await;

        let report = PurgeSweep::new(workspace.clone(), store.clone(), 2)
            .run()
            .await
            .expect("purge");

        assert_eq!(report.pending, 2);
        assert_eq!(report.archived, 2);
        assert_eq!(workspace.archived(), vec!["C1", "C2"]);
        assert!(store.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn functional_cancelled_record_is_kept_and_not_archived() {
        let workspace = Arc::new(ScriptedWorkspace::default());
        let store = queued_store(&["C1", "C2"]).await;
        store.cancel("C2", at(2)).await.expect("cancel");

        let report = PurgeSweep::new(workspace.clone(), store.clone(), 1)
            .run()
            .await
            .expect("purge");

        assert_eq!(report.archived_channels, vec!["C1"]);
        assert_eq!(workspace.lock().archive_attempts, vec!["C1"]);
        let remaining = store.get("C2").await.expect("get").expect("record");
        assert_eq!(remaining.status, QueueStatus::Cancelled);
    }

    #[tokio::test]
    async fn regression_one_archive_failure_keeps_only_that_record() {
        let workspace = Arc::new(ScriptedWorkspace::default());
        workspace
            .lock()
            .fail_archive
            .insert("C2".to_string(), "already_archived".to_string());
        let store = queued_store(&["C1", "C2", "C3", "C4"]).await;

        let report = PurgeSweep::new(workspace.clone(), store.clone(), 4)
            .run()
            .await
            .expect("purge");

        assert_eq!(report.archived, 3);
        assert_eq!(report.failed_channels, vec!["C2"]);
        let remaining = store
            .list_pending()
            .await
            .expect("pending")
            .into_iter()
            .map(|record| record.channel_id)
            .collect::<Vec<_>>();
        assert_eq!(remaining, vec!["C2"]);
    }

    #[tokio::test]
    async fn unit_empty_queue_makes_no_calls() {
        let workspace = Arc::new(ScriptedWorkspace::default());
        let store = Arc::new(InMemoryPurgeQueueStore::new());
        let report = PurgeSweep::new(workspace.clone(), store, 1)
            .run()
            .await
            .expect("purge");
        assert_eq!(report.pending, 0);
        assert!(workspace.lock().archive_attempts.is_empty());
    }

    /// Pauses `list_pending` until the test releases it, so an opt-out can be
    /// applied after the purge sweep has taken its snapshot.
    struct PausingStore {
        inner: InMemoryPurgeQueueStore,
        listed_tx: Mutex<Option<oneshot::Sender<()>>>,
        resume_rx: tokio::sync::Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl PurgeQueueStore for PausingStore {
        async fn insert(&self, record: QueueRecord) -> QueueResult<()> {
            self.inner.insert(record).await
        }

        async fn cancel(&self, channel_id: &str, cancelled_at: DateTime<Utc>) -> QueueResult<()> {
            self.inner.cancel(channel_id, cancelled_at).await
        }

        async fn list_pending(&self) -> QueueResult<Vec<QueueRecord>> {
            let snapshot = self.inner.list_pending().await?;
            let listed_tx = self.listed_tx.lock().expect("listed lock").take();
            if let Some(listed_tx) = listed_tx {
                let _ = listed_tx.send(());
            }
            let resume_rx = self.resume_rx.lock().await.take();
            if let Some(resume_rx) = resume_rx {
                let _ = resume_rx.await;
            }
            Ok(snapshot)
        }

        async fn remove(&self, channel_id: &str) -> QueueResult<()> {
            self.inner.remove(channel_id).await
        }

        async fn get(&self, channel_id: &str) -> QueueResult<Option<QueueRecord>> {
            self.inner.get(channel_id).await
        }

        async fn list_all(&self) -> QueueResult<Vec<QueueRecord>> {
            self.inner.list_all().await
        }

        async fn prune_cancelled(
            &self,
            cancelled_before: DateTime<Utc>,
        ) -> QueueResult<Vec<String>> {
            self.inner.prune_cancelled(cancelled_before).await
        }
    }

    #[tokio::test]
    async fn regression_cancel_after_snapshot_prevents_archive() {
        let inner = InMemoryPurgeQueueStore::new();
        for channel_id in ["C1", "C2"] {
            inner
                .insert(QueueRecord::pending(NoticeRef::new(channel_id, "1.000001"), at(1)))
                .await
                .expect("insert");
        }
        let (listed_tx, listed_rx) = oneshot::channel();
        let (resume_tx, resume_rx) = oneshot::channel();
        let store = Arc::new(PausingStore {
            inner,
            listed_tx: Mutex::new(Some(listed_tx)),
            resume_rx: tokio::sync::Mutex::new(Some(resume_rx)),
        });
        let workspace = Arc::new(ScriptedWorkspace::default());

        let sweep = PurgeSweep::new(workspace.clone(), store.clone(), 1);
        let purge = tokio::spawn(async move { sweep.run().await });

        listed_rx.await.expect("snapshot taken");
        store.cancel("C2", at(2)).await.expect("cancel");
        resume_tx.send(()).expect("resume purge");

        let report = purge.await.expect("join").expect("purge");
        assert_eq!(report.pending, 2);
        assert_eq!(report.archived_channels, vec!["C1"]);
        assert_eq!(report.skipped_cancelled, 1);
        assert_eq!(workspace.lock().archive_attempts, vec!["C1"]);
        assert!(store.get("C2").await.expect("get").is_some());
    }
}
