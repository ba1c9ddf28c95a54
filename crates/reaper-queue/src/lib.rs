//! Purge queue store abstractions and in-memory backend.
//!
//! The store is the single owner of queue records: every mutation goes through
//! [`PurgeQueueStore`] and each operation is atomic with respect to the others.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reaper_core::{QueueRecord, QueueStatus};
use thiserror::Error;
use tokio::sync::RwLock;

mod sqlite;

pub use sqlite::SqlitePurgeQueueStore;

/// Result type for purge queue operations.
pub type QueueResult<T> = Result<T, PurgeQueueError>;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum PurgeQueueError {
    #[error("channel '{0}' is already queued")]
    DuplicateKey(String),
    #[error("channel '{0}' is not queued")]
    NotFound(String),
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Async store contract shared by the sweeps and the opt-out handler.
#[async_trait]
pub trait PurgeQueueStore: Send + Sync {
    /// Adds a record; fails with `DuplicateKey` when the channel is already queued.
    async fn insert(&self, record: QueueRecord) -> QueueResult<()>;

    /// Marks a record cancelled; fails with `NotFound` when absent. Cancelling a
    /// cancelled record leaves it untouched.
    async fn cancel(&self, channel_id: &str, cancelled_at: DateTime<Utc>) -> QueueResult<()>;

    /// Pending records ordered by enqueue time, then channel id.
    async fn list_pending(&self) -> QueueResult<Vec<QueueRecord>>;

    /// Deletes a record; fails with `NotFound` when absent.
    async fn remove(&self, channel_id: &str) -> QueueResult<()>;

    async fn get(&self, channel_id: &str) -> QueueResult<Option<QueueRecord>>;

    async fn list_all(&self) -> QueueResult<Vec<QueueRecord>>;

    /// Deletes cancelled records cancelled before `cancelled_before`, returning
    /// their channel ids.
    async fn prune_cancelled(&self, cancelled_before: DateTime<Utc>) -> QueueResult<Vec<String>>;
}

/// In-memory implementation for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryPurgeQueueStore {
    records: RwLock<HashMap<String, QueueRecord>>,
}

impl InMemoryPurgeQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_records(records: &mut [QueueRecord]) {
    records.sort_by(|left, right| {
        left.enqueued_at
            .cmp(&right.enqueued_at)
            .then_with(|| left.channel_id.cmp(&right.channel_id))
    });
}

#[async_trait]
impl PurgeQueueStore for InMemoryPurgeQueueStore {
    async fn insert(&self, record: QueueRecord) -> QueueResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.channel_id) {
            return Err(PurgeQueueError::DuplicateKey(record.channel_id));
        }
        records.insert(record.channel_id.clone(), record);
        Ok(())
    }

    async fn cancel(&self, channel_id: &str, cancelled_at: DateTime<Utc>) -> QueueResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(channel_id)
            .ok_or_else(|| PurgeQueueError::NotFound(channel_id.to_string()))?;
        if record.status == QueueStatus::Pending {
            record.status = QueueStatus::Cancelled;
            record.cancelled_at = Some(cancelled_at);
        }
        Ok(())
    }

    async fn list_pending(&self) -> QueueResult<Vec<QueueRecord>> {
        let records = self.records.read().await;
        let mut pending = records
            .values()
            .filter(|record| record.is_pending())
            .cloned()
            .collect::<Vec<_>>();
        sort_records(&mut pending);
        Ok(pending)
    }

    async fn remove(&self, channel_id: &str) -> QueueResult<()> {
        let mut records = self.records.write().await;
        records
            .remove(channel_id)
            .map(|_| ())
            .ok_or_else(|| PurgeQueueError::NotFound(channel_id.to_string()))
    }

    async fn get(&self, channel_id: &str) -> QueueResult<Option<QueueRecord>> {
        Ok(self.records.read().await.get(channel_id).cloned())
    }

    async fn list_all(&self) -> QueueResult<Vec<QueueRecord>> {
        let mut all = self
            .records
            .read()
            .await
            .values()
            .cloned()
            .collect::<Vec<_>>();
        sort_records(&mut all);
        Ok(all)
    }

    async fn prune_cancelled(&self, cancelled_before: DateTime<Utc>) -> QueueResult<Vec<String>> {
        let mut records = self.records.write().await;
        let mut pruned = records
            .values()
            .filter(|record| {
                record.status == QueueStatus::Cancelled
                    && record
                        .cancelled_at
                        .is_some_and(|cancelled_at| cancelled_at < cancelled_before)
            })
            .map(|record| record.channel_id.clone())
            .collect::<Vec<_>>();
        pruned.sort();
        for channel_id in &pruned {
            records.remove(channel_id);
        }
        Ok(pruned)
    }
}
