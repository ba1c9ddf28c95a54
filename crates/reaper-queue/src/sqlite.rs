//! SQLite-backed `PurgeQueueStore` implementation with durable persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reaper_core::{QueueRecord, QueueStatus};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::{PurgeQueueError, PurgeQueueStore, QueueResult};

const SELECT_RECORD_COLUMNS: &str =
    "SELECT channel_id, message_ts, enqueued_at, status, cancelled_at FROM purge_queue";

/// Persistent SQLite store backing the `purge_queue` table.
#[derive(Debug)]
pub struct SqlitePurgeQueueStore {
    db_path: PathBuf,
}

impl SqlitePurgeQueueStore {
    /// Opens (or creates) the store at `path`, creating the schema if needed.
    pub fn new(path: impl AsRef<Path>) -> QueueResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        initialize_schema(&connection)?;
        Ok(store)
    }

    fn open_connection(&self) -> QueueResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            "#,
        )?;
        Ok(connection)
    }
}

fn initialize_schema(connection: &Connection) -> QueueResult<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS purge_queue (
            channel_id TEXT PRIMARY KEY,
            message_ts TEXT NOT NULL,
            enqueued_at TEXT NOT NULL,
            status TEXT NOT NULL,
            cancelled_at TEXT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_purge_queue_status
            ON purge_queue (status, enqueued_at, channel_id);
        "#,
    )?;
    Ok(())
}

#[async_trait]
impl PurgeQueueStore for SqlitePurgeQueueStore {
    async fn insert(&self, record: QueueRecord) -> QueueResult<()> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = transaction
            .query_row(
                "SELECT 1 FROM purge_queue WHERE channel_id = ?1",
                params![record.channel_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(PurgeQueueError::DuplicateKey(record.channel_id));
        }

        transaction.execute(
            r#"
            INSERT INTO purge_queue (channel_id, message_ts, enqueued_at, status, cancelled_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.channel_id,
                record.message_ts,
                timestamp_to_db(record.enqueued_at),
                record.status.as_str(),
                record.cancelled_at.map(timestamp_to_db),
            ],
        )?;
        transaction.commit()?;
        Ok(())
    }

    async fn cancel(&self, channel_id: &str, cancelled_at: DateTime<Utc>) -> QueueResult<()> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status = transaction
            .query_row(
                "SELECT status FROM purge_queue WHERE channel_id = ?1",
                params![channel_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| PurgeQueueError::NotFound(channel_id.to_string()))?;

        if status_from_db(&status)? == QueueStatus::Pending {
            transaction.execute(
                "UPDATE purge_queue SET status = ?1, cancelled_at = ?2 WHERE channel_id = ?3",
                params![
                    QueueStatus::Cancelled.as_str(),
                    timestamp_to_db(cancelled_at),
                    channel_id
                ],
            )?;
        }
        transaction.commit()?;
        Ok(())
    }

    async fn list_pending(&self) -> QueueResult<Vec<QueueRecord>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(&format!(
            "{SELECT_RECORD_COLUMNS} WHERE status = ?1 ORDER BY enqueued_at, channel_id"
        ))?;
        let rows = statement.query_map(params![QueueStatus::Pending.as_str()], read_raw_row)?;
        let records = rows
            .map(|row| record_from_raw(row?))
            .collect::<QueueResult<Vec<_>>>();
        records
    }

    async fn remove(&self, channel_id: &str) -> QueueResult<()> {
        let connection = self.open_connection()?;
        let deleted = connection.execute(
            "DELETE FROM purge_queue WHERE channel_id = ?1",
            params![channel_id],
        )?;
        if deleted == 0 {
            return Err(PurgeQueueError::NotFound(channel_id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, channel_id: &str) -> QueueResult<Option<QueueRecord>> {
        let connection = self.open_connection()?;
        connection
            .query_row(
                &format!("{SELECT_RECORD_COLUMNS} WHERE channel_id = ?1"),
                params![channel_id],
                read_raw_row,
            )
            .optional()?
            .map(record_from_raw)
            .transpose()
    }

    async fn list_all(&self) -> QueueResult<Vec<QueueRecord>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(&format!(
            "{SELECT_RECORD_COLUMNS} ORDER BY enqueued_at, channel_id"
        ))?;
        let rows = statement.query_map([], read_raw_row)?;
        let records = rows
            .map(|row| record_from_raw(row?))
            .collect::<QueueResult<Vec<_>>>();
        records
    }

    async fn prune_cancelled(&self, cancelled_before: DateTime<Utc>) -> QueueResult<Vec<String>> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let cutoff = timestamp_to_db(cancelled_before);

        let pruned = {
            let mut statement = transaction.prepare(
                r#"
                SELECT channel_id FROM purge_queue
                WHERE status = ?1 AND cancelled_at IS NOT NULL AND cancelled_at < ?2
                ORDER BY channel_id
                "#,
            )?;
            let rows = statement.query_map(
                params![QueueStatus::Cancelled.as_str(), cutoff],
                |row| row.get::<_, String>(0),
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        transaction.execute(
            "DELETE FROM purge_queue WHERE status = ?1 AND cancelled_at IS NOT NULL AND cancelled_at < ?2",
            params![QueueStatus::Cancelled.as_str(), cutoff],
        )?;
        transaction.commit()?;
        Ok(pruned)
    }
}

type RawQueueRow = (String, String, String, String, Option<String>);

fn read_raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawQueueRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn record_from_raw(
    (channel_id, message_ts, enqueued_at, status, cancelled_at): RawQueueRow,
) -> QueueResult<QueueRecord> {
    Ok(QueueRecord {
        channel_id,
        message_ts,
        enqueued_at: timestamp_from_db(&enqueued_at)?,
        status: status_from_db(&status)?,
        cancelled_at: cancelled_at.as_deref().map(timestamp_from_db).transpose()?,
    })
}

// Fixed-width UTC so lexical order in SQL matches chronological order.
fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_from_db(value: &str) -> QueueResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn status_from_db(value: &str) -> QueueResult<QueueStatus> {
    match value {
        "pending" => Ok(QueueStatus::Pending),
        "cancelled" => Ok(QueueStatus::Cancelled),
        _ => Err(PurgeQueueError::InvalidPersistedValue {
            field: "status",
            value: value.to_string(),
        }),
    }
}
