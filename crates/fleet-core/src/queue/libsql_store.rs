//! Offline queue backed by a local libSQL database

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::path::Path;

use async_trait::async_trait;
use libsql::{params, Row};

use super::{validate_payload, QueueStore};
use crate::db::{Database, SchemaKind};
use crate::error::{Error, Result};
use crate::models::{LocalId, QueueEntry, SyncStatus, TripSubmission};
use crate::util::unix_millis_now;

const SELECT_COLUMNS: &str =
    "SELECT seq, local_id, driver_id, vehicle_id, end_odo, start_odo, purpose, sync_status, created_at
     FROM queued_trips";

/// Queue stored in the `queued_trips` table of a client database
pub struct LibSqlQueueStore {
    db: Database,
}

impl LibSqlQueueStore {
    /// Open (or create) the queue database at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(path, SchemaKind::Client).await?;
        Ok(Self { db })
    }

    /// In-memory queue (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory(SchemaKind::Client).await?;
        Ok(Self { db })
    }

    async fn select(&self, filter: &str, params: impl libsql::params::IntoParams) -> Result<Vec<QueueEntry>> {
        let sql = format!("{SELECT_COLUMNS} {filter} ORDER BY seq ASC");
        let mut rows = self.db.connection().query(&sql, params).await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    fn parse_entry(row: &Row) -> Result<QueueEntry> {
        let local_id: String = row.get(1)?;
        let local_id = local_id
            .parse::<LocalId>()
            .map_err(|error| Error::Database(format!("invalid local id `{local_id}`: {error}")))?;
        let status: String = row.get(7)?;
        let sync_status = status.parse::<SyncStatus>().map_err(Error::Database)?;

        Ok(QueueEntry {
            local_id,
            seq: row.get(0)?,
            payload: TripSubmission {
                driver_id: row.get(2)?,
                vehicle_id: row.get(3)?,
                end_odometer: row.get(4)?,
                start_odometer: row.get(5)?,
                purpose: row.get(6)?,
            },
            sync_status,
            created_at: row.get(8)?,
        })
    }
}

#[async_trait]
impl QueueStore for LibSqlQueueStore {
    async fn enqueue(&self, payload: TripSubmission) -> Result<QueueEntry> {
        validate_payload(&payload)?;

        let local_id = LocalId::new();
        let created_at = unix_millis_now();
        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO queued_trips (local_id, driver_id, vehicle_id, end_odo, start_odo, purpose, sync_status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                local_id.as_str(),
                payload.driver_id.clone(),
                payload.vehicle_id.clone(),
                payload.end_odometer,
                payload.start_odometer,
                payload.purpose.clone(),
                SyncStatus::Pending.as_str(),
                created_at
            ],
        )
        .await
        .map_err(Error::from_storage_write)?;

        let entry = QueueEntry {
            local_id,
            seq: conn.last_insert_rowid(),
            payload,
            sync_status: SyncStatus::Pending,
            created_at,
        };
        tracing::debug!(local_id = %entry.local_id, seq = entry.seq, "Queued trip offline");
        Ok(entry)
    }

    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        self.select("WHERE sync_status = ?", [SyncStatus::Pending.as_str()])
            .await
    }

    async fn mark_synced(&self, local_id: LocalId) -> Result<()> {
        self.db
            .connection()
            .execute(
                "UPDATE queued_trips SET sync_status = ? WHERE local_id = ?",
                params![SyncStatus::Synced.as_str(), local_id.as_str()],
            )
            .await
            .map_err(Error::from_storage_write)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<QueueEntry>> {
        self.select("", ()).await
    }

    async fn pending_count(&self) -> Result<usize> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT COUNT(*) FROM queued_trips WHERE sync_status = ?",
                [SyncStatus::Pending.as_str()],
            )
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(count as usize)
    }

    async fn prune_synced(&self) -> Result<usize> {
        let removed = self
            .db
            .connection()
            .execute(
                "DELETE FROM queued_trips WHERE sync_status = ?",
                [SyncStatus::Synced.as_str()],
            )
            .await?;
        if removed > 0 {
            tracing::info!(removed, "Pruned synced queue entries");
        }
        Ok(removed as usize)
    }
}
