//! Draining the offline queue into the server's bulk ingest endpoint.

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::ingest::IngestError;
use crate::models::{LocalId, QueueEntry, TripSubmission};
use crate::queue::QueueStore;

pub use http::HttpSyncClient;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid sync configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync API error: {0}")]
    Api(String),
    #[error("Server rejected trips: {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid sync response: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("Local queue error: {0}")]
    Queue(#[from] crate::Error),
}

impl SyncError {
    /// The server could not be reached or was temporarily unavailable.
    ///
    /// Submissions failing this way are safe to queue and retry; anything
    /// else needs the caller's attention.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Http(error) => !error.is_decode(),
            Self::Api(_) => true,
            _ => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Delivers an ordered batch to the ingestor and returns the server ids
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn submit_batch(&self, trips: &[TripSubmission]) -> SyncResult<Vec<i64>>;
}

/// A queue entry accepted by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncedEntry {
    pub local_id: LocalId,
    pub server_id: i64,
}

/// Result of one flush. Failures are reported here rather than returned.
#[derive(Debug, Default)]
pub struct FlushOutcome {
    /// Entries marked synced by this flush
    pub synced_count: usize,
    pub synced: Vec<SyncedEntry>,
    pub error: Option<SyncError>,
}

impl FlushOutcome {
    fn failed(error: SyncError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// How a submission was stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted by the server
    Saved(Vec<i64>),
    /// Held in the local queue until the next successful flush
    SavedOffline(LocalId),
}

impl SubmitOutcome {
    /// Message shown to the driver
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Saved(_) => "Trip saved",
            Self::SavedOffline(_) => "Saved offline - will sync later",
        }
    }
}

/// Single writer for a local queue.
///
/// Flushes and online submissions hold one async mutex for their whole
/// read-submit-mark cycle, so a queue entry is never submitted twice
/// concurrently and queued trips always reach the server before newer ones.
pub struct SyncCoordinator {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn SyncTransport>,
    online: watch::Receiver<bool>,
    flush_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn SyncTransport>,
        online: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            transport,
            online,
            flush_lock: Mutex::new(()),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    /// Submit every pending entry as one batch
    pub async fn flush(&self) -> FlushOutcome {
        let _guard = self.flush_lock.lock().await;
        self.flush_locked().await
    }

    async fn flush_locked(&self) -> FlushOutcome {
        if !self.is_online() {
            tracing::debug!("Offline; skipping flush");
            return FlushOutcome::default();
        }

        let pending = match self.store.list_pending().await {
            Ok(pending) => pending,
            Err(error) => return FlushOutcome::failed(error.into()),
        };
        if pending.is_empty() {
            return FlushOutcome::default();
        }

        // The server recomputes start odometers for queued trips
        let batch: Vec<TripSubmission> = pending
            .iter()
            .map(|entry| entry.payload.clone().without_start_hint())
            .collect();

        tracing::info!(count = batch.len(), "Flushing offline trips");
        let server_ids = match self.transport.submit_batch(&batch).await {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!(%error, pending = pending.len(), "Flush failed; entries stay pending");
                return FlushOutcome::failed(error);
            }
        };

        self.mark_submitted(&pending, &server_ids).await
    }

    async fn mark_submitted(&self, pending: &[QueueEntry], server_ids: &[i64]) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();
        for (entry, &server_id) in pending.iter().zip(server_ids) {
            match self.store.mark_synced(entry.local_id).await {
                Ok(()) => {
                    outcome.synced_count += 1;
                    outcome.synced.push(SyncedEntry {
                        local_id: entry.local_id,
                        server_id,
                    });
                }
                Err(error) => {
                    tracing::error!(
                        local_id = %entry.local_id,
                        %error,
                        "Trip reached the server but could not be marked synced"
                    );
                    if outcome.error.is_none() {
                        outcome.error = Some(error.into());
                    }
                }
            }
        }

        tracing::info!(synced = outcome.synced_count, "Flush complete");
        outcome
    }

    /// Record a trip, falling back to the local queue when the server is out of reach.
    ///
    /// Validation failures reported by the server are returned, not queued.
    pub async fn submit(&self, payload: TripSubmission) -> SyncResult<SubmitOutcome> {
        let _guard = self.flush_lock.lock().await;

        if !self.is_online() {
            return self.enqueue_offline(payload).await;
        }

        // Older queued trips must reach the server first to keep chaining intact
        if self.store.pending_count().await? > 0 {
            match self.flush_locked().await.error {
                None => {}
                Some(error) if error.is_connectivity() => {
                    tracing::warn!(%error, "Server unreachable while draining backlog; queueing trip");
                    return self.enqueue_offline(payload).await;
                }
                Some(error) => return Err(error),
            }
            if self.store.pending_count().await? > 0 {
                return self.enqueue_offline(payload).await;
            }
        }

        match self
            .transport
            .submit_batch(std::slice::from_ref(&payload))
            .await
        {
            Ok(ids) => Ok(SubmitOutcome::Saved(ids)),
            Err(error) if error.is_connectivity() => {
                tracing::warn!(%error, "Server unreachable; queueing trip");
                self.enqueue_offline(payload).await
            }
            Err(error) => Err(error),
        }
    }

    async fn enqueue_offline(&self, payload: TripSubmission) -> SyncResult<SubmitOutcome> {
        let entry = self.store.enqueue(payload.without_start_hint()).await?;
        tracing::info!(local_id = %entry.local_id, "Saved offline - will sync later");
        Ok(SubmitOutcome::SavedOffline(entry.local_id))
    }
}
