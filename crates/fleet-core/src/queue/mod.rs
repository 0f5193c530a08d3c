//! Client-side holding area for trip submissions that have not reached the
//! server yet.
//!
//! Entries are replayed in `seq` order, which is assigned at enqueue time and
//! never derived from storage iteration order or from the local id.

mod libsql_store;
mod memory;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{LocalId, QueueEntry, TripSubmission};

pub use libsql_store::LibSqlQueueStore;
pub use memory::MemoryQueueStore;

/// Durable offline queue of trip submissions
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a submission as a new pending entry.
    ///
    /// Fails with [`Error::StorageFull`] when the store has no space left.
    async fn enqueue(&self, payload: TripSubmission) -> Result<QueueEntry>;

    /// Pending entries in insertion order
    async fn list_pending(&self) -> Result<Vec<QueueEntry>>;

    /// Mark an entry synced. Repeated calls and unknown ids are no-ops.
    async fn mark_synced(&self, local_id: LocalId) -> Result<()>;

    /// Every entry, pending and synced, in insertion order
    async fn list_all(&self) -> Result<Vec<QueueEntry>>;

    async fn pending_count(&self) -> Result<usize>;

    /// Delete synced entries and return how many were removed
    async fn prune_synced(&self) -> Result<usize>;
}

/// Reject submissions the server could never accept.
///
/// A queued entry that always fails validation would block every later flush,
/// so these are refused before they are stored.
pub(crate) fn validate_payload(payload: &TripSubmission) -> Result<()> {
    if payload.driver_id.trim().is_empty() {
        return Err(Error::InvalidInput("driver_id is required".to_string()));
    }
    if payload.vehicle_id.trim().is_empty() {
        return Err(Error::InvalidInput("vehicle_id is required".to_string()));
    }
    if payload.end_odometer.is_none() {
        return Err(Error::InvalidInput("end_odometer is required".to_string()));
    }
    Ok(())
}
