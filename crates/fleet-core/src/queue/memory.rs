//! In-process queue: an ordered map keyed by a monotonic sequence counter

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{validate_payload, QueueStore};
use crate::error::{Error, Result};
use crate::models::{LocalId, QueueEntry, SyncStatus, TripSubmission};
use crate::util::unix_millis_now;

#[derive(Default)]
struct State {
    next_seq: i64,
    entries: BTreeMap<i64, QueueEntry>,
}

/// Volatile queue, optionally bounded to a fixed number of entries
#[derive(Default)]
pub struct MemoryQueueStore {
    state: Mutex<State>,
    capacity: Option<usize>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue that reports `StorageFull` once it holds `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::default(),
            capacity: Some(capacity),
        }
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, payload: TripSubmission) -> Result<QueueEntry> {
        validate_payload(&payload)?;

        let mut state = self.state.lock().await;
        if let Some(capacity) = self.capacity {
            if state.entries.len() >= capacity {
                return Err(Error::StorageFull(format!(
                    "queue holds {capacity} entries"
                )));
            }
        }

        state.next_seq += 1;
        let entry = QueueEntry {
            local_id: LocalId::new(),
            seq: state.next_seq,
            payload,
            sync_status: SyncStatus::Pending,
            created_at: unix_millis_now(),
        };
        state.entries.insert(entry.seq, entry.clone());
        Ok(entry)
    }

    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .filter(|entry| entry.is_pending())
            .cloned()
            .collect())
    }

    async fn mark_synced(&self, local_id: LocalId) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state
            .entries
            .values_mut()
            .find(|entry| entry.local_id == local_id)
        {
            entry.sync_status = SyncStatus::Synced;
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<QueueEntry>> {
        let state = self.state.lock().await;
        Ok(state.entries.values().cloned().collect())
    }

    async fn pending_count(&self) -> Result<usize> {
        let state = self.state.lock().await;
        Ok(state.entries.values().filter(|entry| entry.is_pending()).count())
    }

    async fn prune_synced(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_pending());
        Ok(before - state.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(end: i64) -> TripSubmission {
        TripSubmission::new("driver-1", "v-1", end, None)
    }

    #[tokio::test]
    async fn replays_in_sequence_order() {
        let store = MemoryQueueStore::new();
        for end in [30, 10, 20] {
            store.enqueue(trip(end)).await.unwrap();
        }

        let ends: Vec<Option<i64>> = store
            .list_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.payload.end_odometer)
            .collect();
        assert_eq!(ends, vec![Some(30), Some(10), Some(20)]);
    }

    #[tokio::test]
    async fn sequence_keeps_growing_after_prune() {
        let store = MemoryQueueStore::new();
        let first = store.enqueue(trip(1)).await.unwrap();
        store.mark_synced(first.local_id).await.unwrap();
        store.mark_synced(first.local_id).await.unwrap();
        assert_eq!(store.prune_synced().await.unwrap(), 1);

        let second = store.enqueue(trip(2)).await.unwrap();
        assert!(second.seq > first.seq);
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn capacity_reports_storage_full() {
        let store = MemoryQueueStore::with_capacity(1);
        store.enqueue(trip(1)).await.unwrap();

        let result = store.enqueue(trip(2)).await;
        assert!(matches!(result, Err(Error::StorageFull(_))));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
