//! Online/offline tracking and flush scheduling.
//!
//! The current state lives in a `watch` channel shared with the
//! [`SyncCoordinator`]. A false to true transition requests a flush. Requests
//! reach a single worker through a `Notify`, which stores at most one permit,
//! so any number of requests made while a flush runs collapse into exactly
//! one follow-up flush.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sync::{HttpSyncClient, SyncCoordinator};

/// Reports whether the server is currently reachable
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

#[async_trait]
impl ConnectivityProbe for HttpSyncClient {
    async fn is_online(&self) -> bool {
        self.is_reachable().await
    }
}

pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    flush_requests: Arc<Notify>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            state,
            flush_requests: Arc::new(Notify::new()),
        }
    }

    /// Receiver for the coordinator and any other observer
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record the connectivity state. Returns true when this came back online.
    pub fn set_online(&self, online: bool) -> bool {
        let was_online = self.state.send_replace(online);
        match (was_online, online) {
            (false, true) => {
                tracing::info!("Connectivity restored; requesting flush");
                self.request_flush();
                true
            }
            (true, false) => {
                tracing::info!("Connectivity lost; new trips will be queued");
                false
            }
            _ => false,
        }
    }

    /// Ask the flush worker to run. Coalesces with any request not yet served.
    pub fn request_flush(&self) {
        self.flush_requests.notify_one();
    }

    /// Spawn the task that runs flushes one at a time.
    ///
    /// A flush that has started always runs to completion. The task exits
    /// once the monitor is dropped.
    pub fn spawn_flush_worker(&self, coordinator: Arc<SyncCoordinator>) -> JoinHandle<()> {
        let requests = Arc::clone(&self.flush_requests);
        let mut state = self.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = requests.notified() => {
                        let outcome = coordinator.flush().await;
                        match &outcome.error {
                            None if outcome.synced_count > 0 => {
                                tracing::info!(synced = outcome.synced_count, "Background flush complete");
                            }
                            None => {}
                            Some(error) => {
                                tracing::warn!(%error, synced = outcome.synced_count, "Background flush failed");
                            }
                        }
                    }
                    changed = state.changed() => {
                        if changed.is_err() {
                            tracing::debug!("Connectivity monitor dropped; stopping flush worker");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Poll `probe` every `interval` and feed the result into [`Self::set_online`].
    ///
    /// Runs until the surrounding task is cancelled.
    pub async fn run_probe_loop(&self, probe: &dyn ConnectivityProbe, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let online = probe.is_online().await;
            self.set_online(online);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TripSubmission;
    use crate::queue::{MemoryQueueStore, QueueStore};
    use crate::sync::{SyncError, SyncResult, SyncTransport};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Blocks each call until a permit is released, and always fails
    struct GatedTransport {
        gate: Semaphore,
        started: Notify,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl GatedTransport {
        fn new() -> Self {
            Self {
                gate: Semaphore::new(0),
                started: Notify::new(),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SyncTransport for GatedTransport {
        async fn submit_batch(&self, _trips: &[TripSubmission]) -> SyncResult<Vec<i64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.started.notify_one();

            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Err(SyncError::Api("HTTP 503".to_string()))
        }
    }

    struct FixedProbe(AtomicBool);

    #[async_trait]
    impl ConnectivityProbe for FixedProbe {
        async fn is_online(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    async fn wait_for_calls(transport: &GatedTransport, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while transport.calls.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn transitions_are_reported() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.is_online());
        assert!(!monitor.set_online(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn requests_during_flush_coalesce_into_one_follow_up() {
        let monitor = ConnectivityMonitor::new(false);
        let store = Arc::new(MemoryQueueStore::new());
        store
            .enqueue(TripSubmission::new("d-1", "v-1", 10, None))
            .await
            .unwrap();
        let transport = Arc::new(GatedTransport::new());
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            transport.clone(),
            monitor.subscribe(),
        ));
        let worker = monitor.spawn_flush_worker(coordinator);

        monitor.set_online(true);
        transport.started.notified().await;

        // Flapping while the first flush is blocked
        for _ in 0..3 {
            monitor.set_online(false);
            monitor.set_online(true);
        }
        monitor.request_flush();

        transport.gate.add_permits(10);
        wait_for_calls(&transport, 2).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(store.pending_count().await.unwrap(), 1);

        drop(monitor);
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn going_offline_does_not_cancel_running_flush() {
        let monitor = ConnectivityMonitor::new(false);
        let store = Arc::new(MemoryQueueStore::new());
        store
            .enqueue(TripSubmission::new("d-1", "v-1", 10, None))
            .await
            .unwrap();
        let transport = Arc::new(GatedTransport::new());
        let coordinator = Arc::new(SyncCoordinator::new(
            store,
            transport.clone(),
            monitor.subscribe(),
        ));
        let _worker = monitor.spawn_flush_worker(coordinator);

        monitor.set_online(true);
        transport.started.notified().await;
        monitor.set_online(false);
        transport.gate.add_permits(1);

        tokio::time::timeout(Duration::from_secs(5), async {
            while transport.in_flight.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_loop_feeds_state() {
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let probe = Arc::new(FixedProbe(AtomicBool::new(true)));
        let mut state = monitor.subscribe();

        let looping = {
            let monitor = Arc::clone(&monitor);
            let probe = Arc::clone(&probe);
            tokio::spawn(async move {
                monitor
                    .run_probe_loop(probe.as_ref(), Duration::from_millis(10))
                    .await;
            })
        };

        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|online| *online))
            .await
            .unwrap()
            .unwrap();
        assert!(monitor.is_online());

        probe.0.store(false, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|online| !*online))
            .await
            .unwrap()
            .unwrap();

        looping.abort();
    }
}
