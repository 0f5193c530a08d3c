use std::path::Path;
use std::sync::Arc;

use fleet_core::config::SyncClientConfig;
use fleet_core::{ConnectivityMonitor, QueueStore, SubmitOutcome, SyncCoordinator, TripSubmission};

use crate::commands::common::{http_client, open_queue};
use crate::error::CliError;

pub async fn run_trip_add(
    trip: TripSubmission,
    db_path: &Path,
    config: &SyncClientConfig,
) -> Result<(), CliError> {
    let outcome = submit_trip(trip, db_path, config).await?;
    match &outcome {
        SubmitOutcome::Saved(ids) => {
            let ids = ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            println!("{} (trip {ids})", outcome.message());
        }
        SubmitOutcome::SavedOffline(local_id) => println!("{} ({local_id})", outcome.message()),
    }
    Ok(())
}

/// Send a trip to the server, or queue it when there is no usable server
pub async fn submit_trip(
    trip: TripSubmission,
    db_path: &Path,
    config: &SyncClientConfig,
) -> Result<SubmitOutcome, CliError> {
    let store = open_queue(db_path).await?;

    let Some(client) = http_client(config)? else {
        tracing::debug!("No server configured; queueing trip");
        let entry = store.enqueue(trip.without_start_hint()).await?;
        return Ok(SubmitOutcome::SavedOffline(entry.local_id));
    };

    let online = client.is_reachable().await;
    let monitor = ConnectivityMonitor::new(online);
    let coordinator = SyncCoordinator::new(store, Arc::new(client), monitor.subscribe());
    Ok(coordinator.submit(trip).await?)
}
