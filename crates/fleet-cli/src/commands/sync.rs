use std::path::Path;
use std::sync::Arc;

use fleet_core::config::SyncClientConfig;
use fleet_core::{ConnectivityMonitor, FlushOutcome, QueueStore, SyncCoordinator};

use crate::commands::common::{open_queue, require_client};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path, config: &SyncClientConfig) -> Result<(), CliError> {
    let client = require_client(config)?;
    let store = open_queue(db_path).await?;

    if !client.is_reachable().await {
        let pending = store.pending_count().await?;
        println!(
            "Server {} is unreachable; {pending} trip(s) remain queued",
            client.base_url()
        );
        return Ok(());
    }

    let monitor = ConnectivityMonitor::new(true);
    let coordinator = SyncCoordinator::new(store, Arc::new(client), monitor.subscribe());
    let outcome = coordinator.flush().await;
    report_flush(outcome)
}

fn report_flush(outcome: FlushOutcome) -> Result<(), CliError> {
    match outcome.error {
        None if outcome.synced_count == 0 => {
            println!("Nothing to sync");
            Ok(())
        }
        None => {
            println!("Synced {} trip(s)", outcome.synced_count);
            Ok(())
        }
        Some(error) => {
            if outcome.synced_count > 0 {
                println!("Synced {} trip(s) before failing", outcome.synced_count);
            }
            Err(error.into())
        }
    }
}
