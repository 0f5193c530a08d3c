use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::config::SyncClientConfig;
use fleet_core::{ConnectivityMonitor, QueueStore, SyncCoordinator};

use crate::commands::common::{open_queue, require_client};
use crate::error::CliError;

const MAX_INTERVAL_SECS: u64 = 3_600;

pub async fn run_watch(
    interval: Option<u64>,
    db_path: &Path,
    config: &SyncClientConfig,
) -> Result<(), CliError> {
    let interval = probe_interval(interval, config)?;
    let client = Arc::new(require_client(config)?);
    let store = open_queue(db_path).await?;
    let pending = store.pending_count().await?;

    let monitor = ConnectivityMonitor::new(false);
    let coordinator = Arc::new(SyncCoordinator::new(
        store,
        client.clone(),
        monitor.subscribe(),
    ));
    let worker = monitor.spawn_flush_worker(coordinator);

    println!(
        "Watching {} every {}s with {pending} trip(s) queued. Press Ctrl-C to stop.",
        client.base_url(),
        interval.as_secs()
    );

    tokio::select! {
        () = monitor.run_probe_loop(client.as_ref(), interval) => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    // Dropping the monitor lets a running flush finish, then stops the worker
    drop(monitor);
    if let Err(error) = worker.await {
        tracing::warn!(%error, "Flush worker ended abnormally");
    }
    println!("Stopped");
    Ok(())
}

fn probe_interval(flag: Option<u64>, config: &SyncClientConfig) -> Result<Duration, CliError> {
    match flag {
        None => Ok(config.probe_interval),
        Some(secs) if (1..=MAX_INTERVAL_SECS).contains(&secs) => Ok(Duration::from_secs(secs)),
        Some(_) => Err(CliError::Config(format!(
            "--interval must be in [1, {MAX_INTERVAL_SECS}]"
        ))),
    }
}
