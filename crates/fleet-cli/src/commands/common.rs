use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use fleet_core::config::SyncClientConfig;
use fleet_core::{HttpSyncClient, LibSqlQueueStore, QueueEntry};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub local_id: String,
    pub seq: i64,
    pub driver_id: String,
    pub vehicle_id: String,
    pub end_odometer: Option<i64>,
    pub purpose: Option<String>,
    pub status: &'static str,
    pub created_at: i64,
}

pub fn queue_entry_to_item(entry: &QueueEntry) -> QueueItem {
    QueueItem {
        local_id: entry.local_id.as_str(),
        seq: entry.seq,
        driver_id: entry.payload.driver_id.clone(),
        vehicle_id: entry.payload.vehicle_id.clone(),
        end_odometer: entry.payload.end_odometer,
        purpose: entry.payload.purpose.clone(),
        status: entry.sync_status.as_str(),
        created_at: entry.created_at,
    }
}

pub fn format_queue_lines(entries: &[QueueEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let end = entry
                .payload
                .end_odometer
                .map_or_else(|| "?".to_string(), |odometer| odometer.to_string());
            let purpose = entry
                .payload
                .purpose
                .as_deref()
                .map(|purpose| format!("  {purpose}"))
                .unwrap_or_default();
            format!(
                "#{seq:<4} {status:<8} {when}  {vehicle} by {driver}  end {end}{purpose}",
                seq = entry.seq,
                status = entry.sync_status.as_str(),
                when = format_timestamp(entry.created_at),
                vehicle = entry.payload.vehicle_id,
                driver = entry.payload.driver_id,
            )
        })
        .collect()
}

fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FLEET_QUEUE_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleet")
        .join("queue.db")
}

/// Environment settings with the `--server` flag applied on top
pub fn client_config(server: Option<String>) -> Result<SyncClientConfig, CliError> {
    SyncClientConfig::from_env()
        .and_then(|config| config.with_server_url(server))
        .map_err(CliError::Config)
}

pub async fn open_queue(path: &Path) -> Result<Arc<LibSqlQueueStore>, CliError> {
    Ok(Arc::new(LibSqlQueueStore::open(path).await?))
}

/// HTTP client for the configured server, if any
pub fn http_client(config: &SyncClientConfig) -> Result<Option<HttpSyncClient>, CliError> {
    config
        .server_url
        .as_deref()
        .map(HttpSyncClient::new)
        .transpose()
        .map_err(CliError::from)
}

pub fn require_client(config: &SyncClientConfig) -> Result<HttpSyncClient, CliError> {
    http_client(config)?.ok_or(CliError::ServerNotConfigured)
}
