use fleet_core::config::SyncClientConfig;
use fleet_core::models::wire::RecordReadingRequest;

use crate::commands::common::require_client;
use crate::error::CliError;

pub async fn run_last_odometer(vehicle_id: &str, config: &SyncClientConfig) -> Result<(), CliError> {
    let client = require_client(config)?;
    let odometer = client.last_odometer(vehicle_id).await?;
    println!("{odometer}");
    Ok(())
}

pub async fn run_reading(
    vehicle_id: String,
    odometer_reading: i64,
    recorded_by: Option<String>,
    notes: Option<String>,
    config: &SyncClientConfig,
) -> Result<(), CliError> {
    let client = require_client(config)?;
    let request = RecordReadingRequest {
        vehicle_id,
        odometer_reading,
        recorded_by,
        notes,
    };
    let reading = client.record_reading(&request).await?;
    println!(
        "Recorded {} for {} (reading {})",
        reading.odometer_reading, reading.vehicle_id, reading.id
    );
    Ok(())
}
