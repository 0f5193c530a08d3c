//! Fleet CLI - record trips from the road, online or not
//!
//! Trips go straight to the server when it is reachable and wait in a local
//! queue otherwise.

mod cli;
mod commands;
mod error;

use clap::Parser;

use cli::{Cli, Commands, QueueCommands, TripCommands};
use commands::{
    client_config, resolve_db_path, run_last_odometer, run_queue_list, run_queue_prune,
    run_reading, run_sync, run_trip_add, run_watch,
};
use error::CliError;
use fleet_core::TripSubmission;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "fleet=info"
                    .parse()
                    .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?,
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config = client_config(cli.server)?;

    match cli.command {
        Commands::Trip {
            command:
                TripCommands::Add {
                    driver,
                    vehicle,
                    end_odometer,
                    start_odometer,
                    purpose,
                },
        } => {
            let mut trip = TripSubmission::new(driver, vehicle, end_odometer, purpose);
            trip.start_odometer = start_odometer;
            run_trip_add(trip, &db_path, &config).await?;
        }
        Commands::Queue { command } => match command {
            QueueCommands::List { all, json } => run_queue_list(all, json, &db_path).await?,
            QueueCommands::Prune => run_queue_prune(&db_path).await?,
        },
        Commands::Sync => run_sync(&db_path, &config).await?,
        Commands::LastOdometer { vehicle_id } => run_last_odometer(&vehicle_id, &config).await?,
        Commands::Reading {
            vehicle_id,
            odometer,
            recorded_by,
            notes,
        } => run_reading(vehicle_id, odometer, recorded_by, notes, &config).await?,
        Commands::Watch { interval } => run_watch(interval, &db_path, &config).await?,
    }

    Ok(())
}
