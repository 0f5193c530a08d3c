use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Record fleet trips and sync them when the server is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local queue database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Fleet API base URL (overrides FLEET_SERVER_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record trips
    Trip {
        #[command(subcommand)]
        command: TripCommands,
    },
    /// Inspect the offline queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Send queued trips to the server now
    Sync,
    /// Show the suggested start odometer for a vehicle
    LastOdometer {
        /// Vehicle identifier
        vehicle_id: String,
    },
    /// Record an odometer reading outside of a trip (e.g. at a fuel stop)
    Reading {
        /// Vehicle identifier
        vehicle_id: String,
        /// Odometer reading
        odometer: i64,
        /// Who took the reading
        #[arg(long, value_name = "NAME")]
        recorded_by: Option<String>,
        /// Free-form note stored with the reading
        #[arg(long)]
        notes: Option<String>,
    },
    /// Watch connectivity and flush the queue whenever the server comes back
    Watch {
        /// Seconds between health checks (overrides FLEET_PROBE_INTERVAL_SECS)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Record a completed trip
    #[command(alias = "new")]
    Add {
        /// Driver identifier
        #[arg(long)]
        driver: String,
        /// Vehicle identifier
        #[arg(long)]
        vehicle: String,
        /// Odometer at the end of the trip
        #[arg(long = "end", value_name = "ODOMETER")]
        end_odometer: i64,
        /// Manual start odometer; computed by the server when omitted
        #[arg(long = "start", value_name = "ODOMETER")]
        start_odometer: Option<i64>,
        /// Trip purpose
        #[arg(long)]
        purpose: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued trips
    List {
        /// Include trips that already reached the server
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove trips that already reached the server
    Prune,
}
