//! Database layer for Fleetlog

mod capabilities;
mod connection;
pub mod migrations;
mod odometer_repository;
mod trip_repository;

pub use capabilities::{
    SchemaCapabilities, ASSIGNMENTS_TABLE, ODOMETER_LEDGER_TABLE, TRIPS_TABLE,
};
pub use connection::Database;
pub use migrations::SchemaKind;
pub use odometer_repository::{LibSqlOdometerLedger, OdometerLedger};
pub use trip_repository::{LibSqlTripRepository, NewTrip, TripRepository};
