//! Data models for Fleetlog

mod odometer;
mod queue_entry;
mod trip;
pub mod wire;

pub use odometer::{OdometerReading, VehicleAssignment};
pub use queue_entry::{LocalId, QueueEntry, SyncStatus};
pub use trip::{Trip, TripFilter, TripSubmission, TripSummary};
