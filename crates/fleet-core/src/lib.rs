//! fleet-core - Core library for Fleetlog
//!
//! This crate contains the models, database layer, odometer chaining and
//! offline sync machinery shared by the API server and the CLI client.

pub mod assignment;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod odometer;
pub mod queue;
pub mod services;
pub mod sync;
mod util;

pub use connectivity::{ConnectivityMonitor, ConnectivityProbe};
pub use error::{Error, Result};
pub use ingest::{IngestError, TripIngestor};
pub use models::{LocalId, QueueEntry, SyncStatus, Trip, TripSubmission};
pub use queue::{LibSqlQueueStore, MemoryQueueStore, QueueStore};
pub use services::DatabaseService;
pub use sync::{FlushOutcome, HttpSyncClient, SubmitOutcome, SyncCoordinator, SyncError};
