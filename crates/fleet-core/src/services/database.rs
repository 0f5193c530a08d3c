//! Shared database service wrapper used by the API server.

#![allow(clippy::cast_possible_wrap)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::assignment;
use crate::db::{
    Database, LibSqlOdometerLedger, LibSqlTripRepository, OdometerLedger, SchemaCapabilities,
    SchemaKind, TripRepository, ODOMETER_LEDGER_TABLE,
};
use crate::ingest::{IngestError, TripIngestor};
use crate::models::{OdometerReading, Trip, TripFilter, TripSubmission, TripSummary};
use crate::odometer;
use crate::sync::{SyncResult, SyncTransport};
use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Thread-safe service for server-side trip and odometer operations.
///
/// All access goes through one connection behind an async mutex, so ingest
/// batches are serialized and never observe each other's uncommitted rows.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    capabilities: SchemaCapabilities,
}

impl DatabaseService {
    /// Open a server database at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>, run_migrations: bool) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open_with(&db_path, SchemaKind::Server, run_migrations).await?;
        tracing::info!(path = %db_path.display(), "Opened fleet database");
        Ok(Self::from_database(db, Some(db_path)))
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory(SchemaKind::Server).await?;
        Ok(Self::from_database(db, None))
    }

    /// Wrap an already opened server database
    pub fn from_database(db: Database, db_path: Option<PathBuf>) -> Self {
        let capabilities = db.capabilities();
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path,
            capabilities,
        }
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Tables found by the startup schema probe
    pub const fn capabilities(&self) -> SchemaCapabilities {
        self.capabilities
    }

    /// Ingest a batch and return server ids in input order.
    pub async fn ingest(&self, trips: Vec<TripSubmission>) -> std::result::Result<Vec<i64>, IngestError> {
        let inserted = self.ingest_detailed(trips).await?;
        Ok(inserted.into_iter().map(|trip| trip.id).collect())
    }

    /// Ingest a batch and return the stored trips.
    ///
    /// The batch runs on its own task so that a dropped caller cannot
    /// interrupt it between `BEGIN` and `COMMIT`. Vehicle assignments are
    /// updated after the commit.
    pub async fn ingest_detailed(
        &self,
        trips: Vec<TripSubmission>,
    ) -> std::result::Result<Vec<Trip>, IngestError> {
        let db = Arc::clone(&self.db);
        let task = tokio::spawn(async move {
            let db = db.lock().await;
            let inserted = TripIngestor::new(&db).ingest_detailed(&trips).await?;
            assignment::assign_from_trips(&db, &inserted).await;
            Ok(inserted)
        });

        task.await.map_err(|error| IngestError::Persistence {
            index: None,
            source: Error::Database(format!("ingest task failed: {error}")),
        })?
    }

    /// Insert one trip with the same chaining rules as a batch
    pub async fn create_trip(&self, trip: TripSubmission) -> std::result::Result<Trip, IngestError> {
        let mut inserted = self.ingest_detailed(vec![trip]).await?;
        inserted.pop().ok_or_else(|| IngestError::Persistence {
            index: Some(0),
            source: Error::Database("insert returned no trip".to_string()),
        })
    }

    /// Advisory start odometer for a vehicle. Never fails.
    pub async fn suggested_start_odometer(&self, vehicle_id: &str) -> i64 {
        let db = self.db.lock().await;
        odometer::suggested_start_odometer(db.connection(), self.capabilities, vehicle_id).await
    }

    /// Trip history, newest first. Empty when the trips table is absent.
    pub async fn list_trips(&self, filter: &TripFilter, limit: usize, offset: usize) -> Result<Vec<Trip>> {
        if !self.capabilities.trips {
            return Ok(Vec::new());
        }
        let db = self.db.lock().await;
        LibSqlTripRepository::new(db.connection())
            .list(filter, limit, offset)
            .await
    }

    /// Trip count and distance, bounded by creation time (Unix ms)
    pub async fn summary(&self, start: Option<i64>, end: Option<i64>) -> Result<TripSummary> {
        if !self.capabilities.trips {
            return Ok(TripSummary::default());
        }
        let db = self.db.lock().await;
        LibSqlTripRepository::new(db.connection())
            .summary(start, end)
            .await
    }

    /// Append a reading to the odometer ledger, e.g. from a fuel purchase
    pub async fn record_reading(
        &self,
        vehicle_id: &str,
        odometer_reading: i64,
        recorded_by: Option<String>,
        notes: Option<String>,
    ) -> Result<OdometerReading> {
        let vehicle_id = vehicle_id.trim();
        if vehicle_id.is_empty() {
            return Err(Error::InvalidInput("vehicle_id is required".to_string()));
        }
        if odometer_reading < 0 {
            return Err(Error::InvalidInput(
                "odometer_reading must not be negative".to_string(),
            ));
        }
        if !self.capabilities.odometer_ledger {
            return Err(Error::SchemaNotReady(ODOMETER_LEDGER_TABLE));
        }

        let recorded_by = normalize_text_option(recorded_by);
        let notes = normalize_text_option(notes);
        let db = self.db.lock().await;
        LibSqlOdometerLedger::new(db.connection())
            .append(
                vehicle_id,
                odometer_reading,
                recorded_by.as_deref(),
                notes.as_deref(),
            )
            .await
    }

    /// Ledger readings for a vehicle, newest first
    pub async fn list_readings(&self, vehicle_id: &str, limit: usize) -> Result<Vec<OdometerReading>> {
        if !self.capabilities.odometer_ledger {
            return Ok(Vec::new());
        }
        let db = self.db.lock().await;
        LibSqlOdometerLedger::new(db.connection())
            .list(vehicle_id, limit)
            .await
    }
}

/// In-process transport: the coordinator talks to the ingestor directly.
#[async_trait]
impl SyncTransport for DatabaseService {
    async fn submit_batch(&self, trips: &[TripSubmission]) -> SyncResult<Vec<i64>> {
        Ok(self.ingest(trips.to_vec()).await?)
    }
}
