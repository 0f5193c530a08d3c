//! Transactional bulk trip ingestion.
//!
//! A batch is inserted strictly in order inside one transaction. Each trip's
//! start odometer is resolved on the same connection, so later trips in the
//! batch chain from earlier ones before anything is committed. Any failure
//! rolls the whole batch back.

use libsql::Connection;
use thiserror::Error;

use crate::db::{
    Database, LibSqlOdometerLedger, LibSqlTripRepository, NewTrip, OdometerLedger,
    SchemaCapabilities, TripRepository,
};
use crate::error::Error;
use crate::models::{Trip, TripSubmission};
use crate::odometer;
use crate::util::unix_millis_now;

/// Why a batch was rejected. Nothing from the batch is committed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Trip {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("Trip {index}: end odometer {end} is below start odometer {start}")]
    OdometerRegression { index: usize, start: i64, end: i64 },

    #[error("Failed to persist trips: {source}")]
    Persistence {
        /// Offending trip, when the failure is tied to one
        index: Option<usize>,
        #[source]
        source: Error,
    },
}

impl IngestError {
    /// Bad or missing input, as opposed to a storage failure
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. } | Self::OdometerRegression { .. }
        )
    }

    /// Index of the trip that caused the failure
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::MissingField { index, .. } | Self::OdometerRegression { index, .. } => {
                Some(*index)
            }
            Self::Persistence { index, .. } => *index,
        }
    }

    fn persistence(index: Option<usize>, source: impl Into<Error>) -> Self {
        Self::Persistence {
            index,
            source: source.into(),
        }
    }
}

/// Inserts batches of trip submissions into the server database
pub struct TripIngestor<'a> {
    db: &'a Database,
}

impl<'a> TripIngestor<'a> {
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert `trips` atomically and return their server ids in input order
    pub async fn ingest(&self, trips: &[TripSubmission]) -> Result<Vec<i64>, IngestError> {
        let inserted = self.ingest_detailed(trips).await?;
        Ok(inserted.into_iter().map(|trip| trip.id).collect())
    }

    /// Insert `trips` atomically and return the stored rows in input order
    pub async fn ingest_detailed(&self, trips: &[TripSubmission]) -> Result<Vec<Trip>, IngestError> {
        if trips.is_empty() {
            return Ok(Vec::new());
        }

        let capabilities = self.db.capabilities();
        capabilities
            .require_trips()
            .map_err(|source| IngestError::persistence(None, source))?;

        let conn = self.db.connection();
        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|source| IngestError::persistence(None, source))?;

        match insert_all(conn, capabilities, trips).await {
            Ok(inserted) => {
                if let Err(source) = conn.execute("COMMIT", ()).await {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(IngestError::persistence(None, source));
                }
                tracing::info!(count = inserted.len(), "Ingested trip batch");
                Ok(inserted)
            }
            Err(error) => {
                conn.execute("ROLLBACK", ()).await.ok();
                tracing::warn!(
                    batch_size = trips.len(),
                    index = ?error.index(),
                    %error,
                    "Rolled back trip batch"
                );
                Err(error)
            }
        }
    }
}

async fn insert_all(
    conn: &Connection,
    capabilities: SchemaCapabilities,
    trips: &[TripSubmission],
) -> Result<Vec<Trip>, IngestError> {
    let repo = LibSqlTripRepository::new(conn);
    let mut inserted = Vec::with_capacity(trips.len());
    // One timestamp for the whole batch
    let created_at = unix_millis_now();

    for (index, submission) in trips.iter().enumerate() {
        let fields = validate(index, submission)?;

        let start_odometer = match submission.start_odometer {
            Some(manual) => manual,
            None => odometer::resolve(conn, capabilities, fields.vehicle_id)
                .await
                .map_err(|source| IngestError::persistence(Some(index), source))?,
        };

        if fields.end_odometer < start_odometer {
            return Err(IngestError::OdometerRegression {
                index,
                start: start_odometer,
                end: fields.end_odometer,
            });
        }

        let trip = repo
            .insert(&NewTrip {
                driver_id: fields.driver_id,
                vehicle_id: fields.vehicle_id,
                start_odometer,
                end_odometer: fields.end_odometer,
                purpose: submission.purpose.as_deref(),
                created_at,
            })
            .await
            .map_err(|source| IngestError::persistence(Some(index), source))?;

        append_ledger(conn, capabilities, &trip)
            .await
            .map_err(|source| IngestError::persistence(Some(index), source))?;
        inserted.push(trip);
    }

    Ok(inserted)
}

struct RequiredFields<'a> {
    driver_id: &'a str,
    vehicle_id: &'a str,
    end_odometer: i64,
}

fn validate(index: usize, submission: &TripSubmission) -> Result<RequiredFields<'_>, IngestError> {
    let driver_id = submission.driver_id.trim();
    if driver_id.is_empty() {
        return Err(IngestError::MissingField {
            index,
            field: "driver_id",
        });
    }

    let vehicle_id = submission.vehicle_id.trim();
    if vehicle_id.is_empty() {
        return Err(IngestError::MissingField {
            index,
            field: "vehicle_id",
        });
    }

    let Some(end_odometer) = submission.end_odometer else {
        return Err(IngestError::MissingField {
            index,
            field: "end_odometer",
        });
    };

    Ok(RequiredFields {
        driver_id,
        vehicle_id,
        end_odometer,
    })
}

/// Best effort: a failed append is logged and the batch goes on, unless the
/// failure made SQLite roll back the whole transaction (disk full, I/O errors).
async fn append_ledger(conn: &Connection, capabilities: SchemaCapabilities, trip: &Trip) -> Result<(), Error> {
    if !capabilities.odometer_ledger {
        tracing::debug!(vehicle_id = %trip.vehicle_id, "Odometer ledger absent; skipping append");
        return Ok(());
    }

    let ledger = LibSqlOdometerLedger::new(conn);
    if let Err(error) = ledger
        .append(&trip.vehicle_id, trip.end_odometer, Some(&trip.driver_id), None)
        .await
    {
        tracing::warn!(
            trip_id = trip.id,
            vehicle_id = %trip.vehicle_id,
            %error,
            "Failed to append odometer ledger entry"
        );
        ensure_in_transaction(conn)?;
    }
    Ok(())
}

fn ensure_in_transaction(conn: &Connection) -> Result<(), Error> {
    if conn.is_autocommit() {
        return Err(Error::Database(
            "transaction was rolled back by the database".to_string(),
        ));
    }
    Ok(())
}
