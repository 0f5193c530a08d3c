//! Trip repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{Trip, TripFilter, TripSummary};
use libsql::{params, Connection, Row};

/// Fields for a trip about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrip<'a> {
    pub driver_id: &'a str,
    pub vehicle_id: &'a str,
    pub start_odometer: i64,
    pub end_odometer: i64,
    pub purpose: Option<&'a str>,
    pub created_at: i64,
}

/// Trait for trip storage operations (async)
#[allow(async_fn_in_trait)]
pub trait TripRepository {
    /// Insert a trip and return it with its assigned id
    async fn insert(&self, trip: &NewTrip<'_>) -> Result<Trip>;

    /// Get a trip by id
    async fn get(&self, id: i64) -> Result<Option<Trip>>;

    /// End odometer of the vehicle's most recently inserted trip.
    ///
    /// Ordered by id, so a wall clock that steps backwards cannot reorder the chain.
    async fn latest_end_odometer(&self, vehicle_id: &str) -> Result<Option<i64>>;

    /// List trips newest first
    async fn list(&self, filter: &TripFilter, limit: usize, offset: usize) -> Result<Vec<Trip>>;

    /// Count and total distance, optionally bounded by creation time (Unix ms)
    async fn summary(&self, start: Option<i64>, end: Option<i64>) -> Result<TripSummary>;
}

/// libSQL implementation of `TripRepository`
pub struct LibSqlTripRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTripRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a trip from a database row
    fn parse_trip(row: &Row) -> Result<Trip> {
        let start_odometer: i64 = row.get(3)?;
        Ok(Trip {
            id: row.get(0)?,
            driver_id: row.get(1)?,
            vehicle_id: row.get(2)?,
            start_odometer,
            end_odometer: row.get::<Option<i64>>(4)?.unwrap_or(start_odometer),
            purpose: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TripRepository for LibSqlTripRepository<'_> {
    async fn insert(&self, trip: &NewTrip<'_>) -> Result<Trip> {
        self.conn
            .execute(
                "INSERT INTO trips (driver_id, vehicle_id, start_odometer, end_odometer, purpose, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    trip.driver_id,
                    trip.vehicle_id,
                    trip.start_odometer,
                    trip.end_odometer,
                    trip.purpose.map(str::to_string),
                    trip.created_at
                ],
            )
            .await?;

        let id = self.conn.last_insert_rowid();
        Ok(Trip {
            id,
            driver_id: trip.driver_id.to_string(),
            vehicle_id: trip.vehicle_id.to_string(),
            start_odometer: trip.start_odometer,
            end_odometer: trip.end_odometer,
            purpose: trip.purpose.map(str::to_string),
            created_at: trip.created_at,
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Trip>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, driver_id, vehicle_id, start_odometer, end_odometer, purpose, created_at
                 FROM trips WHERE id = ?",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_trip(&row)?)),
            None => Ok(None),
        }
    }

    async fn latest_end_odometer(&self, vehicle_id: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT end_odometer FROM trips
                 WHERE vehicle_id = ? AND end_odometer IS NOT NULL
                 ORDER BY id DESC
                 LIMIT 1",
                [vehicle_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &TripFilter, limit: usize, offset: usize) -> Result<Vec<Trip>> {
        // NULL filters match every row
        let mut rows = self
            .conn
            .query(
                "SELECT id, driver_id, vehicle_id, start_odometer, end_odometer, purpose, created_at
                 FROM trips
                 WHERE (?1 IS NULL OR driver_id = ?1)
                   AND (?2 IS NULL OR vehicle_id = ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4",
                params![
                    filter.driver_id.clone(),
                    filter.vehicle_id.clone(),
                    limit as i64,
                    offset as i64
                ],
            )
            .await?;

        let mut trips = Vec::new();
        while let Some(row) = rows.next().await? {
            trips.push(Self::parse_trip(&row)?);
        }
        Ok(trips)
    }

    async fn summary(&self, start: Option<i64>, end: Option<i64>) -> Result<TripSummary> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(end_odometer - start_odometer), 0)
                 FROM trips
                 WHERE (?1 IS NULL OR created_at >= ?1)
                   AND (?2 IS NULL OR created_at <= ?2)",
                params![start, end],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| Error::Database("summary query returned no rows".to_string()))?;
        Ok(TripSummary {
            total_trips: row.get(0)?,
            total_distance: row.get(1)?,
        })
    }
}
