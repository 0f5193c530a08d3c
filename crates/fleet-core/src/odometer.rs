//! Odometer resolution for trip chaining.
//!
//! The current odometer of a vehicle is, in strict priority order: the end
//! reading of its most recently created trip, the latest entry in the
//! fallback ledger, or zero. Tables recorded as missing by the startup
//! schema probe are skipped rather than queried.

use libsql::Connection;

use crate::db::{
    LibSqlOdometerLedger, LibSqlTripRepository, OdometerLedger, SchemaCapabilities,
    TripRepository,
};
use crate::error::Result;

/// Where a resolved reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdometerSource {
    TripHistory,
    Ledger,
    Default,
}

/// A resolved odometer value and its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOdometer {
    pub value: i64,
    pub source: OdometerSource,
}

/// Resolve the current odometer of `vehicle_id`.
///
/// Runs on the given connection, so inside an open transaction it sees rows
/// inserted earlier in that transaction. Absence of data resolves to 0;
/// query failures on tables that exist are returned.
pub async fn resolve(
    conn: &Connection,
    capabilities: SchemaCapabilities,
    vehicle_id: &str,
) -> Result<i64> {
    Ok(resolve_with_source(conn, capabilities, vehicle_id).await?.value)
}

/// Like [`resolve`], also reporting which tier produced the value
pub async fn resolve_with_source(
    conn: &Connection,
    capabilities: SchemaCapabilities,
    vehicle_id: &str,
) -> Result<ResolvedOdometer> {
    if capabilities.trips {
        let trips = LibSqlTripRepository::new(conn);
        if let Some(value) = trips.latest_end_odometer(vehicle_id).await? {
            return Ok(ResolvedOdometer {
                value,
                source: OdometerSource::TripHistory,
            });
        }
    }

    if capabilities.odometer_ledger {
        let ledger = LibSqlOdometerLedger::new(conn);
        if let Some(value) = ledger.latest_reading(vehicle_id).await? {
            return Ok(ResolvedOdometer {
                value,
                source: OdometerSource::Ledger,
            });
        }
    }

    Ok(ResolvedOdometer {
        value: 0,
        source: OdometerSource::Default,
    })
}

/// Advisory lookup for display. Never fails; errors are logged and read as 0.
pub async fn suggested_start_odometer(
    conn: &Connection,
    capabilities: SchemaCapabilities,
    vehicle_id: &str,
) -> i64 {
    match resolve(conn, capabilities, vehicle_id).await {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(vehicle_id, %error, "Odometer lookup failed; suggesting 0");
            0
        }
    }
}
