//! Startup probe for tables that may not have been migrated yet.
//!
//! Deployments can run before every migration has been applied. Rather than
//! treating "no such table" failures as control flow on every query, the
//! database records once which tables exist and read paths consult that.

use libsql::Connection;
use serde::Serialize;

use crate::error::{Error, Result};

pub const TRIPS_TABLE: &str = "trips";
pub const ODOMETER_LEDGER_TABLE: &str = "vehicle_odometer";
pub const ASSIGNMENTS_TABLE: &str = "driver_vehicle_assignments";

/// Which server tables are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaCapabilities {
    pub trips: bool,
    pub odometer_ledger: bool,
    pub assignments: bool,
}

impl SchemaCapabilities {
    /// Every table available
    pub const fn all() -> Self {
        Self {
            trips: true,
            odometer_ledger: true,
            assignments: true,
        }
    }

    /// Inspect `sqlite_master` for the server tables
    pub async fn probe(conn: &Connection) -> Result<Self> {
        let capabilities = Self {
            trips: table_exists(conn, TRIPS_TABLE).await?,
            odometer_ledger: table_exists(conn, ODOMETER_LEDGER_TABLE).await?,
            assignments: table_exists(conn, ASSIGNMENTS_TABLE).await?,
        };

        if !capabilities.is_complete() {
            tracing::warn!(
                trips = capabilities.trips,
                odometer_ledger = capabilities.odometer_ledger,
                assignments = capabilities.assignments,
                "Schema is not fully migrated; missing tables read as empty"
            );
        }
        Ok(capabilities)
    }

    pub const fn is_complete(&self) -> bool {
        self.trips && self.odometer_ledger && self.assignments
    }

    /// Fail with `SchemaNotReady` when the trips table is absent
    pub const fn require_trips(&self) -> Result<()> {
        if self.trips {
            Ok(())
        } else {
            Err(Error::SchemaNotReady(TRIPS_TABLE))
        }
    }
}

async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
        )
        .await?;

    Ok(match rows.next().await? {
        Some(row) => row.get::<i32>(0)? != 0,
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_reports_missing_tables() {
        let conn = setup().await;
        conn.execute(
            "CREATE TABLE vehicle_odometer (id INTEGER PRIMARY KEY, vehicle_id TEXT)",
            (),
        )
        .await
        .unwrap();

        let capabilities = SchemaCapabilities::probe(&conn).await.unwrap();
        assert!(!capabilities.trips);
        assert!(capabilities.odometer_ledger);
        assert!(!capabilities.assignments);
        assert!(!capabilities.is_complete());
        assert!(matches!(
            capabilities.require_trips(),
            Err(Error::SchemaNotReady("trips"))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_after_migrations_is_complete() {
        let conn = setup().await;
        crate::db::migrations::run(&conn, crate::db::SchemaKind::Server)
            .await
            .unwrap();

        let capabilities = SchemaCapabilities::probe(&conn).await.unwrap();
        assert_eq!(capabilities, SchemaCapabilities::all());
    }
}
