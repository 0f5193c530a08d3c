//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Which schema a database file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// Server-side trips, odometer ledger and assignments
    Server,
    /// Client-side offline queue
    Client,
}

/// Current server schema version
const SERVER_VERSION: i32 = 2;

/// Current client schema version
const CLIENT_VERSION: i32 = 1;

/// Run all pending migrations for the given schema
pub async fn run(conn: &Connection, kind: SchemaKind) -> Result<()> {
    let version = get_version(conn).await?;

    match kind {
        SchemaKind::Server => {
            if version < 1 {
                apply(conn, 1, &server_v1()).await?;
            }
            if version < 2 {
                apply(conn, 2, &server_v2()).await?;
            }
        }
        SchemaKind::Client => {
            if version < 1 {
                apply(conn, 1, &client_v1()).await?;
            }
        }
    }

    Ok(())
}

/// Latest version for a schema kind
pub const fn current_version(kind: SchemaKind) -> i32 {
    match kind {
        SchemaKind::Server => SERVER_VERSION,
        SchemaKind::Client => CLIENT_VERSION,
    }
}

/// Get the current schema version
pub async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Run one migration's statements atomically and record its version
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            libsql::params![version],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Server version 1: trips and the fallback odometer ledger
fn server_v1() -> [&'static str; 6] {
    [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS trips (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            driver_id TEXT NOT NULL,
            vehicle_id TEXT NOT NULL,
            start_odometer INTEGER NOT NULL,
            end_odometer INTEGER,
            purpose TEXT,
            created_at INTEGER NOT NULL,
            CHECK (end_odometer IS NULL OR end_odometer >= start_odometer)
        )",
        "CREATE INDEX IF NOT EXISTS idx_trips_vehicle_recent
            ON trips(vehicle_id, created_at DESC, id DESC)",
        "CREATE INDEX IF NOT EXISTS idx_trips_driver ON trips(driver_id)",
        "CREATE TABLE IF NOT EXISTS vehicle_odometer (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vehicle_id TEXT NOT NULL,
            odometer_reading INTEGER NOT NULL,
            recorded_by TEXT,
            recorded_at INTEGER NOT NULL,
            notes TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_vehicle_odometer_recent
            ON vehicle_odometer(vehicle_id, recorded_at DESC, id DESC)",
    ]
}

/// Server version 2: driver to vehicle assignments
fn server_v2() -> [&'static str; 2] {
    [
        "CREATE TABLE IF NOT EXISTS driver_vehicle_assignments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            driver_id TEXT NOT NULL,
            vehicle_id TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            notes TEXT,
            assigned_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_assignments_driver_active
            ON driver_vehicle_assignments(driver_id, active)",
    ]
}

/// Client version 1: the offline trip queue
fn client_v1() -> [&'static str; 3] {
    [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS queued_trips (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            local_id TEXT NOT NULL UNIQUE,
            driver_id TEXT NOT NULL,
            vehicle_id TEXT NOT NULL,
            end_odo INTEGER,
            start_odo INTEGER,
            purpose TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_queued_trips_status ON queued_trips(sync_status, seq)",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?
                )",
                [name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_migrations() {
        let conn = setup().await;
        run(&conn, SchemaKind::Server).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, SERVER_VERSION);
        assert!(table_exists(&conn, "trips").await);
        assert!(table_exists(&conn, "vehicle_odometer").await);
        assert!(table_exists(&conn, "driver_vehicle_assignments").await);
        assert!(!table_exists(&conn, "queued_trips").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_client_migrations() {
        let conn = setup().await;
        run(&conn, SchemaKind::Client).await.unwrap();

        assert_eq!(get_version(&conn).await.unwrap(), CLIENT_VERSION);
        assert!(table_exists(&conn, "queued_trips").await);
        assert!(!table_exists(&conn, "trips").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn, SchemaKind::Server).await.unwrap();
        run(&conn, SchemaKind::Server).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, current_version(SchemaKind::Server));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trips_check_rejects_regression() {
        let conn = setup().await;
        run(&conn, SchemaKind::Server).await.unwrap();

        let result = conn
            .execute(
                "INSERT INTO trips (driver_id, vehicle_id, start_odometer, end_odometer, created_at)
                 VALUES ('d', 'v', 100, 50, 0)",
                (),
            )
            .await;
        assert!(result.is_err());
    }
}
