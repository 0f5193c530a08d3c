//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::capabilities::SchemaCapabilities;
use super::migrations::{self, SchemaKind};

/// Database wrapper for libSQL connections
pub struct Database {
    // Keeps the underlying database alive for the connection's lifetime
    _db: LibSqlDatabase,
    conn: Connection,
    kind: SchemaKind,
    capabilities: SchemaCapabilities,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>, kind: SchemaKind) -> Result<Self> {
        Self::open_with(path, kind, true).await
    }

    /// Open a database, optionally skipping migrations.
    ///
    /// With `run_migrations = false` the schema is taken as found and missing
    /// tables are recorded in [`Database::capabilities`].
    pub async fn open_with(
        path: impl AsRef<Path>,
        kind: SchemaKind,
        run_migrations: bool,
    ) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::init(db, kind, run_migrations).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory(kind: SchemaKind) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::init(db, kind, true).await
    }

    /// Open an in-memory database without running migrations
    pub async fn open_in_memory_unmigrated(kind: SchemaKind) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::init(db, kind, false).await
    }

    async fn init(db: LibSqlDatabase, kind: SchemaKind, run_migrations: bool) -> Result<Self> {
        let conn = db.connect()?;
        let mut database = Self {
            _db: db,
            conn,
            kind,
            capabilities: SchemaCapabilities::all(),
        };
        database.configure().await?;
        if run_migrations {
            migrations::run(&database.conn, kind).await?;
        } else {
            tracing::warn!("Skipping migrations; using schema as found");
        }
        database.refresh_capabilities().await?;
        Ok(database)
    }

    /// Configure `SQLite` for optimal performance
    async fn configure(&self) -> Result<()> {
        // WAL is unavailable for in-memory databases, so failures are ignored
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        self.conn
            .execute("PRAGMA busy_timeout = 5000;", ())
            .await
            .ok();
        Ok(())
    }

    /// Re-run the schema probe, e.g. after applying migrations out of band
    pub async fn refresh_capabilities(&mut self) -> Result<SchemaCapabilities> {
        self.capabilities = match self.kind {
            SchemaKind::Server => SchemaCapabilities::probe(&self.conn).await?,
            SchemaKind::Client => SchemaCapabilities::all(),
        };
        Ok(self.capabilities)
    }

    /// Tables found when the database was opened
    pub const fn capabilities(&self) -> SchemaCapabilities {
        self.capabilities
    }

    pub const fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory(SchemaKind::Server).await.unwrap();
        assert!(db.capabilities().is_complete());
        assert_eq!(db.kind(), SchemaKind::Server);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unmigrated_server_reports_missing_tables() {
        let db = Database::open_in_memory_unmigrated(SchemaKind::Server)
            .await
            .unwrap();
        let capabilities = db.capabilities();
        assert!(!capabilities.trips);
        assert!(!capabilities.odometer_ledger);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refresh_capabilities_after_late_migration() {
        let mut db = Database::open_in_memory_unmigrated(SchemaKind::Server)
            .await
            .unwrap();
        assert!(!db.capabilities().trips);

        migrations::run(db.connection(), SchemaKind::Server)
            .await
            .unwrap();
        let refreshed = db.refresh_capabilities().await.unwrap();
        assert!(refreshed.is_complete());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_file_persists_schema() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("fleet.db");
        {
            let db = Database::open(&path, SchemaKind::Client).await.unwrap();
            let version = migrations::get_version(db.connection()).await.unwrap();
            assert_eq!(version, migrations::current_version(SchemaKind::Client));
        }

        let reopened = Database::open_with(&path, SchemaKind::Client, false)
            .await
            .unwrap();
        let version = migrations::get_version(reopened.connection())
            .await
            .unwrap();
        assert_eq!(version, migrations::current_version(SchemaKind::Client));
    }
}
