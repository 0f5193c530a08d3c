//! Error types for fleet-core

use thiserror::Error;

/// Result type alias using fleet-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fleet-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local queue storage is exhausted
    #[error("Local storage is full: {0}")]
    StorageFull(String),

    /// A table required for a write path has not been migrated yet
    #[error("Schema not ready: table `{0}` does not exist")]
    SchemaNotReady(&'static str),
}

impl Error {
    /// Map a libSQL failure, recognising SQLite's out-of-space condition.
    pub(crate) fn from_storage_write(error: libsql::Error) -> Self {
        let message = error.to_string();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("database or disk is full") || lowered.contains("sqlite_full") {
            Self::StorageFull(message)
        } else {
            Self::LibSql(error)
        }
    }
}
