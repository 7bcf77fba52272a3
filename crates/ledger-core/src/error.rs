//! Error types for ledger-core

use thiserror::Error;

/// Result type alias using ledger-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store failure (quota, corruption, unavailable)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input (rejected at the append/upsert boundary)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Remote write contract failed for one record
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    /// Remote read contract failed
    #[error("Remote read failed: {0}")]
    RemoteRead(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error originates from the local durable store.
    pub const fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Sqlite(_) | Self::Io(_))
    }

    /// Whether this error came from one of the remote contracts.
    pub const fn is_remote_failure(&self) -> bool {
        matches!(self, Self::RemoteWrite(_) | Self::RemoteRead(_))
    }
}
