//! Error types for the session store.

use thiserror::Error;

use crate::config::BackendKind;

/// Top-level error type for all store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No session was ever stored under this id (or it was deleted).
    #[error("Battle not found: {0}")]
    NotFound(String),

    /// The session existed but its TTL elapsed.
    #[error("Battle expired: {0}")]
    Expired(String),

    /// The active backend could not be reached. Transient; the caller may
    /// retry the whole operation.
    #[error("Storage backend {backend} unavailable: {reason}")]
    Unavailable {
        /// Which backend failed.
        backend: BackendKind,
        /// Underlying failure.
        reason: String,
    },

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Redis command error that is not a connectivity failure.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload written by an incompatible schema version.
    #[error("Unsupported payload schema version {found} (supported: {supported})")]
    Schema {
        /// Version found in the payload.
        found: u32,
        /// Version this build reads.
        supported: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the failure is a connectivity or contention problem rather
    /// than a problem with the request or the data.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    pub(crate) fn unavailable(backend: BackendKind, reason: impl ToString) -> Self {
        Self::Unavailable {
            backend,
            reason: reason.to_string(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, StoreError>;
