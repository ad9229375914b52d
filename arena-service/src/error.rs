//! Error type for the service boundary.
//!
//! Every failure a caller can see is one [`ServiceError`]. [`ServiceError::code`]
//! gives a stable machine-readable name and [`ServiceError::status_code`]
//! the HTTP status a transport layer should answer with.

use arena_core::BattleError;
use arena_store::StoreError;
use thiserror::Error;

/// Top-level error type for all service operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Round resolution or catalog failure.
    #[error(transparent)]
    Battle(#[from] BattleError),

    /// Session storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `create_battle` named an archetype the catalog does not have.
    #[error("Unknown bot archetype: {0}")]
    UnknownArchetype(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Stable error name for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(StoreError::NotFound(_)) => "battle_not_found",
            Self::Store(StoreError::Expired(_)) => "battle_expired",
            Self::Store(e) if e.is_transient() => "storage_unavailable",
            Self::Store(_) => "storage_error",
            Self::Battle(BattleError::InvalidAction { .. } | BattleError::InsufficientStamina { .. }) => {
                "invalid_action"
            }
            Self::Battle(BattleError::UnknownArchetype(_)) | Self::UnknownArchetype(_) => {
                "unknown_archetype"
            }
            Self::Battle(BattleError::Config(_)) | Self::Config(_) => "configuration_error",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.code() {
            "battle_not_found" => 404,
            "battle_expired" => 410,
            "invalid_action" | "unknown_archetype" => 400,
            "storage_unavailable" => 503,
            _ => 500,
        }
    }

    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ServiceError>;
