//! Error types for the battle engine.

use thiserror::Error;

use crate::types::{ActionId, Side};

/// Why a submitted action was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidActionReason {
    /// The id is not in the catalog.
    UnknownAction(ActionId),
    /// The action was used too recently.
    OnCooldown {
        /// Offending action.
        action: ActionId,
        /// Rounds until it can be used again.
        remaining: u32,
    },
    /// The agent cannot pay the stamina cost.
    InsufficientStamina {
        /// Offending action.
        action: ActionId,
        /// Cost of the action.
        required: u32,
        /// Stamina the agent has.
        available: u32,
    },
    /// The battle already has a result.
    BattleComplete,
}

impl std::fmt::Display for InvalidActionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAction(id) => write!(f, "unknown action {id}"),
            Self::OnCooldown { action, remaining } => {
                write!(f, "action {action} is on cooldown for {remaining} more round(s)")
            }
            Self::InsufficientStamina {
                action,
                required,
                available,
            } => write!(
                f,
                "action {action} costs {required} stamina but only {available} is available"
            ),
            Self::BattleComplete => f.write_str("battle is already complete"),
        }
    }
}

/// Top-level error type for engine operations.
#[derive(Error, Debug)]
pub enum BattleError {
    /// A round submission was rejected. Battle state is unchanged.
    #[error("Invalid action: {reason}")]
    InvalidAction {
        /// The side whose action was refused (`None` when the whole battle refuses).
        side: Option<Side>,
        /// Why.
        reason: InvalidActionReason,
    },

    /// `Agent::consume_stamina` was asked for more than the agent has.
    #[error("Insufficient stamina: required {required}, available {available}")]
    InsufficientStamina {
        /// Requested amount.
        required: u32,
        /// Current stamina.
        available: u32,
    },

    /// The catalog has no archetype with this id.
    #[error("Unknown bot archetype: {0}")]
    UnknownArchetype(String),

    /// Configuration or catalog definition error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BattleError {
    /// Shorthand for a per-side rejection.
    #[must_use]
    pub fn invalid(side: Side, reason: InvalidActionReason) -> Self {
        Self::InvalidAction {
            side: Some(side),
            reason,
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, BattleError>;
