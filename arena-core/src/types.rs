//! Core type definitions shared by the catalog, agents and the engine.
//!
//! All types are serializable; they are embedded verbatim in persisted
//! battle payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Catalog identifier of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ActionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Which seat of a battle an agent occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The first agent of the battle.
    Agent1,
    /// The second agent of the battle.
    Agent2,
}

impl Side {
    /// The other seat.
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::Agent1 => Self::Agent2,
            Self::Agent2 => Self::Agent1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent1 => f.write_str("agent1"),
            Self::Agent2 => f.write_str("agent2"),
        }
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Effect tags an action can carry. The vocabulary is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTag {
    /// Deal the scaled roll to the opponent.
    Damage,
    /// Restore the raw roll to the actor.
    Heal,
    /// Damage-over-time flavoured attack debuff on the opponent.
    Burn,
    /// Attack buff on the actor.
    BuffAttack,
    /// Defense buff on the actor.
    BuffDefense,
    /// Attack debuff on the opponent.
    DebuffAttack,
    /// Defense debuff on the opponent.
    DebuffDefense,
    /// Speed debuff on the opponent.
    Slow,
    /// Attack and speed debuff on the opponent.
    Sticky,
}

impl EffectTag {
    /// Every tag, in declaration order.
    pub const ALL: [EffectTag; 9] = [
        Self::Damage,
        Self::Heal,
        Self::Burn,
        Self::BuffAttack,
        Self::BuffDefense,
        Self::DebuffAttack,
        Self::DebuffDefense,
        Self::Slow,
        Self::Sticky,
    ];

    /// Tags that produce a [`crate::StatusModifier`] on the actor.
    #[must_use]
    pub fn is_self_modifier(self) -> bool {
        matches!(self, Self::BuffAttack | Self::BuffDefense)
    }

    /// Tags that produce a [`crate::StatusModifier`] on the opponent.
    #[must_use]
    pub fn is_offensive_debuff(self) -> bool {
        matches!(
            self,
            Self::Burn | Self::DebuffAttack | Self::DebuffDefense | Self::Slow | Self::Sticky
        )
    }
}

/// Inclusive damage (or heal) range of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRange {
    /// Lower bound (inclusive).
    pub min: u32,
    /// Upper bound (inclusive).
    pub max: u32,
}

impl DamageRange {
    /// Create a range. Bounds are swapped if given out of order.
    #[must_use]
    pub fn new(min: u32, max: u32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A range that always rolls `value`.
    #[must_use]
    pub fn fixed(value: u32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }
}

impl fmt::Display for DamageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}
