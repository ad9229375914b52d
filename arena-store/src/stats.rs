//! Cross-battle win/loss counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative results for one agent name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatRecord {
    /// Natural key.
    pub agent_name: String,
    /// Battles won.
    pub wins: u64,
    /// Battles lost.
    pub losses: u64,
    /// Battles recorded.
    pub total_battles: u64,
    /// When the last result was recorded.
    pub last_battle_at: Option<DateTime<Utc>>,
}

impl AgentStatRecord {
    /// The zero record returned for names with no history.
    #[must_use]
    pub fn empty(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            wins: 0,
            losses: 0,
            total_battles: 0,
            last_battle_at: None,
        }
    }

    /// Count one result.
    pub fn record(&mut self, won: bool, at: DateTime<Utc>) {
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.total_battles += 1;
        self.last_battle_at = Some(at);
    }

    /// `wins / total_battles`, or 0 with no battles.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn win_rate(&self) -> f64 {
        if self.total_battles == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_battles as f64
        }
    }
}
