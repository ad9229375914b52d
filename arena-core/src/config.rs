//! Engine configuration.
//!
//! Loadable from the `[engine]` table of the service configuration; every
//! field has a default so an empty table is valid.

use serde::{Deserialize, Serialize};

use crate::modifier::ModifierTable;

/// Round-resolution tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stamina both agents recover at the start of every round, before costs.
    #[serde(default = "default_regen")]
    pub stamina_regen_per_round: u32,
    /// Experience granted to the winner when a battle ends.
    #[serde(default = "default_victory_xp")]
    pub victory_experience: u32,
    /// Who acts first when effective speeds are equal.
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Level-up growth curve.
    #[serde(default)]
    pub leveling: LevelCurve,
    /// Modifier produced by each buff/debuff tag.
    #[serde(default)]
    pub modifiers: ModifierTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stamina_regen_per_round: default_regen(),
            victory_experience: default_victory_xp(),
            tie_break: TieBreak::default(),
            leveling: LevelCurve::default(),
            modifiers: ModifierTable::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML string.
    ///
    /// # Errors
    /// Returns `BattleError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::BattleError::Config(e.to_string()))
    }
}

/// Speed tie rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Agent 1 acts first on equal speed.
    #[default]
    Agent1First,
    /// Agent 2 acts first on equal speed.
    Agent2First,
}

/// Per-level growth. Experience needed for the next level is
/// `xp_per_level * level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCurve {
    /// Experience multiplier per level.
    pub xp_per_level: u32,
    /// Max hp gained per level.
    pub hp_per_level: u32,
    /// Max stamina gained per level.
    pub stamina_per_level: u32,
    /// Attack gained per level.
    pub attack_per_level: i32,
    /// Defense gained per level.
    pub defense_per_level: i32,
    /// Speed gained per level.
    pub speed_per_level: i32,
}

impl LevelCurve {
    /// The standard curve.
    pub const STANDARD: Self = Self {
        xp_per_level: 100,
        hp_per_level: 10,
        stamina_per_level: 5,
        attack_per_level: 2,
        defense_per_level: 1,
        speed_per_level: 1,
    };

    /// Experience required to advance from `level` to `level + 1`.
    #[must_use]
    pub fn threshold(&self, level: u32) -> u32 {
        self.xp_per_level.saturating_mul(level.max(1))
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::STANDARD
    }
}

fn default_regen() -> u32 { 5 }
fn default_victory_xp() -> u32 { 100 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml("").expect("parse");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::from_toml(
            r#"
            stamina_regen_per_round = 0
            tie_break = "agent2_first"

            [modifiers.burn]
            name = "Scorched"
            attack = -5
            duration = 4
            "#,
        )
        .expect("parse");
        assert_eq!(config.stamina_regen_per_round, 0);
        assert_eq!(config.tie_break, TieBreak::Agent2First);
        assert_eq!(config.modifiers.burn.name, "Scorched");
        assert_eq!(config.modifiers.slow, ModifierTable::default().slow);
    }

    #[test]
    fn threshold_scales_with_level() {
        let curve = LevelCurve::STANDARD;
        assert_eq!(curve.threshold(1), 100);
        assert_eq!(curve.threshold(3), 300);
    }
}
