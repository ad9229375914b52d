//! Timed stat modifiers (buffs and debuffs).
//!
//! A [`StatusModifier`] is created from a [`ModifierTemplate`] when an action
//! carrying a buff/debuff tag resolves. Modifiers stack: every application
//! appends a new entry, and effective stats sum all entries.
//!
//! Durations count the round of application. The engine ticks modifiers at
//! the end of every round, so a modifier with `duration = 3` applied in round
//! N influences rounds N+1 and N+2 and is removed at the end of N+2.

use serde::{Deserialize, Serialize};

use crate::types::EffectTag;

/// A timed, stacking stat delta attached to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusModifier {
    /// Display name ("Burning", "Fortified", ...).
    pub name: String,
    /// The effect tag that produced this modifier.
    pub source: EffectTag,
    /// Signed delta to attack.
    pub attack: i32,
    /// Signed delta to defense.
    pub defense: i32,
    /// Signed delta to speed.
    pub speed: i32,
    /// Rounds remaining. Removed when it reaches zero.
    pub duration: u32,
}

impl StatusModifier {
    /// Whether this modifier lowers any stat.
    #[must_use]
    pub fn is_debuff(&self) -> bool {
        self.attack < 0 || self.defense < 0 || self.speed < 0
    }
}

/// Blueprint for the modifier an effect tag produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierTemplate {
    /// Display name.
    pub name: String,
    /// Attack delta.
    #[serde(default)]
    pub attack: i32,
    /// Defense delta.
    #[serde(default)]
    pub defense: i32,
    /// Speed delta.
    #[serde(default)]
    pub speed: i32,
    /// Duration in rounds, counting the round of application.
    pub duration: u32,
}

impl ModifierTemplate {
    fn new(name: &str, attack: i32, defense: i32, speed: i32, duration: u32) -> Self {
        Self {
            name: name.to_string(),
            attack,
            defense,
            speed,
            duration,
        }
    }

    /// Instantiate a live modifier.
    #[must_use]
    pub fn instantiate(&self, source: EffectTag) -> StatusModifier {
        StatusModifier {
            name: self.name.clone(),
            source,
            attack: self.attack,
            defense: self.defense,
            speed: self.speed,
            duration: self.duration,
        }
    }
}

/// Modifier templates for every buff/debuff effect tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierTable {
    /// `burn`
    pub burn: ModifierTemplate,
    /// `buff_attack`
    pub buff_attack: ModifierTemplate,
    /// `buff_defense`
    pub buff_defense: ModifierTemplate,
    /// `debuff_attack`
    pub debuff_attack: ModifierTemplate,
    /// `debuff_defense`
    pub debuff_defense: ModifierTemplate,
    /// `slow`
    pub slow: ModifierTemplate,
    /// `sticky`
    pub sticky: ModifierTemplate,
}

impl Default for ModifierTable {
    fn default() -> Self {
        Self {
            burn: ModifierTemplate::new("Burning", -3, 0, 0, 3),
            buff_attack: ModifierTemplate::new("Empowered", 3, 0, 0, 3),
            buff_defense: ModifierTemplate::new("Fortified", 0, 3, 0, 3),
            debuff_attack: ModifierTemplate::new("Weakened", -3, 0, 0, 3),
            debuff_defense: ModifierTemplate::new("Exposed", 0, -3, 0, 3),
            slow: ModifierTemplate::new("Slowed", 0, 0, -3, 3),
            sticky: ModifierTemplate::new("Sticky", -2, 0, -2, 3),
        }
    }
}

impl ModifierTable {
    /// Template for `tag`, or `None` for tags that do not create modifiers
    /// (`damage`, `heal`).
    #[must_use]
    pub fn template(&self, tag: EffectTag) -> Option<&ModifierTemplate> {
        match tag {
            EffectTag::Damage | EffectTag::Heal => None,
            EffectTag::Burn => Some(&self.burn),
            EffectTag::BuffAttack => Some(&self.buff_attack),
            EffectTag::BuffDefense => Some(&self.buff_defense),
            EffectTag::DebuffAttack => Some(&self.debuff_attack),
            EffectTag::DebuffDefense => Some(&self.debuff_defense),
            EffectTag::Slow => Some(&self.slow),
            EffectTag::Sticky => Some(&self.sticky),
        }
    }
}
