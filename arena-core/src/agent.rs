//! Mutable combatant state.
//!
//! An [`Agent`] is pure data plus clamped state transitions. Every method
//! preserves `0 <= hp <= max_hp` and `0 <= stamina <= max_stamina`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::BotArchetype;
use crate::config::LevelCurve;
use crate::error::{BattleError, Result};
use crate::modifier::StatusModifier;
use crate::types::{ActionId, EffectTag};

/// A combatant bound to a bot archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Player-chosen name.
    pub name: String,
    /// Archetype id.
    pub bot_type: String,
    /// Current level (starts at 1).
    pub level: u32,
    /// Current hp.
    pub hp: u32,
    /// Maximum hp.
    pub max_hp: u32,
    /// Current stamina.
    pub stamina: u32,
    /// Maximum stamina.
    pub max_stamina: u32,
    /// Experience accumulated towards the next level.
    pub experience: u32,
    /// Base attack before modifiers.
    pub attack: i32,
    /// Base defense before modifiers.
    pub defense: i32,
    /// Base speed before modifiers.
    pub speed: i32,
    /// Active modifiers in application order.
    #[serde(default)]
    pub active_modifiers: Vec<StatusModifier>,
    /// Rounds remaining before each cooled-down action can be used again.
    #[serde(default)]
    pub action_cooldowns: BTreeMap<ActionId, u32>,
}

/// Effective stats frozen at the start of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Effective attack.
    pub attack: i32,
    /// Effective defense.
    pub defense: i32,
    /// Effective speed.
    pub speed: i32,
}

/// Public-facing view of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentView {
    /// Name.
    pub name: String,
    /// Archetype id.
    pub bot_type: String,
    /// Level.
    pub level: u32,
    /// Current hp.
    pub hp: u32,
    /// Maximum hp.
    pub max_hp: u32,
    /// Current stamina.
    pub stamina: u32,
    /// Maximum stamina.
    pub max_stamina: u32,
    /// Experience towards the next level.
    pub experience: u32,
    /// Names of active modifiers in application order.
    pub modifiers: Vec<String>,
    /// Whether hp has reached zero.
    pub defeated: bool,
}

impl Agent {
    /// Create a level-1 agent with the archetype's base stats, fully rested.
    #[must_use]
    pub fn from_archetype(name: impl Into<String>, archetype: &BotArchetype) -> Self {
        Self {
            name: name.into(),
            bot_type: archetype.id.clone(),
            level: 1,
            hp: archetype.max_hp,
            max_hp: archetype.max_hp,
            stamina: archetype.max_stamina,
            max_stamina: archetype.max_stamina,
            experience: 0,
            attack: archetype.attack,
            defense: archetype.defense,
            speed: archetype.speed,
            active_modifiers: Vec::new(),
            action_cooldowns: BTreeMap::new(),
        }
    }

    /// An agent with `hp == 0` is defeated and takes no further actions.
    #[must_use]
    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }

    /// Reduce hp, never below zero. Returns the hp actually removed.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        dealt
    }

    /// Restore hp, never above `max_hp`. Returns the hp actually restored.
    ///
    /// A defeated agent cannot be healed.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if self.is_defeated() {
            return 0;
        }
        let restored = amount.min(self.max_hp.saturating_sub(self.hp));
        self.hp += restored;
        restored
    }

    /// Pay `amount` stamina.
    ///
    /// # Errors
    /// Returns [`BattleError::InsufficientStamina`] if `amount > stamina`;
    /// stamina is left untouched.
    pub fn consume_stamina(&mut self, amount: u32) -> Result<()> {
        if amount > self.stamina {
            return Err(BattleError::InsufficientStamina {
                required: amount,
                available: self.stamina,
            });
        }
        self.stamina -= amount;
        Ok(())
    }

    /// Whether the agent can pay `amount` stamina right now.
    #[must_use]
    pub fn can_afford(&self, amount: u32) -> bool {
        amount <= self.stamina
    }

    /// Recover stamina, never above `max_stamina`. Returns the amount gained.
    pub fn regenerate_stamina(&mut self, amount: u32) -> u32 {
        let gained = amount.min(self.max_stamina.saturating_sub(self.stamina));
        self.stamina += gained;
        gained
    }

    /// Append a modifier. Modifiers stack.
    pub fn add_modifier(&mut self, modifier: StatusModifier) {
        self.active_modifiers.push(modifier);
    }

    /// Decrement every modifier's duration and drop those reaching zero.
    ///
    /// Returns the removed modifiers in application order.
    pub fn tick_modifiers(&mut self) -> Vec<StatusModifier> {
        for modifier in &mut self.active_modifiers {
            modifier.duration = modifier.duration.saturating_sub(1);
        }
        let (expired, active): (Vec<_>, Vec<_>) = self
            .active_modifiers
            .drain(..)
            .partition(|m| m.duration == 0);
        self.active_modifiers = active;
        expired
    }

    /// Whether a modifier produced by `tag` is active.
    #[must_use]
    pub fn has_modifier_from(&self, tag: EffectTag) -> bool {
        self.active_modifiers.iter().any(|m| m.source == tag)
    }

    /// Base attack plus all modifier deltas. May be negative.
    #[must_use]
    pub fn effective_attack(&self) -> i32 {
        self.attack + self.active_modifiers.iter().map(|m| m.attack).sum::<i32>()
    }

    /// Base defense plus all modifier deltas. May be negative.
    #[must_use]
    pub fn effective_defense(&self) -> i32 {
        self.defense + self.active_modifiers.iter().map(|m| m.defense).sum::<i32>()
    }

    /// Base speed plus all modifier deltas. May be negative.
    #[must_use]
    pub fn effective_speed(&self) -> i32 {
        self.speed + self.active_modifiers.iter().map(|m| m.speed).sum::<i32>()
    }

    /// Freeze the current effective stats.
    #[must_use]
    pub fn combat_stats(&self) -> CombatStats {
        CombatStats {
            attack: self.effective_attack(),
            defense: self.effective_defense(),
            speed: self.effective_speed(),
        }
    }

    /// Rounds before `action` can be used again (0 when available).
    #[must_use]
    pub fn cooldown_remaining(&self, action: ActionId) -> u32 {
        self.action_cooldowns.get(&action).copied().unwrap_or(0)
    }

    /// Put `action` on cooldown for `rounds` rounds. `0` clears it.
    pub fn start_cooldown(&mut self, action: ActionId, rounds: u32) {
        if rounds == 0 {
            self.action_cooldowns.remove(&action);
        } else {
            self.action_cooldowns.insert(action, rounds);
        }
    }

    /// Decrement every cooldown, dropping those reaching zero.
    pub fn tick_cooldowns(&mut self) {
        self.action_cooldowns.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(1);
            *remaining > 0
        });
    }

    /// Grant experience on the standard curve. Returns levels gained.
    pub fn grant_experience(&mut self, amount: u32) -> u32 {
        self.grant_experience_with(amount, &LevelCurve::STANDARD)
    }

    /// Grant experience on `curve`. Every level gained raises max hp, max
    /// stamina and base stats, then fully restores hp and stamina.
    pub fn grant_experience_with(&mut self, amount: u32, curve: &LevelCurve) -> u32 {
        self.experience = self.experience.saturating_add(amount);
        let mut gained = 0;
        while curve.xp_per_level > 0 && self.experience >= curve.threshold(self.level) {
            self.experience -= curve.threshold(self.level);
            self.level += 1;
            self.max_hp += curve.hp_per_level;
            self.max_stamina += curve.stamina_per_level;
            self.attack += curve.attack_per_level;
            self.defense += curve.defense_per_level;
            self.speed += curve.speed_per_level;
            gained += 1;
        }
        if gained > 0 {
            self.hp = self.max_hp;
            self.stamina = self.max_stamina;
        }
        gained
    }

    /// Public-facing snapshot.
    #[must_use]
    pub fn view(&self) -> AgentView {
        AgentView {
            name: self.name.clone(),
            bot_type: self.bot_type.clone(),
            level: self.level,
            hp: self.hp,
            max_hp: self.max_hp,
            stamina: self.stamina,
            max_stamina: self.max_stamina,
            experience: self.experience,
            modifiers: self.active_modifiers.iter().map(|m| m.name.clone()).collect(),
            defeated: self.is_defeated(),
        }
    }
}
