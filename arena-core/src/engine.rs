//! Round resolution.
//!
//! [`BattleEngine::execute_turn`] resolves one round in a fixed order:
//!
//! 1. Validation: both actions must exist, be off cooldown and be
//!    affordable, and the battle must be in progress. Any failure rejects
//!    the whole round before anything is mutated.
//! 2. Snapshot: effective attack/defense/speed of both agents are frozen.
//!    Damage scaling and the speed order of this round use the snapshot,
//!    so a modifier applied this round only counts from the next round on.
//! 3. Ordering: strictly higher snapshot speed acts first; ties follow
//!    [`TieBreak`].
//! 4. Stamina: both agents regenerate, then both pay their costs.
//! 5. Effects: applied per actor in speed order. Both actions always
//!    resolve, even if the first one knocks the opponent out.
//! 6. Upkeep: modifiers tick, then cooldowns tick, then the used actions
//!    go on cooldown.
//! 7. Termination: one agent at 0 hp loses; both at 0 hp is a draw.
//! 8. The round summary is appended to the battle log.

use rand::Rng;
use tracing::{debug, info};

use crate::agent::{Agent, CombatStats};
use crate::battle::{ActionOutcome, AppliedModifier, Battle, BattleStatus, RoundSummary};
use crate::catalog::{ActionDefinition, Catalog};
use crate::config::{EngineConfig, TieBreak};
use crate::error::{BattleError, InvalidActionReason, Result};
use crate::types::{ActionId, EffectTag, Side};

/// Scale a raw roll by attacker attack over defender defense, rounding half
/// up. Both factors are floored at 1, so negative stats behave like 1 for
/// either side.
#[must_use]
pub fn scale_damage(roll: u32, attack: i32, defense: i32) -> u32 {
    let attack = u64::try_from(attack.max(1)).unwrap_or(1);
    let defense = u64::try_from(defense.max(1)).unwrap_or(1);
    let scaled = (u64::from(roll) * attack * 2 + defense) / (defense * 2);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Stateless round resolver over a catalog and a configuration.
#[derive(Debug, Clone, Copy)]
pub struct BattleEngine<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    config: &'a EngineConfig,
}

impl<'a, C: Catalog + ?Sized> BattleEngine<'a, C> {
    /// Create an engine.
    #[must_use]
    pub fn new(catalog: &'a C, config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// The catalog this engine resolves against.
    #[must_use]
    pub fn catalog(&self) -> &'a C {
        self.catalog
    }

    /// Check a round submission without mutating anything.
    ///
    /// # Errors
    /// Returns [`BattleError::InvalidAction`] for a complete battle or an
    /// unknown, cooling-down or unaffordable action.
    pub fn validate(
        &self,
        battle: &Battle,
        action1: ActionId,
        action2: ActionId,
    ) -> Result<(&'a ActionDefinition, &'a ActionDefinition)> {
        if battle.is_complete() {
            return Err(BattleError::InvalidAction {
                side: None,
                reason: InvalidActionReason::BattleComplete,
            });
        }
        let first = self.validate_side(&battle.agent1, Side::Agent1, action1)?;
        let second = self.validate_side(&battle.agent2, Side::Agent2, action2)?;
        Ok((first, second))
    }

    fn validate_side(
        &self,
        agent: &Agent,
        side: Side,
        id: ActionId,
    ) -> Result<&'a ActionDefinition> {
        let action = self
            .catalog
            .action(id)
            .ok_or_else(|| BattleError::invalid(side, InvalidActionReason::UnknownAction(id)))?;

        let remaining = agent.cooldown_remaining(id);
        if remaining > 0 {
            return Err(BattleError::invalid(
                side,
                InvalidActionReason::OnCooldown {
                    action: id,
                    remaining,
                },
            ));
        }

        if !agent.can_afford(action.stamina_cost) {
            return Err(BattleError::invalid(
                side,
                InvalidActionReason::InsufficientStamina {
                    action: id,
                    required: action.stamina_cost,
                    available: agent.stamina,
                },
            ));
        }

        Ok(action)
    }

    /// Which side acts first given frozen stats.
    #[must_use]
    pub fn first_actor(&self, stats1: &CombatStats, stats2: &CombatStats) -> Side {
        match stats1.speed.cmp(&stats2.speed) {
            std::cmp::Ordering::Greater => Side::Agent1,
            std::cmp::Ordering::Less => Side::Agent2,
            std::cmp::Ordering::Equal => match self.config.tie_break {
                TieBreak::Agent1First => Side::Agent1,
                TieBreak::Agent2First => Side::Agent2,
            },
        }
    }

    /// Resolve one round. On error the battle is untouched.
    ///
    /// # Errors
    /// Returns [`BattleError::InvalidAction`] when validation fails.
    pub fn execute_turn<R: Rng + ?Sized>(
        &self,
        battle: &mut Battle,
        action1: ActionId,
        action2: ActionId,
        rng: &mut R,
    ) -> Result<RoundSummary> {
        let (def1, def2) = self.validate(battle, action1, action2)?;

        let stats1 = battle.agent1.combat_stats();
        let stats2 = battle.agent2.combat_stats();
        let first = self.first_actor(&stats1, &stats2);

        let regen = self.config.stamina_regen_per_round;
        battle.agent1.regenerate_stamina(regen);
        battle.agent2.regenerate_stamina(regen);
        battle.agent1.consume_stamina(def1.stamina_cost)?;
        battle.agent2.consume_stamina(def2.stamina_cost)?;

        let mut actions = Vec::with_capacity(2);
        for side in [first, first.opponent()] {
            let (action, own, other) = match side {
                Side::Agent1 => (def1, &stats1, &stats2),
                Side::Agent2 => (def2, &stats2, &stats1),
            };
            actions.push(self.apply_action(battle, side, action, own, other, rng));
        }

        let expired_agent1 = names(battle.agent1.tick_modifiers());
        let expired_agent2 = names(battle.agent2.tick_modifiers());
        battle.agent1.tick_cooldowns();
        battle.agent2.tick_cooldowns();
        battle.agent1.start_cooldown(def1.id, def1.cooldown);
        battle.agent2.start_cooldown(def2.id, def2.cooldown);

        battle.current_round += 1;
        self.check_termination(battle);

        let summary = RoundSummary {
            round: battle.current_round,
            first,
            actions,
            agent1: battle.agent1.view(),
            agent2: battle.agent2.view(),
            expired_agent1,
            expired_agent2,
            status: battle.status,
            winner: battle.winner,
            winner_name: battle.winner_agent().map(|a| a.name.clone()),
        };

        debug!(
            round = summary.round,
            first = %first,
            hp1 = battle.agent1.hp,
            hp2 = battle.agent2.hp,
            stamina1 = battle.agent1.stamina,
            stamina2 = battle.agent2.stamina,
            "Round resolved"
        );

        battle.battle_log.push(summary.clone());
        Ok(summary)
    }

    fn apply_action<R: Rng + ?Sized>(
        &self,
        battle: &mut Battle,
        side: Side,
        action: &ActionDefinition,
        own: &CombatStats,
        other: &CombatStats,
        rng: &mut R,
    ) -> ActionOutcome {
        let (actor, target) = battle.pair_mut(side);
        let range = action.damage_range;
        let roll = action.rolls().then(|| {
            if range.min >= range.max {
                range.min
            } else {
                rng.gen_range(range.min..=range.max)
            }
        });

        let mut outcome = ActionOutcome {
            actor: side,
            actor_name: actor.name.clone(),
            action_id: action.id,
            action_name: action.name.clone(),
            stamina_cost: action.stamina_cost,
            roll,
            damage: 0,
            healed: 0,
            modifiers_applied: Vec::new(),
        };

        if let Some(roll) = roll {
            if action.has(EffectTag::Damage) {
                outcome.damage = target.apply_damage(scale_damage(roll, own.attack, other.defense));
            }
            if action.has(EffectTag::Heal) {
                outcome.healed = actor.heal(roll);
            }
        }

        for &tag in &action.effects {
            let Some(template) = self.config.modifiers.template(tag) else {
                continue;
            };
            let (recipient, recipient_side) = if tag.is_self_modifier() {
                (&mut *actor, side)
            } else {
                (&mut *target, side.opponent())
            };
            if recipient.is_defeated() {
                continue;
            }
            recipient.add_modifier(template.instantiate(tag));
            outcome.modifiers_applied.push(AppliedModifier {
                target: recipient_side,
                name: template.name.clone(),
            });
        }

        outcome
    }

    fn check_termination(&self, battle: &mut Battle) {
        let down1 = battle.agent1.is_defeated();
        let down2 = battle.agent2.is_defeated();
        if !down1 && !down2 {
            return;
        }

        battle.status = BattleStatus::Complete;
        battle.winner = match (down1, down2) {
            (true, false) => Some(Side::Agent2),
            (false, true) => Some(Side::Agent1),
            _ => None,
        };

        if let Some(side) = battle.winner {
            let xp = self.config.victory_experience;
            let levels = battle
                .agent_mut(side)
                .grant_experience_with(xp, &self.config.leveling);
            info!(
                round = battle.current_round,
                winner = %battle.agent(side).name,
                levels_gained = levels,
                "Battle complete"
            );
        } else {
            info!(round = battle.current_round, "Battle complete: double knockout");
        }
    }
}

fn names(modifiers: Vec<crate::modifier::StatusModifier>) -> Vec<String> {
    modifiers.into_iter().map(|m| m.name).collect()
}
