//! AI advisor: picks an action for one side of a battle.
//!
//! A pure decision table over explicit inputs. The only randomness is the
//! injected `rng`, used for the weighted pick when the agent is low on hp
//! and has no defensive option.
//!
//! 1. **Low hp** (`hp < 30%` of max): first heal or defense buff, else a
//!    pick weighted by damage ceiling.
//! 2. **Low stamina** (`stamina < 30%` of max) or afflicted by `sticky`:
//!    cheapest action.
//! 3. **Otherwise**: first offensive debuff the opponent does not already
//!    carry, else the first offensive debuff, else the highest damage
//!    ceiling.
//!
//! Ties are broken by catalog order.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::catalog::{ActionDefinition, Catalog};
use crate::types::{ActionId, EffectTag};

/// Hp and stamina thresholds, in percent of max.
const LOW_HP_PERCENT: u64 = 30;
const LOW_STAMINA_PERCENT: u64 = 30;

/// Which row of the decision table produced a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceReason {
    /// Low hp, a heal was available.
    Heal,
    /// Low hp, a defense buff was available.
    Defend,
    /// Low hp, nothing defensive: weighted pick.
    Desperate,
    /// Low stamina or sticky: cheapest action.
    Conserve,
    /// A debuff the opponent does not carry yet.
    FreshDebuff,
    /// A debuff the opponent already carries (stacks).
    Debuff,
    /// Highest damage ceiling.
    MaxDamage,
}

/// A recommendation and why it was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    /// Recommended action.
    pub action: ActionId,
    /// Decision-table row.
    pub reason: AdviceReason,
    /// `true` when nothing was affordable and the cheapest action was
    /// returned regardless.
    pub fallback: bool,
}

/// Recommend an action id for `agent` against `opponent`.
///
/// Returns `None` only for an empty catalog.
pub fn recommend_action<C, R>(
    agent: &Agent,
    opponent: &Agent,
    catalog: &C,
    rng: &mut R,
) -> Option<ActionId>
where
    C: Catalog + ?Sized,
    R: Rng + ?Sized,
{
    advise(agent, opponent, catalog, rng).map(|a| a.action)
}

/// Like [`recommend_action`] but also reports the decision-table row.
pub fn advise<C, R>(agent: &Agent, opponent: &Agent, catalog: &C, rng: &mut R) -> Option<Advice>
where
    C: Catalog + ?Sized,
    R: Rng + ?Sized,
{
    let usable: Vec<&ActionDefinition> = catalog
        .actions()
        .iter()
        .filter(|a| agent.can_afford(a.stamina_cost) && agent.cooldown_remaining(a.id) == 0)
        .collect();

    let (candidates, fallback) = if usable.is_empty() {
        (vec![cheapest(catalog.actions())?], true)
    } else {
        (usable, false)
    };

    let (action, reason) = decide(agent, opponent, &candidates, rng)?;
    Some(Advice {
        action,
        reason,
        fallback,
    })
}

fn decide<R: Rng + ?Sized>(
    agent: &Agent,
    opponent: &Agent,
    candidates: &[&ActionDefinition],
    rng: &mut R,
) -> Option<(ActionId, AdviceReason)> {
    if below_percent(agent.hp, agent.max_hp, LOW_HP_PERCENT) {
        let defensive = candidates
            .iter()
            .find(|a| a.has(EffectTag::Heal) || a.has(EffectTag::BuffDefense));
        if let Some(a) = defensive {
            let reason = if a.has(EffectTag::Heal) { AdviceReason::Heal } else { AdviceReason::Defend };
            return Some((a.id, reason));
        }
        return weighted_pick(candidates, rng).map(|id| (id, AdviceReason::Desperate));
    }

    if below_percent(agent.stamina, agent.max_stamina, LOW_STAMINA_PERCENT)
        || agent.has_modifier_from(EffectTag::Sticky)
    {
        return cheapest(candidates.iter().copied()).map(|a| (a.id, AdviceReason::Conserve));
    }

    let fresh = candidates.iter().find(|a| {
        a.effects
            .iter()
            .any(|&t| t.is_offensive_debuff() && !opponent.has_modifier_from(t))
    });
    if let Some(a) = fresh {
        return Some((a.id, AdviceReason::FreshDebuff));
    }
    if let Some(a) = candidates.iter().find(|a| a.has_offensive_debuff()) {
        return Some((a.id, AdviceReason::Debuff));
    }

    highest_ceiling(candidates).map(|a| (a.id, AdviceReason::MaxDamage))
}

fn below_percent(value: u32, max: u32, percent: u64) -> bool {
    u64::from(value) * 100 < u64::from(max) * percent
}

/// Lowest stamina cost, first in catalog order on ties.
fn cheapest<'a>(
    actions: impl IntoIterator<Item = &'a ActionDefinition>,
) -> Option<&'a ActionDefinition> {
    actions
        .into_iter()
        .fold(None, |best: Option<&ActionDefinition>, a| match best {
            Some(b) if b.stamina_cost <= a.stamina_cost => Some(b),
            _ => Some(a),
        })
}

/// Highest damage ceiling, first in catalog order on ties.
fn highest_ceiling<'a>(candidates: &[&'a ActionDefinition]) -> Option<&'a ActionDefinition> {
    candidates
        .iter()
        .copied()
        .fold(None, |best: Option<&ActionDefinition>, a| match best {
            Some(b) if b.damage_range.max >= a.damage_range.max => Some(b),
            _ => Some(a),
        })
}

fn weighted_pick<R: Rng + ?Sized>(candidates: &[&ActionDefinition], rng: &mut R) -> Option<ActionId> {
    // +1 keeps pure utility actions pickable
    let weights = candidates.iter().map(|a| u64::from(a.damage_range.max) + 1);
    let dist = WeightedIndex::new(weights).ok()?;
    candidates.get(dist.sample(rng)).map(|a| a.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BotArchetype, StandardCatalog};
    use crate::modifier::ModifierTable;
    use crate::types::DamageRange;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (StandardCatalog, Agent, Agent) {
        let catalog = StandardCatalog::standard();
        let a = Agent::from_archetype("A", catalog.archetype("mende").expect("mende"));
        let b = Agent::from_archetype("B", catalog.archetype("regulus").expect("regulus"));
        (catalog, a, b)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn low_hp_prefers_heal() {
        let (catalog, mut a, b) = setup();
        a.hp = 20;
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(4));
        assert_eq!(advice.reason, AdviceReason::Heal);
    }

    #[test]
    fn low_hp_without_heal_defends() {
        let (catalog, mut a, b) = setup();
        a.hp = 20;
        a.start_cooldown(ActionId(4), 2);
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(5));
        assert_eq!(advice.reason, AdviceReason::Defend);
    }

    #[test]
    fn low_hp_takes_first_defensive_in_catalog_order() {
        let bot = BotArchetype {
            id: "wall".to_string(),
            name: "Wall".to_string(),
            max_hp: 100,
            max_stamina: 50,
            attack: 10,
            defense: 10,
            speed: 10,
            signature_actions: vec![],
        };
        let catalog = StandardCatalog::new(
            vec![
                ActionDefinition::new(1, "Guard", 5, DamageRange::fixed(0), [EffectTag::BuffDefense], 0),
                ActionDefinition::new(2, "Patch", 5, DamageRange::new(10, 20), [EffectTag::Heal], 0),
            ],
            vec![bot],
        )
        .expect("catalog");
        let wall = catalog.archetype("wall").expect("wall");
        let mut a = Agent::from_archetype("A", wall);
        let b = Agent::from_archetype("B", wall);
        a.hp = 10;

        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(1));
        assert_eq!(advice.reason, AdviceReason::Defend);
    }

    #[test]
    fn low_hp_with_nothing_defensive_is_seeded() {
        let (catalog, mut a, b) = setup();
        a.hp = 20;
        a.start_cooldown(ActionId(4), 2);
        a.start_cooldown(ActionId(5), 2);
        let first = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        let second = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(first, second);
        assert_eq!(first.reason, AdviceReason::Desperate);
        assert!(catalog.action(first.action).is_some());
        assert!(![ActionId(4), ActionId(5)].contains(&first.action));
    }

    #[test]
    fn low_stamina_conserves() {
        let (catalog, mut a, b) = setup();
        a.stamina = 10;
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(1));
        assert_eq!(advice.reason, AdviceReason::Conserve);
    }

    #[test]
    fn sticky_conserves() {
        let (catalog, mut a, b) = setup();
        let table = ModifierTable::default();
        a.add_modifier(table.sticky.instantiate(EffectTag::Sticky));
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.reason, AdviceReason::Conserve);
        assert_eq!(advice.action, ActionId(1));
    }

    #[test]
    fn healthy_prefers_fresh_debuff() {
        let (catalog, a, mut b) = setup();
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(3), "firebrand is the first debuff");
        assert_eq!(advice.reason, AdviceReason::FreshDebuff);

        let table = ModifierTable::default();
        b.add_modifier(table.burn.instantiate(EffectTag::Burn));
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(7), "burn already applied, slow next");
    }

    #[test]
    fn stacks_debuff_when_all_applied() {
        let (catalog, a, mut b) = setup();
        let table = ModifierTable::default();
        for tag in EffectTag::ALL.into_iter().filter(|t| t.is_offensive_debuff()) {
            b.add_modifier(table.template(tag).expect("template").instantiate(tag));
        }
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(3));
        assert_eq!(advice.reason, AdviceReason::Debuff);
    }

    #[test]
    fn no_debuffs_picks_highest_ceiling() {
        let (catalog, mut a, b) = setup();
        for id in [3, 7, 8, 9, 10] {
            a.start_cooldown(ActionId(id), 2);
        }
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert_eq!(advice.action, ActionId(2));
        assert_eq!(advice.reason, AdviceReason::MaxDamage);
    }

    #[test]
    fn nothing_usable_falls_back_to_cheapest() {
        let (catalog, mut a, b) = setup();
        a.start_cooldown(ActionId(1), 1);
        a.stamina = 0;
        let advice = advise(&a, &b, &catalog, &mut rng()).expect("advice");
        assert!(advice.fallback);
        assert_eq!(advice.action, ActionId(1));
    }

    #[test]
    fn empty_catalog_gives_none() {
        let (_, a, b) = setup();
        let empty = StandardCatalog::new(vec![], vec![]).expect("empty");
        assert_eq!(recommend_action(&a, &b, &empty, &mut rng()), None);
    }
}
