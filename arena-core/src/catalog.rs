//! Read-only action and archetype catalog.
//!
//! The engine only ever reads from a [`Catalog`]. [`StandardCatalog`] is the
//! built-in table the service ships with; hosts with their own data can
//! implement the trait directly.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::types::{ActionId, DamageRange, EffectTag};

/// One catalog action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Unique id.
    pub id: ActionId,
    /// Display name.
    pub name: String,
    /// Stamina paid when the action is used.
    pub stamina_cost: u32,
    /// Roll range for damage and heal amounts.
    pub damage_range: DamageRange,
    /// Effect tags.
    pub effects: BTreeSet<EffectTag>,
    /// Rounds before the action can be used again (0 = no cooldown).
    #[serde(default)]
    pub cooldown: u32,
}

impl ActionDefinition {
    /// Build an action definition.
    #[must_use]
    pub fn new(
        id: u32,
        name: impl Into<String>,
        stamina_cost: u32,
        damage_range: DamageRange,
        effects: impl IntoIterator<Item = EffectTag>,
        cooldown: u32,
    ) -> Self {
        Self {
            id: ActionId(id),
            name: name.into(),
            stamina_cost,
            damage_range,
            effects: effects.into_iter().collect(),
            cooldown,
        }
    }

    /// Whether the action carries `tag`.
    #[must_use]
    pub fn has(&self, tag: EffectTag) -> bool {
        self.effects.contains(&tag)
    }

    /// Whether the action needs a roll (it deals damage or heals).
    #[must_use]
    pub fn rolls(&self) -> bool {
        self.has(EffectTag::Damage) || self.has(EffectTag::Heal)
    }

    /// Whether any effect is an offensive debuff.
    #[must_use]
    pub fn has_offensive_debuff(&self) -> bool {
        self.effects.iter().any(|t| t.is_offensive_debuff())
    }
}

/// A bot archetype: base stats at level 1 plus its signature actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotArchetype {
    /// Archetype id ("mende", "regulus", ...).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Level-1 maximum hp.
    pub max_hp: u32,
    /// Level-1 maximum stamina.
    pub max_stamina: u32,
    /// Level-1 attack.
    pub attack: i32,
    /// Level-1 defense.
    pub defense: i32,
    /// Level-1 speed.
    pub speed: i32,
    /// Actions this archetype is known for.
    #[serde(default)]
    pub signature_actions: Vec<ActionId>,
}

/// Read-only lookup of actions and archetypes.
pub trait Catalog {
    /// All actions, in catalog order.
    fn actions(&self) -> &[ActionDefinition];

    /// All archetypes, in catalog order.
    fn archetypes(&self) -> &[BotArchetype];

    /// Look up an action by id.
    fn action(&self, id: ActionId) -> Option<&ActionDefinition> {
        self.actions().iter().find(|a| a.id == id)
    }

    /// Look up an archetype by id. `None` for unknown ids.
    fn archetype(&self, id: &str) -> Option<&BotArchetype> {
        self.archetypes().iter().find(|a| a.id == id)
    }
}

/// In-memory catalog backed by two vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardCatalog {
    #[serde(default)]
    actions: Vec<ActionDefinition>,
    #[serde(default)]
    archetypes: Vec<BotArchetype>,
}

impl StandardCatalog {
    /// Build a catalog, rejecting duplicate ids and inverted damage ranges.
    ///
    /// # Errors
    /// Returns [`BattleError::Config`] on duplicate action or archetype ids,
    /// or on a `damage_range` with `min > max`.
    pub fn new(actions: Vec<ActionDefinition>, archetypes: Vec<BotArchetype>) -> Result<Self> {
        let mut seen = HashSet::new();
        for action in &actions {
            if !seen.insert(action.id) {
                return Err(BattleError::Config(format!("duplicate action id {}", action.id)));
            }
            if action.damage_range.min > action.damage_range.max {
                return Err(BattleError::Config(format!(
                    "action {} has damage range {}",
                    action.id, action.damage_range
                )));
            }
        }
        let mut seen = HashSet::new();
        for archetype in &archetypes {
            if !seen.insert(archetype.id.as_str()) {
                return Err(BattleError::Config(format!(
                    "duplicate archetype id {}",
                    archetype.id
                )));
            }
        }
        Ok(Self {
            actions,
            archetypes,
        })
    }

    /// Load a catalog from TOML (`[[actions]]` and `[[archetypes]]` tables).
    ///
    /// # Errors
    /// Returns [`BattleError::Config`] if the TOML is invalid or ids repeat.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let raw: Self = toml::from_str(toml_str).map_err(|e| BattleError::Config(e.to_string()))?;
        Self::new(raw.actions, raw.archetypes)
    }

    /// The built-in catalog.
    #[must_use]
    pub fn standard() -> Self {
        use EffectTag::{
            BuffAttack, BuffDefense, Burn, Damage, DebuffAttack, DebuffDefense, Heal, Slow, Sticky,
        };

        let actions = vec![
            ActionDefinition::new(1, "Strike", 0, DamageRange::new(6, 10), [Damage], 0),
            ActionDefinition::new(2, "Heavy Blow", 20, DamageRange::new(14, 20), [Damage], 1),
            ActionDefinition::new(3, "Firebrand", 15, DamageRange::new(8, 12), [Damage, Burn], 2),
            ActionDefinition::new(4, "Mend", 10, DamageRange::new(8, 12), [Heal], 2),
            ActionDefinition::new(5, "Bulwark", 10, DamageRange::fixed(0), [BuffDefense], 2),
            ActionDefinition::new(6, "War Cry", 10, DamageRange::fixed(0), [BuffAttack], 2),
            ActionDefinition::new(7, "Frost Snare", 15, DamageRange::new(5, 8), [Damage, Slow], 2),
            ActionDefinition::new(8, "Tar Bomb", 15, DamageRange::new(4, 7), [Damage, Sticky], 3),
            ActionDefinition::new(9, "Sunder", 15, DamageRange::new(6, 9), [Damage, DebuffDefense], 2),
            ActionDefinition::new(10, "Intimidate", 5, DamageRange::fixed(0), [DebuffAttack], 2),
        ];

        let archetypes = vec![
            archetype("mende", "Mende", 100, 50, 10, 10, 10, &[4, 5, 1]),
            archetype("regulus", "Regulus", 110, 45, 12, 9, 8, &[2, 3, 9]),
            archetype("spark", "Spark", 90, 60, 11, 8, 13, &[7, 3, 1]),
            archetype("eco", "Eco", 100, 55, 9, 11, 9, &[8, 4, 10]),
            archetype("sentinel", "Sentinel", 130, 40, 8, 14, 6, &[5, 9, 2]),
        ];

        Self {
            actions,
            archetypes,
        }
    }
}

impl Default for StandardCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog for StandardCatalog {
    fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    fn archetypes(&self) -> &[BotArchetype] {
        &self.archetypes
    }
}

#[allow(clippy::too_many_arguments)]
fn archetype(
    id: &str,
    name: &str,
    max_hp: u32,
    max_stamina: u32,
    attack: i32,
    defense: i32,
    speed: i32,
    signature: &[u32],
) -> BotArchetype {
    BotArchetype {
        id: id.to_string(),
        name: name.to_string(),
        max_hp,
        max_stamina,
        attack,
        defense,
        speed,
        signature_actions: signature.iter().copied().map(ActionId).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_free_action() {
        let catalog = StandardCatalog::standard();
        assert!(catalog.actions().iter().any(|a| a.stamina_cost == 0));
    }

    #[test]
    fn standard_signatures_resolve() {
        let catalog = StandardCatalog::standard();
        for bot in catalog.archetypes() {
            for id in &bot.signature_actions {
                assert!(catalog.action(*id).is_some(), "{} -> {id}", bot.id);
            }
        }
    }

    #[test]
    fn unknown_archetype_is_none() {
        let catalog = StandardCatalog::standard();
        assert!(catalog.archetype("mende").is_some());
        assert!(catalog.archetype("nobody").is_none());
    }

    #[test]
    fn duplicate_action_ids_rejected() {
        let a = ActionDefinition::new(1, "A", 0, DamageRange::fixed(1), [EffectTag::Damage], 0);
        let err = StandardCatalog::new(vec![a.clone(), a], vec![]).expect_err("duplicate");
        assert!(matches!(err, BattleError::Config(_)));
    }

    #[test]
    fn inverted_range_from_toml_rejected() {
        let toml = r#"
            [[actions]]
            id = 1
            name = "Backwards"
            stamina_cost = 0
            damage_range = { min = 9, max = 2 }
            effects = ["damage"]
        "#;
        let err = StandardCatalog::from_toml(toml).expect_err("inverted range");
        assert!(matches!(err, BattleError::Config(_)));
    }

    #[test]
    fn catalog_from_toml() {
        let toml = r#"
            [[actions]]
            id = 1
            name = "Jab"
            stamina_cost = 0
            damage_range = { min = 2, max = 4 }
            effects = ["damage"]

            [[archetypes]]
            id = "dummy"
            name = "Dummy"
            max_hp = 50
            max_stamina = 20
            attack = 5
            defense = 5
            speed = 5
        "#;
        let catalog = StandardCatalog::from_toml(toml).expect("parse");
        let jab = catalog.action(ActionId(1)).expect("jab");
        assert_eq!(jab.cooldown, 0);
        assert!(jab.has(EffectTag::Damage));
        assert_eq!(catalog.archetype("dummy").expect("dummy").max_hp, 50);
    }
}
