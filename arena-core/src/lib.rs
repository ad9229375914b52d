//! # Arena Core
//!
//! Deterministic engine for turn-based two-agent battles.
//!
//! A [`Battle`] pairs two [`Agent`]s built from [`BotArchetype`]s. Each
//! round both sides submit an [`ActionId`] from a [`Catalog`];
//! [`BattleEngine::execute_turn`] validates both, resolves them in speed
//! order and appends a [`RoundSummary`] to the battle log.
//!
//! - **Agent**: clamped hp/stamina, stacking timed modifiers, cooldowns,
//!   experience and levels.
//! - **Engine**: snapshot-based round resolution; randomness comes only
//!   from the injected `Rng`.
//! - **Advisor**: a pure decision table recommending an action for either
//!   side.
//!
//! The engine holds no state between calls. Persistence lives in
//! `arena-store`.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod advisor;
pub mod agent;
pub mod battle;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod modifier;
pub mod types;

pub use advisor::{Advice, AdviceReason, advise, recommend_action};
pub use agent::{Agent, AgentView, CombatStats};
pub use battle::{ActionOutcome, AppliedModifier, Battle, BattleStatus, BattleSummary, RoundSummary};
pub use catalog::{ActionDefinition, BotArchetype, Catalog, StandardCatalog};
pub use config::{EngineConfig, LevelCurve, TieBreak};
pub use engine::{BattleEngine, scale_damage};
pub use error::{BattleError, InvalidActionReason};
pub use modifier::{ModifierTable, ModifierTemplate, StatusModifier};
pub use types::*;
