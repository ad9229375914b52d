//! The battle service: what a transport layer calls.
//!
//! [`BattleService`] ties the engine to the session store. Every round is
//! resolved inside [`SessionStore::update`], so duplicate submissions for
//! one battle run one after another and a rejected round never writes.

use std::sync::Arc;
use std::time::Instant;

use arena_core::{
    Advice, Agent, AgentView, Battle, BattleEngine, BattleError, BattleSummary, Catalog, EngineConfig,
    InvalidActionReason, RoundSummary, Side, StandardCatalog, advise,
};
use arena_store::{AgentStatRecord, SessionStore, StorageInfo, StoreError};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::error::{Result, ServiceError};

/// Returned by [`BattleService::create_battle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBattle {
    /// Id to submit rounds against.
    pub battle_id: String,
    /// Agent 1 as created.
    pub agent1: AgentView,
    /// Agent 2 as created.
    pub agent2: AgentView,
}

/// Cumulative results for one agent name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Agent name.
    pub agent_name: String,
    /// Battles won.
    pub wins: u64,
    /// Battles lost.
    pub losses: u64,
    /// Battles finished with a winner.
    pub total_battles: u64,
    /// `wins / total_battles`, 0 with no battles.
    pub win_rate: f64,
    /// When the last result was recorded.
    pub last_battle_at: Option<DateTime<Utc>>,
}

impl From<AgentStatRecord> for AgentStats {
    fn from(record: AgentStatRecord) -> Self {
        Self {
            win_rate: record.win_rate(),
            agent_name: record.agent_name,
            wins: record.wins,
            losses: record.losses,
            total_battles: record.total_battles,
            last_battle_at: record.last_battle_at,
        }
    }
}

/// Battle lifecycle over a shared session store.
#[derive(Debug)]
pub struct BattleService<C: Catalog = StandardCatalog> {
    store: Arc<SessionStore>,
    catalog: C,
    engine: EngineConfig,
}

impl BattleService<StandardCatalog> {
    /// Open the configured store and use the built-in catalog.
    ///
    /// # Errors
    /// Returns [`ServiceError::Store`] if no backend could be opened.
    pub fn from_config(config: &ArenaConfig) -> Result<Self> {
        let store = SessionStore::open(&config.store)?;
        Ok(Self::new(Arc::new(store), StandardCatalog::standard(), config.engine.clone()))
    }
}

impl<C: Catalog> BattleService<C> {
    /// Wrap an already-opened store.
    #[must_use]
    pub fn new(store: Arc<SessionStore>, catalog: C, engine: EngineConfig) -> Self {
        Self { store, catalog, engine }
    }

    /// The session store, e.g. for [`SessionStore::spawn_pruner`].
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The action and archetype catalog.
    #[must_use]
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Battles
    // ------------------------------------------------------------------

    /// Start a battle between two freshly built agents.
    ///
    /// # Errors
    /// [`ServiceError::UnknownArchetype`] if either archetype id is not in
    /// the catalog; store errors otherwise.
    pub fn create_battle(&self, name1: &str, bot1: &str, name2: &str, bot2: &str) -> Result<CreatedBattle> {
        let agent1 = self.build_agent(name1, bot1)?;
        let agent2 = self.build_agent(name2, bot2)?;
        let battle = Battle::new(agent1, agent2);

        let battle_id = Uuid::new_v4().simple().to_string();
        self.store.put(&battle_id, &battle)?;

        info!(
            battle_id = %battle_id,
            agent1 = %name1,
            agent2 = %name2,
            bot1 = %bot1,
            bot2 = %bot2,
            "Battle created"
        );
        Ok(CreatedBattle {
            battle_id,
            agent1: battle.agent1.view(),
            agent2: battle.agent2.view(),
        })
    }

    fn build_agent(&self, name: &str, bot: &str) -> Result<Agent> {
        let archetype = self
            .catalog
            .archetype(bot)
            .ok_or_else(|| ServiceError::UnknownArchetype(bot.to_string()))?;
        Ok(Agent::from_archetype(name, archetype))
    }

    /// Resolve one round with the thread-local RNG.
    ///
    /// # Errors
    /// See [`BattleService::submit_round_with_rng`].
    pub fn submit_round(&self, battle_id: &str, action1: u32, action2: u32) -> Result<RoundSummary> {
        self.submit_round_with_rng(battle_id, action1, action2, &mut rand::thread_rng())
    }

    /// Resolve one round and persist the result.
    ///
    /// Expired sessions are pruned first. When the round ends the battle
    /// with a winner, both sides' results are queued on the saved battle and
    /// then recorded under the battle's lock; draws record nothing. A result
    /// that fails to record stays queued and is retried by the next
    /// `submit_round` or `battle_summary` for this battle.
    ///
    /// # Errors
    /// `NotFound`/`Expired` for unreadable ids, `InvalidAction` for a
    /// rejected submission (nothing is written), store errors if the
    /// resolved round could not be persisted.
    pub fn submit_round_with_rng<R: Rng + ?Sized>(
        &self,
        battle_id: &str,
        action1: u32,
        action2: u32,
        rng: &mut R,
    ) -> Result<RoundSummary> {
        let start = Instant::now();
        if let Err(e) = self.store.prune() {
            warn!(error = %e, "Prune before round failed");
        }

        let engine = BattleEngine::new(&self.catalog, &self.engine);
        let resolved = self.store.update(battle_id, |battle| -> Result<RoundSummary> {
            let summary = engine.execute_turn(battle, action1.into(), action2.into(), rng)?;
            if summary.battle_over() {
                battle.queue_results();
            }
            Ok(summary)
        });

        let summary = match resolved {
            Ok(summary) => summary,
            Err(e) => {
                if is_battle_complete(&e) {
                    self.settle_results(battle_id);
                }
                return Err(e);
            }
        };
        if summary.winner.is_some() {
            self.settle_results(battle_id);
        }

        info!(
            battle_id = %battle_id,
            round = summary.round,
            status = ?summary.status,
            elapsed_us = start.elapsed().as_micros(),
            "Round submitted"
        );
        Ok(summary)
    }

    /// Record whatever results the battle still has queued. Failures are
    /// logged and left queued for the next call.
    fn settle_results(&self, battle_id: &str) {
        if let Err(e) = self.try_settle_results(battle_id) {
            warn!(battle_id = %battle_id, error = %e, "Recording battle results failed");
        }
    }

    /// Each side leaves the queue only once its counter write succeeded, and
    /// the shortened queue is saved even when a later write fails, so a
    /// retry resumes with the side that failed.
    fn try_settle_results(&self, battle_id: &str) -> Result<()> {
        let failure = self.store.update(battle_id, |battle| -> Result<Option<StoreError>> {
            while let Some(&side) = battle.pending_results.first() {
                let won = battle.winner == Some(side);
                if let Err(e) = self.store.record_result(&battle.agent(side).name, won) {
                    return Ok(Some(e));
                }
                battle.pending_results.remove(0);
            }
            Ok(None)
        })?;
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Rounds, status, winner and both agents of one battle.
    ///
    /// # Errors
    /// `NotFound`/`Expired` for unreadable ids.
    pub fn battle_summary(&self, battle_id: &str) -> Result<BattleSummary> {
        let battle = self.store.get(battle_id)?;
        if battle.has_pending_results() {
            self.settle_results(battle_id);
        }
        Ok(battle.summary())
    }

    /// Ask the advisor what `side` should play next.
    ///
    /// Returns `None` once the battle is complete.
    ///
    /// # Errors
    /// `NotFound`/`Expired` for unreadable ids.
    pub fn recommend_action(&self, battle_id: &str, side: Side) -> Result<Option<Advice>> {
        self.recommend_action_with_rng(battle_id, side, &mut rand::thread_rng())
    }

    /// [`BattleService::recommend_action`] with an explicit RNG.
    ///
    /// # Errors
    /// `NotFound`/`Expired` for unreadable ids.
    pub fn recommend_action_with_rng<R: Rng + ?Sized>(
        &self,
        battle_id: &str,
        side: Side,
        rng: &mut R,
    ) -> Result<Option<Advice>> {
        let battle = self.store.get(battle_id)?;
        if battle.is_complete() {
            return Ok(None);
        }
        Ok(advise(battle.agent(side), battle.agent(side.opponent()), &self.catalog, rng))
    }

    // ------------------------------------------------------------------
    // Stats & storage
    // ------------------------------------------------------------------

    /// Win/loss counters for `agent_name`; zeros if it never finished a
    /// battle.
    ///
    /// # Errors
    /// Store errors.
    pub fn agent_stats(&self, agent_name: &str) -> Result<AgentStats> {
        Ok(self.store.stats(agent_name)?.into())
    }

    /// Active backend, TTL and live session count.
    ///
    /// # Errors
    /// Store errors.
    pub fn storage_info(&self) -> Result<StorageInfo> {
        Ok(self.store.storage_info()?)
    }
}

fn is_battle_complete(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::Battle(BattleError::InvalidAction {
            reason: InvalidActionReason::BattleComplete,
            ..
        })
    )
}
