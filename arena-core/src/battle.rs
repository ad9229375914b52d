//! Battle aggregate and round log types.
//!
//! A [`Battle`] owns both agents and an append-only log of
//! [`RoundSummary`] entries. It is mutated only by
//! [`crate::engine::BattleEngine::execute_turn`] and becomes read-only once
//! its status is [`BattleStatus::Complete`].

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentView};
use crate::types::{ActionId, Side};

/// Lifecycle state of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    /// Rounds are still being accepted.
    #[default]
    InProgress,
    /// A terminal condition fired. No further rounds are accepted.
    Complete,
}

/// A modifier placed by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedModifier {
    /// Who received it.
    pub target: Side,
    /// Modifier name.
    pub name: String,
}

/// What one side's action did this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Acting side.
    pub actor: Side,
    /// Acting agent's name.
    pub actor_name: String,
    /// Action used.
    pub action_id: ActionId,
    /// Action name.
    pub action_name: String,
    /// Stamina paid.
    pub stamina_cost: u32,
    /// Raw roll, for actions that deal damage or heal.
    pub roll: Option<u32>,
    /// Hp removed from the opponent.
    pub damage: u32,
    /// Hp restored to the actor.
    pub healed: u32,
    /// Modifiers placed by this action.
    #[serde(default)]
    pub modifiers_applied: Vec<AppliedModifier>,
}

impl ActionOutcome {
    /// One-line human readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!("{} uses {}", self.actor_name, self.action_name);
        if self.damage > 0 {
            text.push_str(&format!(" for {} damage", self.damage));
        }
        if self.healed > 0 {
            text.push_str(&format!(", healing {}", self.healed));
        }
        for m in &self.modifiers_applied {
            text.push_str(&format!(" [{} -> {}]", m.name, m.target));
        }
        text
    }
}

/// Structured record of one resolved round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round number (1-based).
    pub round: u32,
    /// Side whose effects were applied first.
    pub first: Side,
    /// Both actions, in the order they were applied.
    pub actions: Vec<ActionOutcome>,
    /// Agent 1 after the round.
    pub agent1: AgentView,
    /// Agent 2 after the round.
    pub agent2: AgentView,
    /// Modifiers that expired on agent 1 at the end of the round.
    #[serde(default)]
    pub expired_agent1: Vec<String>,
    /// Modifiers that expired on agent 2 at the end of the round.
    #[serde(default)]
    pub expired_agent2: Vec<String>,
    /// Status after the round.
    pub status: BattleStatus,
    /// Winning side, if the round ended the battle with a survivor.
    pub winner: Option<Side>,
    /// Winning agent's name.
    pub winner_name: Option<String>,
}

impl RoundSummary {
    /// Whether this round ended the battle.
    #[must_use]
    pub fn battle_over(&self) -> bool {
        self.status == BattleStatus::Complete
    }

    /// Both action descriptions joined with `"; "`.
    #[must_use]
    pub fn commentary(&self) -> String {
        self.actions
            .iter()
            .map(ActionOutcome::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Read-only overview of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSummary {
    /// Rounds resolved so far.
    pub rounds: u32,
    /// Status.
    pub status: BattleStatus,
    /// Winning side.
    pub winner: Option<Side>,
    /// Winning agent's name.
    pub winner_name: Option<String>,
    /// Agent 1.
    pub agent1: AgentView,
    /// Agent 2.
    pub agent2: AgentView,
    /// Number of log entries.
    pub log_entries: usize,
}

/// One match between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    /// First agent.
    pub agent1: Agent,
    /// Second agent.
    pub agent2: Agent,
    /// Rounds resolved so far.
    pub current_round: u32,
    /// Append-only round log.
    #[serde(default)]
    pub battle_log: Vec<RoundSummary>,
    /// Surviving side once complete. `None` while in progress and on a draw.
    pub winner: Option<Side>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: BattleStatus,
    /// Sides whose win or loss has not reached the agent stats yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_results: Vec<Side>,
}

impl Battle {
    /// Start a battle between two agents.
    #[must_use]
    pub fn new(agent1: Agent, agent2: Agent) -> Self {
        Self {
            agent1,
            agent2,
            current_round: 0,
            battle_log: Vec::new(),
            winner: None,
            status: BattleStatus::InProgress,
            pending_results: Vec::new(),
        }
    }

    /// Whether the battle has ended.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == BattleStatus::Complete
    }

    /// Whether the battle ended with both agents down.
    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.is_complete() && self.winner.is_none()
    }

    /// Borrow the agent in `side`.
    #[must_use]
    pub fn agent(&self, side: Side) -> &Agent {
        match side {
            Side::Agent1 => &self.agent1,
            Side::Agent2 => &self.agent2,
        }
    }

    /// Mutably borrow the agent in `side`.
    pub fn agent_mut(&mut self, side: Side) -> &mut Agent {
        match side {
            Side::Agent1 => &mut self.agent1,
            Side::Agent2 => &mut self.agent2,
        }
    }

    /// Mutably borrow `(actor, opponent)` for `side`.
    pub fn pair_mut(&mut self, side: Side) -> (&mut Agent, &mut Agent) {
        match side {
            Side::Agent1 => (&mut self.agent1, &mut self.agent2),
            Side::Agent2 => (&mut self.agent2, &mut self.agent1),
        }
    }

    /// The winning agent, if any.
    #[must_use]
    pub fn winner_agent(&self) -> Option<&Agent> {
        self.winner.map(|side| self.agent(side))
    }

    /// The losing agent, if the battle has a winner.
    #[must_use]
    pub fn loser_agent(&self) -> Option<&Agent> {
        self.winner.map(|side| self.agent(side.opponent()))
    }

    /// Queue both sides' results for recording once the battle has a
    /// winner, winner first. A draw queues nothing.
    pub fn queue_results(&mut self) {
        if let Some(winner) = self.winner {
            self.pending_results = vec![winner, winner.opponent()];
        }
    }

    /// Whether the battle ended with results still to record.
    #[must_use]
    pub fn has_pending_results(&self) -> bool {
        !self.pending_results.is_empty()
    }

    /// Most recent log entry.
    #[must_use]
    pub fn last_round(&self) -> Option<&RoundSummary> {
        self.battle_log.last()
    }

    /// Read-only overview.
    #[must_use]
    pub fn summary(&self) -> BattleSummary {
        BattleSummary {
            rounds: self.current_round,
            status: self.status,
            winner: self.winner,
            winner_name: self.winner_agent().map(|a| a.name.clone()),
            agent1: self.agent1.view(),
            agent2: self.agent2.view(),
            log_entries: self.battle_log.len(),
        }
    }
}
