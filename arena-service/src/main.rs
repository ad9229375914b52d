//! `arena-sim`: plays one advisor-driven battle end to end.
//!
//! ```text
//! arena-sim [CONFIG.toml] [BOT1] [BOT2]
//! ```
//!
//! Prints the final battle summary and both agents' stats as JSON.

use std::path::PathBuf;
use std::time::Duration;

use arena_core::Side;
use arena_service::{ArenaConfig, BattleService, Result, ServiceError, telemetry};
use tracing::{info, warn};

const MAX_ROUNDS: u32 = 500;
const PRUNE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let bot1 = args.next().unwrap_or_else(|| "mende".to_string());
    let bot2 = args.next().unwrap_or_else(|| "regulus".to_string());

    let config = ArenaConfig::load(config_path.as_deref())?;
    telemetry::init_tracing(&config.logging);

    let service = BattleService::from_config(&config)?;
    let pruner = service.store().spawn_pruner(PRUNE_INTERVAL);

    let result = tokio::task::spawn_blocking(move || play(&service, &bot1, &bot2))
        .await
        .map_err(|e| ServiceError::Config(format!("simulation task failed: {e}")))?;
    pruner.abort();

    println!("{}", serde_json::to_string_pretty(&result?).map_err(|e| ServiceError::Config(e.to_string()))?);
    Ok(())
}

fn play(service: &BattleService, bot1: &str, bot2: &str) -> Result<serde_json::Value> {
    let created = service.create_battle("Player", bot1, "Rival", bot2)?;
    let id = created.battle_id;
    info!(battle_id = %id, backend = %service.storage_info()?.backend, "Simulation started");

    for _ in 0..MAX_ROUNDS {
        let (Some(a1), Some(a2)) = (
            service.recommend_action(&id, Side::Agent1)?,
            service.recommend_action(&id, Side::Agent2)?,
        ) else {
            break;
        };
        let round = service.submit_round(&id, a1.action.0, a2.action.0)?;
        if round.battle_over() {
            break;
        }
    }

    let summary = service.battle_summary(&id)?;
    if summary.winner.is_none() {
        warn!(battle_id = %id, rounds = summary.rounds, "Simulation ended without a winner");
    }
    Ok(serde_json::json!({
        "battle_id": id,
        "summary": summary,
        "stats": [service.agent_stats("Player")?, service.agent_stats("Rival")?],
    }))
}
