//! Arena benchmark suite.
//!
//! Reference targets on a desktop CPU:
//!   round_resolution_single ........ < 5μs
//!   advisor_recommendation ......... < 2μs
//!   full_battle_advisor_driven ..... < 500μs
//!   store_update_memory ............ < 50μs
//!   store_update_sqlite ............ < 1ms

use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use arena_core::{
    ActionId, Agent, Battle, BattleEngine, Catalog, EngineConfig, StandardCatalog, recommend_action,
};
use arena_store::{SessionStore, StoreConfig, StoreError, SystemClock};

fn fresh_battle(catalog: &StandardCatalog) -> Battle {
    Battle::new(
        Agent::from_archetype("Ada", catalog.archetype("spark").expect("spark")),
        Agent::from_archetype("Bix", catalog.archetype("regulus").expect("regulus")),
    )
}

/// Benchmark: one round between two fresh agents.
fn bench_round_resolution(c: &mut Criterion) {
    let catalog = StandardCatalog::standard();
    let config = EngineConfig::default();
    let engine = BattleEngine::new(&catalog, &config);
    let mut rng = StdRng::seed_from_u64(1);

    c.bench_function("round_resolution_single", |b| {
        b.iter_batched(
            || fresh_battle(&catalog),
            |mut battle| {
                let summary = engine
                    .execute_turn(&mut battle, black_box(ActionId(3)), black_box(ActionId(9)), &mut rng)
                    .expect("legal round");
                black_box(summary);
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: one advisor decision.
fn bench_advisor(c: &mut Criterion) {
    let catalog = StandardCatalog::standard();
    let battle = fresh_battle(&catalog);
    let mut rng = StdRng::seed_from_u64(2);

    c.bench_function("advisor_recommendation", |b| {
        b.iter(|| {
            let action = recommend_action(
                black_box(&battle.agent1),
                black_box(&battle.agent2),
                &catalog,
                &mut rng,
            );
            black_box(action);
        });
    });
}

/// Benchmark: a whole battle with both sides following the advisor.
fn bench_full_battle(c: &mut Criterion) {
    let catalog = StandardCatalog::standard();
    let config = EngineConfig::default();
    let engine = BattleEngine::new(&catalog, &config);
    let mut rng = StdRng::seed_from_u64(3);

    c.bench_function("full_battle_advisor_driven", |b| {
        b.iter_batched(
            || fresh_battle(&catalog),
            |mut battle| {
                for _ in 0..500 {
                    if battle.is_complete() {
                        break;
                    }
                    let a1 = recommend_action(&battle.agent1, &battle.agent2, &catalog, &mut rng)
                        .expect("non-empty catalog");
                    let a2 = recommend_action(&battle.agent2, &battle.agent1, &catalog, &mut rng)
                        .expect("non-empty catalog");
                    engine.execute_turn(&mut battle, a1, a2, &mut rng).expect("legal round");
                }
                black_box(battle);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_store_update(c: &mut Criterion, name: &str, store: &SessionStore) {
    let catalog = StandardCatalog::standard();
    store.put("bench", &fresh_battle(&catalog)).expect("put");

    c.bench_function(name, |b| {
        b.iter(|| {
            store
                .update("bench", |battle| {
                    battle.current_round = battle.current_round.wrapping_add(1);
                    Ok::<_, StoreError>(())
                })
                .expect("update");
        });
    });
}

/// Benchmark: get-mutate-put through the in-memory backend.
fn bench_store_memory(c: &mut Criterion) {
    let store = SessionStore::open(&StoreConfig::memory(3600)).expect("memory store");
    bench_store_update(c, "store_update_memory", &store);
}

/// Benchmark: get-mutate-put through a file-backed SQLite backend.
fn bench_store_sqlite(c: &mut Criterion) {
    let dir = std::env::temp_dir().join(format!("arena-bench-{}", std::process::id()));
    let config = StoreConfig::sqlite(dir.join("bench.db"), 3600);
    let store = SessionStore::open_with_clock(&config, Arc::new(SystemClock)).expect("sqlite store");
    bench_store_update(c, "store_update_sqlite", &store);
    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
}

criterion_group!(
    benches,
    bench_round_resolution,
    bench_advisor,
    bench_full_battle,
    bench_store_memory,
    bench_store_sqlite,
);
criterion_main!(benches);
