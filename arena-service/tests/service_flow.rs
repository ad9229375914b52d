//! End-to-end service tests over real stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arena_core::{
    ActionDefinition, BattleStatus, BotArchetype, DamageRange, EffectTag, EngineConfig, Side, StandardCatalog,
};
use arena_service::{ArenaConfig, BattleService, ServiceError};
use arena_store::backend::MemoryBackend;
use arena_store::{
    AgentStatRecord, BackendKind, Clock, Lookup, ManualClock, SessionBackend, SessionStore, StoreConfig,
    StoreError,
};
use chrono::{DateTime, TimeDelta, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

const NUKE: u32 = 1;
const WAIT: u32 = 2;

fn duel_catalog() -> StandardCatalog {
    let bot = BotArchetype {
        id: "dummy".to_string(),
        name: "Dummy".to_string(),
        max_hp: 100,
        max_stamina: 50,
        attack: 10,
        defense: 10,
        speed: 10,
        signature_actions: vec![],
    };
    StandardCatalog::new(
        vec![
            ActionDefinition::new(NUKE, "Nuke", 0, DamageRange::fixed(500), [EffectTag::Damage], 0),
            ActionDefinition::new(WAIT, "Wait", 0, DamageRange::fixed(0), Vec::new(), 0),
        ],
        vec![bot],
    )
    .expect("catalog")
}

fn duel_service(clock: Arc<ManualClock>, ttl_secs: u64) -> BattleService<StandardCatalog> {
    let store = SessionStore::open_with_clock(&StoreConfig::memory(ttl_secs), clock).expect("store");
    BattleService::new(Arc::new(store), duel_catalog(), EngineConfig::default())
}

#[test]
fn knockout_records_stats_once() {
    let svc = duel_service(Arc::new(ManualClock::starting_now()), 60);
    let id = svc.create_battle("Ada", "dummy", "Bix", "dummy").expect("create").battle_id;

    let round = svc.submit_round(&id, NUKE, WAIT).expect("round");
    assert!(round.battle_over());
    assert_eq!(round.winner, Some(Side::Agent1));
    assert_eq!(round.winner_name.as_deref(), Some("Ada"));

    let ada = svc.agent_stats("Ada").expect("stats");
    let bix = svc.agent_stats("Bix").expect("stats");
    assert_eq!((ada.wins, ada.losses, ada.total_battles), (1, 0, 1));
    assert_eq!((bix.wins, bix.losses, bix.total_battles), (0, 1, 1));
    assert!((ada.win_rate - 1.0).abs() < f64::EPSILON);

    // The finished battle refuses further rounds and records nothing more.
    let err = svc.submit_round(&id, NUKE, NUKE).expect_err("complete");
    assert_eq!(err.code(), "invalid_action");
    assert_eq!(svc.agent_stats("Ada").expect("stats").total_battles, 1);

    let summary = svc.battle_summary(&id).expect("summary");
    assert_eq!(summary.status, BattleStatus::Complete);
    assert_eq!(summary.rounds, 1);
    assert!(svc.recommend_action(&id, Side::Agent2).expect("advice").is_none());
}

#[test]
fn double_knockout_is_a_draw_without_stats() {
    let svc = duel_service(Arc::new(ManualClock::starting_now()), 60);
    let id = svc.create_battle("Ada", "dummy", "Bix", "dummy").expect("create").battle_id;

    let round = svc.submit_round(&id, NUKE, NUKE).expect("round");
    assert!(round.battle_over());
    assert_eq!(round.winner, None);
    assert_eq!(svc.agent_stats("Ada").expect("stats").total_battles, 0);
    assert_eq!(svc.agent_stats("Bix").expect("stats").total_battles, 0);
}

#[test]
fn timed_out_battle_is_expired_not_missing() {
    let clock = Arc::new(ManualClock::starting_now());
    let svc = duel_service(clock.clone(), 1);
    let id = svc.create_battle("Ada", "dummy", "Bix", "dummy").expect("create").battle_id;

    clock.advance(TimeDelta::seconds(2));
    let err = svc.submit_round(&id, WAIT, WAIT).expect_err("expired");
    assert!(matches!(err, ServiceError::Store(StoreError::Expired(_))));
    assert_eq!(err.status_code(), 410);

    // The submission pruned the session; it stays expired.
    assert_eq!(svc.storage_info().expect("info").session_count, 0);
    assert_eq!(svc.battle_summary(&id).expect_err("expired").status_code(), 410);
    assert_eq!(svc.battle_summary("never-created").expect_err("missing").status_code(), 404);
}

#[test]
fn duplicate_submissions_resolve_one_at_a_time() {
    let svc = Arc::new(duel_service(Arc::new(ManualClock::starting_now()), 60));
    let id = svc.create_battle("Ada", "dummy", "Bix", "dummy").expect("create").battle_id;

    let threads: Vec<_> = (0..6)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    svc.submit_round(&id, WAIT, WAIT).expect("round");
                }
            })
        })
        .collect();
    for t in threads {
        t.join().expect("thread");
    }

    let summary = svc.battle_summary(&id).expect("summary");
    assert_eq!(summary.rounds, 30);
    assert_eq!(summary.log_entries, 30);
}

#[test]
fn sqlite_battles_survive_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ArenaConfig::from_toml(&format!(
        "[store]\npriority = [\"sqlite\", \"memory\"]\n\n[store.sqlite]\npath = {:?}\n",
        dir.path().join("arena.db").display().to_string()
    ))
    .expect("config");

    let mut rng = StdRng::seed_from_u64(5);
    let (id, before) = {
        let svc = BattleService::from_config(&config).expect("service");
        assert_eq!(svc.storage_info().expect("info").backend, BackendKind::Sqlite);
        let id = svc.create_battle("Ada", "spark", "Bix", "sentinel").expect("create").battle_id;
        svc.submit_round_with_rng(&id, 7, 5, &mut rng).expect("round 1");
        svc.submit_round_with_rng(&id, 1, 9, &mut rng).expect("round 2");
        (id.clone(), svc.battle_summary(&id).expect("summary"))
    };

    let svc = BattleService::from_config(&config).expect("reopen");
    let after = svc.battle_summary(&id).expect("summary");
    assert_eq!(after, before);
    assert_eq!(after.rounds, 2);
    assert!(!after.agent2.modifiers.is_empty());
}

#[test]
fn advisor_driven_battle_finishes() {
    let store = SessionStore::open(&StoreConfig::memory(600)).expect("store");
    let svc = BattleService::new(Arc::new(store), StandardCatalog::standard(), EngineConfig::default());
    let id = svc.create_battle("Ada", "spark", "Bix", "regulus").expect("create").battle_id;
    let mut rng = StdRng::seed_from_u64(11);

    let mut finished = None;
    for _ in 0..500 {
        let a1 = svc
            .recommend_action_with_rng(&id, Side::Agent1, &mut rng)
            .expect("advice")
            .expect("action");
        let a2 = svc
            .recommend_action_with_rng(&id, Side::Agent2, &mut rng)
            .expect("advice")
            .expect("action");
        let round = svc
            .submit_round_with_rng(&id, a1.action.0, a2.action.0, &mut rng)
            .expect("advised actions are legal");
        if round.battle_over() {
            finished = Some(round);
            break;
        }
    }

    let last = finished.expect("battle should finish within 500 rounds");
    let ada = svc.agent_stats("Ada").expect("stats");
    let bix = svc.agent_stats("Bix").expect("stats");
    let expected = u64::from(last.winner.is_some());
    assert_eq!((ada.total_battles, bix.total_battles), (expected, expected));
    assert_eq!(ada.wins + bix.wins, expected);
}

#[test]
fn manual_clock_is_the_store_clock() {
    let clock = Arc::new(ManualClock::starting_now());
    let svc = duel_service(clock.clone(), 60);
    let id = svc.create_battle("Ada", "dummy", "Bix", "dummy").expect("create").battle_id;
    svc.submit_round(&id, NUKE, WAIT).expect("round");
    assert_eq!(svc.agent_stats("Ada").expect("stats").last_battle_at, Some(clock.now()));
}

// ---------------------------------------------------------------------------
// Stat writes that fail
// ---------------------------------------------------------------------------

/// Memory backend whose `fail_on`-th stat write (1-based) is refused.
#[derive(Debug)]
struct FlakyStats {
    inner: MemoryBackend,
    fail_on: usize,
    calls: AtomicUsize,
}

impl SessionBackend for FlakyStats {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn put(&self, id: &str, payload: &[u8], now: DateTime<Utc>, expires_at: DateTime<Utc>) -> arena_store::Result<()> {
        self.inner.put(id, payload, now, expires_at)
    }

    fn get(&self, id: &str, now: DateTime<Utc>, refresh_to: DateTime<Utc>) -> arena_store::Result<Lookup> {
        self.inner.get(id, now, refresh_to)
    }

    fn delete(&self, id: &str) -> arena_store::Result<bool> {
        self.inner.delete(id)
    }

    fn prune(&self, now: DateTime<Utc>, tombstone_cutoff: DateTime<Utc>) -> arena_store::Result<usize> {
        self.inner.prune(now, tombstone_cutoff)
    }

    fn session_count(&self, now: DateTime<Utc>) -> arena_store::Result<usize> {
        self.inner.session_count(now)
    }

    fn record_result(&self, agent_name: &str, won: bool, at: DateTime<Utc>) -> arena_store::Result<AgentStatRecord> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(StoreError::Unavailable {
                backend: BackendKind::Memory,
                reason: "stats write refused".to_string(),
            });
        }
        self.inner.record_result(agent_name, won, at)
    }

    fn stats(&self, agent_name: &str) -> arena_store::Result<Option<AgentStatRecord>> {
        self.inner.stats(agent_name)
    }
}

fn flaky_service(fail_on: usize) -> BattleService<StandardCatalog> {
    let backend = FlakyStats {
        inner: MemoryBackend::new(),
        fail_on,
        calls: AtomicUsize::new(0),
    };
    let store = SessionStore::with_backend(
        Box::new(backend),
        &StoreConfig::memory(60),
        Arc::new(ManualClock::starting_now()),
    );
    BattleService::new(Arc::new(store), duel_catalog(), EngineConfig::default())
}

fn counters(svc: &BattleService<StandardCatalog>, name: &str) -> (u64, u64, u64) {
    let stats = svc.agent_stats(name).expect("stats");
    (stats.wins, stats.losses, stats.total_battles)
}

#[test]
fn failed_winner_write_is_recorded_on_retry() {
    let svc = flaky_service(1);
    let id = svc.create_battle("Ada", "dummy", "Bix", "dummy").expect("create").battle_id;

    // The round itself was saved, so it is reported as resolved.
    let round = svc.submit_round(&id, NUKE, WAIT).expect("round");
    assert_eq!(round.winner, Some(Side::Agent1));
    assert_eq!(counters(&svc, "Ada"), (0, 0, 0));
    assert_eq!(counters(&svc, "Bix"), (0, 0, 0));

    // A resubmission is still refused, but flushes the queued results.
    let err = svc.submit_round(&id, NUKE, WAIT).expect_err("complete");
    assert_eq!(err.code(), "invalid_action");
    assert_eq!(counters(&svc, "Ada"), (1, 0, 1));
    assert_eq!(counters(&svc, "Bix"), (0, 1, 1));

    svc.battle_summary(&id).expect("summary");
    svc.submit_round(&id, NUKE, WAIT).expect_err("complete");
    assert_eq!(counters(&svc, "Ada"), (1, 0, 1));
    assert_eq!(counters(&svc, "Bix"), (0, 1, 1));
}

#[test]
fn failed_loser_write_is_not_double_counted() {
    let svc = flaky_service(2);
    let id = svc.create_battle("Ada", "dummy", "Bix", "dummy").expect("create").battle_id;

    svc.submit_round(&id, NUKE, WAIT).expect("round");
    assert_eq!(counters(&svc, "Ada"), (1, 0, 1));
    assert_eq!(counters(&svc, "Bix"), (0, 0, 0));

    let summary = svc.battle_summary(&id).expect("summary");
    assert_eq!(summary.winner_name.as_deref(), Some("Ada"));
    assert_eq!(counters(&svc, "Ada"), (1, 0, 1));
    assert_eq!(counters(&svc, "Bix"), (0, 1, 1));

    svc.battle_summary(&id).expect("summary");
    assert_eq!(counters(&svc, "Bix"), (0, 1, 1));
    assert_eq!(svc.store().pending_locks(), 0);
}
