//! The session store facade.
//!
//! [`SessionStore`] resolves one backend at startup from
//! [`StoreConfig::priority`] and keeps it for its whole lifetime. If the
//! chosen backend fails at call time the error is surfaced as
//! [`StoreError::Unavailable`]; there is no per-call failover, since that
//! would split one battle's history across two media.
//!
//! The store owns TTL bookkeeping (every successful read or write pushes
//! the expiry to `now + ttl`) and payload encoding, and serializes
//! get-mutate-put sequences per battle id through [`SessionStore::update`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use arena_core::Battle;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{Lookup, MemoryBackend, RedisBackend, SessionBackend, SqliteBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::{BackendKind, StoreConfig};
use crate::error::{Result, StoreError};
use crate::payload;
use crate::stats::AgentStatRecord;

/// A decoded session with its timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// Battle id.
    pub id: String,
    /// The battle.
    pub battle: Battle,
    /// First write.
    pub created_at: DateTime<Utc>,
    /// Last write or read.
    pub updated_at: DateTime<Utc>,
    /// When the session stops being readable.
    pub expires_at: DateTime<Utc>,
}

/// What the store is running on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Active backend.
    pub backend: BackendKind,
    /// Session TTL in seconds.
    pub ttl_secs: u64,
    /// Live sessions.
    pub session_count: usize,
}

/// Expiring battle-session storage over one resolved backend.
#[derive(Debug)]
pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    ttl_secs: u64,
    tombstone_retention: TimeDelta,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionStore {
    /// Resolve a backend from `config` using the system clock.
    ///
    /// # Errors
    /// Returns [`StoreError::Config`] if the config is invalid or no listed
    /// backend could be opened.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Resolve a backend from `config` with an explicit clock.
    ///
    /// # Errors
    /// See [`SessionStore::open`].
    pub fn open_with_clock(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let backend = resolve_backend(config)?;
        Ok(Self::with_backend(backend, config, clock))
    }

    /// Wrap an already-built backend.
    #[must_use]
    pub fn with_backend(backend: Box<dyn SessionBackend>, config: &StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            ttl: config.ttl(),
            ttl_secs: config.ttl_secs,
            tombstone_retention: config.tombstone_retention(),
            locks: DashMap::new(),
        }
    }

    /// The backend chosen at startup.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Persist `battle` under `id` with a fresh expiry of `now + ttl`.
    ///
    /// # Errors
    /// Encoding or backend failure.
    pub fn put(&self, id: &str, battle: &Battle) -> Result<()> {
        let bytes = payload::encode(battle)?;
        let now = self.clock.now();
        self.backend.put(id, &bytes, now, self.expiry_from(now))
    }

    /// Load the battle under `id` and refresh its expiry.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] / [`StoreError::Expired`] for unreadable
    /// ids, decoding or backend failures otherwise.
    pub fn get(&self, id: &str) -> Result<Battle> {
        self.get_session(id).map(|s| s.battle)
    }

    /// Like [`SessionStore::get`] but keeps the timestamps.
    ///
    /// # Errors
    /// See [`SessionStore::get`].
    pub fn get_session(&self, id: &str) -> Result<StoredSession> {
        let now = self.clock.now();
        match self.backend.get(id, now, self.expiry_from(now))? {
            Lookup::Found(record) => Ok(StoredSession {
                id: id.to_string(),
                battle: payload::decode(&record.payload)?,
                created_at: record.created_at,
                updated_at: record.updated_at,
                expires_at: record.expires_at,
            }),
            Lookup::Expired => Err(StoreError::Expired(id.to_string())),
            Lookup::Missing => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Remove a session and any record that it expired.
    ///
    /// # Errors
    /// Backend failure.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let lock = self.lock_for(id);
        let removed = {
            let _guard = lock.lock();
            self.backend.delete(id)
        };
        self.release(id, lock);
        removed
    }

    /// Expire every session past its TTL. Returns how many were expired.
    ///
    /// # Errors
    /// Backend failure.
    pub fn prune(&self) -> Result<usize> {
        let now = self.clock.now();
        let cutoff = now
            .checked_sub_signed(self.tombstone_retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let expired = self.backend.prune(now, cutoff)?;
        if expired > 0 {
            debug!(expired, backend = %self.backend.kind(), "Pruned expired sessions");
        }
        Ok(expired)
    }

    /// Load, mutate and store one battle while holding that id's lock.
    ///
    /// Concurrent `update`s on the same id run one after another; different
    /// ids do not block each other. An `Err` from `f` skips the write.
    ///
    /// # Errors
    /// Any error from loading, from `f`, or from storing.
    pub fn update<T, E, F>(&self, id: &str, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Battle) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let start = Instant::now();
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock();
            self.update_locked(id, f)
        };
        self.release(id, lock);

        debug!(
            battle_id = %id,
            ok = result.is_ok(),
            elapsed_us = start.elapsed().as_micros(),
            "Session updated"
        );
        result
    }

    fn update_locked<T, E, F>(&self, id: &str, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Battle) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut battle = self.get(id)?;
        let value = f(&mut battle)?;
        self.put(id, &battle)?;
        Ok(value)
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id.to_string()).or_default().value())
    }

    fn release(&self, id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks.remove_if(id, |_, l| Arc::strong_count(l) == 1);
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Add one result to `agent_name`'s counters.
    ///
    /// # Errors
    /// Backend failure.
    pub fn record_result(&self, agent_name: &str, won: bool) -> Result<AgentStatRecord> {
        let record = self.backend.record_result(agent_name, won, self.clock.now())?;
        debug!(agent = %agent_name, won, total = record.total_battles, "Recorded result");
        Ok(record)
    }

    /// Counters for `agent_name`; a zero record if none were recorded.
    ///
    /// # Errors
    /// Backend failure.
    pub fn stats(&self, agent_name: &str) -> Result<AgentStatRecord> {
        Ok(self
            .backend
            .stats(agent_name)?
            .unwrap_or_else(|| AgentStatRecord::empty(agent_name)))
    }

    // ------------------------------------------------------------------
    // Introspection & maintenance
    // ------------------------------------------------------------------

    /// Active backend, TTL and live session count.
    ///
    /// # Errors
    /// Backend failure.
    pub fn storage_info(&self) -> Result<StorageInfo> {
        Ok(StorageInfo {
            backend: self.backend.kind(),
            ttl_secs: self.ttl_secs,
            session_count: self.backend.session_count(self.clock.now())?,
        })
    }

    /// Number of per-id locks currently held or awaited.
    #[must_use]
    pub fn pending_locks(&self) -> usize {
        self.locks.len()
    }

    /// Prune every `interval` on a blocking thread until the handle is
    /// aborted. Must be called from within a tokio runtime.
    pub fn spawn_pruner(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let store = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || store.prune()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Background prune failed"),
                    Err(e) => warn!(error = %e, "Background prune task panicked"),
                }
            }
        })
    }
}

/// Walk the priority list and open the first backend that works.
fn resolve_backend(config: &StoreConfig) -> Result<Box<dyn SessionBackend>> {
    for kind in &config.priority {
        match kind {
            BackendKind::Redis => {
                let Some(redis) = &config.redis else {
                    debug!("Redis not configured, skipping");
                    continue;
                };
                match RedisBackend::connect(redis, config.tombstone_retention()) {
                    Ok(backend) => return Ok(selected(Box::new(backend))),
                    Err(e) => warn!(error = %e, "Redis backend unavailable, trying next"),
                }
            }
            BackendKind::Sqlite => {
                let Some(sqlite) = &config.sqlite else {
                    debug!("SQLite not configured, skipping");
                    continue;
                };
                match SqliteBackend::open(sqlite) {
                    Ok(backend) => return Ok(selected(Box::new(backend))),
                    Err(e) => warn!(error = %e, "SQLite backend unavailable, trying next"),
                }
            }
            BackendKind::Memory => return Ok(selected(Box::new(MemoryBackend::new()))),
        }
    }
    Err(StoreError::Config(format!(
        "no storage backend available from {:?}",
        config.priority
    )))
}

fn selected(backend: Box<dyn SessionBackend>) -> Box<dyn SessionBackend> {
    info!(backend = %backend.kind(), "Session backend selected");
    backend
}
