//! Storage backends.
//!
//! A backend stores opaque payload bytes plus timestamps under a battle id,
//! answers lookups as found / expired / missing, and keeps the per-agent
//! stat counters. It never decodes payloads; that happens in
//! [`crate::SessionStore`].
//!
//! Expiry: a session is expired once `now >= expires_at`. Expiring a
//! session (on lookup or prune) leaves a tombstone recording when it
//! expired, so later lookups keep answering [`Lookup::Expired`] until the
//! tombstone itself is pruned. Writing the id again clears its tombstone.

pub mod memory;
pub mod redis;
pub mod sqlite;

use std::fmt::Debug;

use chrono::{DateTime, Utc};

use crate::config::BackendKind;
use crate::error::Result;
use crate::stats::AgentStatRecord;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;
pub use self::sqlite::SqliteBackend;

/// A stored payload and its timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Encoded battle.
    pub payload: Vec<u8>,
    /// First write.
    pub created_at: DateTime<Utc>,
    /// Last write or read.
    pub updated_at: DateTime<Utc>,
    /// When the session stops being readable.
    pub expires_at: DateTime<Utc>,
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Live session. Its expiry has already been refreshed.
    Found(SessionRecord),
    /// The session existed but has expired.
    Expired,
    /// Nothing is known about the id.
    Missing,
}

/// Uniform storage interface implemented by every backend.
///
/// Implementations must be safe to call from many threads at once; each
/// method is atomic per id.
pub trait SessionBackend: Send + Sync + Debug {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Upsert a session. `created_at` is kept from an existing live row.
    ///
    /// # Errors
    /// Backend failure.
    fn put(&self, id: &str, payload: &[u8], now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<()>;

    /// Look up a session, expiring it if `now >= expires_at`, otherwise
    /// moving its expiry to `refresh_to`.
    ///
    /// # Errors
    /// Backend failure.
    fn get(&self, id: &str, now: DateTime<Utc>, refresh_to: DateTime<Utc>) -> Result<Lookup>;

    /// Remove a session and its tombstone. Returns whether anything was
    /// removed.
    ///
    /// # Errors
    /// Backend failure.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Expire every session with `expires_at <= now` and drop tombstones
    /// older than `tombstone_cutoff`. Returns the number of sessions
    /// expired.
    ///
    /// # Errors
    /// Backend failure.
    fn prune(&self, now: DateTime<Utc>, tombstone_cutoff: DateTime<Utc>) -> Result<usize>;

    /// Live (unexpired) session count.
    ///
    /// # Errors
    /// Backend failure.
    fn session_count(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Add one result to `agent_name`'s counters and return the new totals.
    ///
    /// # Errors
    /// Backend failure.
    fn record_result(&self, agent_name: &str, won: bool, at: DateTime<Utc>) -> Result<AgentStatRecord>;

    /// Counters for `agent_name`, if any result was ever recorded.
    ///
    /// # Errors
    /// Backend failure.
    fn stats(&self, agent_name: &str) -> Result<Option<AgentStatRecord>>;

    /// Check the backend is reachable.
    ///
    /// # Errors
    /// Backend failure.
    fn ping(&self) -> Result<()> {
        Ok(())
    }
}
