//! In-process backend.
//!
//! All state sits behind one `parking_lot::Mutex`, so every operation is
//! atomic with respect to every other. Nothing survives a restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::{Lookup, SessionBackend, SessionRecord};
use crate::config::BackendKind;
use crate::error::Result;
use crate::stats::AgentStatRecord;

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<String, SessionRecord>,
    /// id -> when it expired
    tombstones: HashMap<String, DateTime<Utc>>,
    stats: HashMap<String, AgentStatRecord>,
}

impl MemoryState {
    fn expire(&mut self, id: &str) {
        if let Some(record) = self.sessions.remove(id) {
            self.tombstones.insert(id.to_string(), record.expires_at);
        }
    }
}

/// Process-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tombstones currently held.
    #[must_use]
    pub fn tombstone_count(&self) -> usize {
        self.state.lock().tombstones.len()
    }
}

impl SessionBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn put(&self, id: &str, payload: &[u8], now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock();
        state.tombstones.remove(id);
        let created_at = state
            .sessions
            .get(id)
            .filter(|r| r.expires_at > now)
            .map_or(now, |r| r.created_at);
        state.sessions.insert(
            id.to_string(),
            SessionRecord {
                payload: payload.to_vec(),
                created_at,
                updated_at: now,
                expires_at,
            },
        );
        Ok(())
    }

    fn get(&self, id: &str, now: DateTime<Utc>, refresh_to: DateTime<Utc>) -> Result<Lookup> {
        let mut state = self.state.lock();

        let expired = match state.sessions.get_mut(id) {
            Some(record) if record.expires_at > now => {
                record.updated_at = now;
                record.expires_at = refresh_to;
                return Ok(Lookup::Found(record.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.expire(id);
            debug!(battle_id = %id, "Session expired on read");
            return Ok(Lookup::Expired);
        }

        if state.tombstones.contains_key(id) {
            Ok(Lookup::Expired)
        } else {
            Ok(Lookup::Missing)
        }
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock();
        let had_session = state.sessions.remove(id).is_some();
        let had_tombstone = state.tombstones.remove(id).is_some();
        Ok(had_session || had_tombstone)
    }

    fn prune(&self, now: DateTime<Utc>, tombstone_cutoff: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, r)| r.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            state.expire(id);
        }
        state.tombstones.retain(|_, at| *at >= tombstone_cutoff);
        Ok(expired.len())
    }

    fn session_count(&self, now: DateTime<Utc>) -> Result<usize> {
        let state = self.state.lock();
        Ok(state.sessions.values().filter(|r| r.expires_at > now).count())
    }

    fn record_result(&self, agent_name: &str, won: bool, at: DateTime<Utc>) -> Result<AgentStatRecord> {
        let mut state = self.state.lock();
        let record = state
            .stats
            .entry(agent_name.to_string())
            .or_insert_with(|| AgentStatRecord::empty(agent_name));
        record.record(won, at);
        Ok(record.clone())
    }

    fn stats(&self, agent_name: &str) -> Result<Option<AgentStatRecord>> {
        Ok(self.state.lock().stats.get(agent_name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    #[test]
    fn put_get_refreshes_expiry() {
        let backend = MemoryBackend::new();
        let t0 = Utc::now();
        backend.put("a", b"payload", t0, t0 + secs(10)).expect("put");

        let Lookup::Found(record) = backend.get("a", t0 + secs(5), t0 + secs(15)).expect("get") else {
            panic!("expected a live session");
        };
        assert_eq!(record.payload, b"payload");
        assert_eq!(record.created_at, t0);
        assert_eq!(record.expires_at, t0 + secs(15));

        // Still alive past the first expiry because of the refresh.
        assert!(matches!(
            backend.get("a", t0 + secs(12), t0 + secs(22)).expect("get"),
            Lookup::Found(_)
        ));
    }

    #[test]
    fn expiry_leaves_tombstone_until_cutoff() {
        let backend = MemoryBackend::new();
        let t0 = Utc::now();
        backend.put("a", b"x", t0, t0 + secs(1)).expect("put");

        assert_eq!(backend.get("a", t0 + secs(2), t0 + secs(3)).expect("get"), Lookup::Expired);
        assert_eq!(backend.get("a", t0 + secs(3), t0 + secs(4)).expect("get"), Lookup::Expired);
        assert_eq!(backend.tombstone_count(), 1);

        backend.prune(t0 + secs(100), t0 + secs(50)).expect("prune");
        assert_eq!(backend.get("a", t0 + secs(100), t0 + secs(101)).expect("get"), Lookup::Missing);
    }

    #[test]
    fn prune_expires_without_reads() {
        let backend = MemoryBackend::new();
        let t0 = Utc::now();
        backend.put("a", b"x", t0, t0 + secs(1)).expect("put");
        backend.put("b", b"y", t0, t0 + secs(60)).expect("put");

        assert_eq!(backend.prune(t0 + secs(5), t0).expect("prune"), 1);
        assert_eq!(backend.session_count(t0 + secs(5)).expect("count"), 1);
        assert_eq!(backend.get("a", t0 + secs(5), t0 + secs(6)).expect("get"), Lookup::Expired);
    }

    #[test]
    fn put_revives_and_delete_forgets() {
        let backend = MemoryBackend::new();
        let t0 = Utc::now();
        backend.put("a", b"x", t0, t0 + secs(1)).expect("put");
        backend.prune(t0 + secs(2), t0).expect("prune");
        backend.put("a", b"y", t0 + secs(2), t0 + secs(10)).expect("put");
        assert!(matches!(backend.get("a", t0 + secs(3), t0 + secs(13)).expect("get"), Lookup::Found(_)));

        assert!(backend.delete("a").expect("delete"));
        assert_eq!(backend.get("a", t0 + secs(3), t0 + secs(13)).expect("get"), Lookup::Missing);
        assert!(!backend.delete("a").expect("delete"));
    }

    #[test]
    fn stats_accumulate() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        assert!(backend.stats("ada").expect("stats").is_none());
        backend.record_result("ada", true, now).expect("record");
        let r = backend.record_result("ada", false, now).expect("record");
        assert_eq!((r.wins, r.losses, r.total_battles), (1, 1, 2));
        assert_eq!(backend.stats("ada").expect("stats"), Some(r));
    }
}
