//! Redis backend.
//!
//! Key layout, with the default `battle` prefix:
//!
//! | key                  | type   | contents                                         |
//! |----------------------|--------|--------------------------------------------------|
//! | `battle:{id}`        | hash   | `payload`, `created_at`, `updated_at`, `expires_at` (unix ms) |
//! | `battle-seen:{id}`   | string | expiry marker, outlives the session by the tombstone retention |
//! | `battle-stats:{name}`| hash   | `wins`, `losses`, `total_battles`, `last_battle_at` |
//!
//! Session keys carry a native TTL, so `prune` has nothing to do. A missing
//! session key with a live marker means the session expired.
//!
//! All commands use a single blocking connection with read/write timeouts.
//! A connectivity failure drops the connection and surfaces
//! [`StoreError::Unavailable`]; the next call reconnects.

use std::time::{Duration, Instant};

use ::redis::{Client, Connection, RedisError, RedisResult};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{Lookup, SessionBackend, SessionRecord};
use crate::config::{BackendKind, RedisConfig};
use crate::error::{Result, StoreError};
use crate::stats::AgentStatRecord;

type SessionRow = (Option<Vec<u8>>, Option<i64>, Option<i64>);
type StatsRow = (Option<u64>, Option<u64>, Option<u64>, Option<i64>);

/// Redis-backed session storage.
pub struct RedisBackend {
    client: Client,
    conn: Mutex<Option<Connection>>,
    key_prefix: String,
    connect_timeout: Duration,
    io_timeout: Duration,
    tombstone_retention: TimeDelta,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("key_prefix", &self.key_prefix)
            .field("connected", &self.conn.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connect and verify the server answers `PING`.
    ///
    /// # Errors
    /// Returns [`StoreError::Config`] for a malformed URL and
    /// [`StoreError::Unavailable`] when the server cannot be reached within
    /// `connect_timeout_ms`.
    pub fn connect(config: &RedisConfig, tombstone_retention: TimeDelta) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| StoreError::Config(e.to_string()))?;
        let backend = Self {
            client,
            conn: Mutex::new(None),
            key_prefix: config.key_prefix.clone(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms.max(1)),
            io_timeout: Duration::from_millis(config.io_timeout_ms.max(1)),
            tombstone_retention,
        };
        backend.ping()?;
        info!(prefix = %backend.key_prefix, "Redis session backend connected");
        Ok(backend)
    }

    fn session_key(&self, id: &str) -> String {
        format!("{}:{id}", self.key_prefix)
    }

    fn marker_key(&self, id: &str) -> String {
        format!("{}-seen:{id}", self.key_prefix)
    }

    fn stats_key(&self, agent_name: &str) -> String {
        format!("{}-stats:{agent_name}", self.key_prefix)
    }

    fn open_connection(&self) -> RedisResult<Connection> {
        let conn = self.client.get_connection_with_timeout(self.connect_timeout)?;
        conn.set_read_timeout(Some(self.io_timeout))?;
        conn.set_write_timeout(Some(self.io_timeout))?;
        Ok(conn)
    }

    /// Run `f` on the shared connection, connecting first if needed.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> RedisResult<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            let conn = self
                .open_connection()
                .map_err(|e| StoreError::unavailable(BackendKind::Redis, e))?;
            *guard = Some(conn);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(StoreError::unavailable(BackendKind::Redis, "no connection"));
        };

        match f(conn) {
            Ok(value) => Ok(value),
            Err(e) if is_connectivity(&e) => {
                warn!(error = %e, "Redis connection lost; reconnecting on next call");
                *guard = None;
                Err(StoreError::unavailable(BackendKind::Redis, e))
            }
            Err(e) => Err(StoreError::Redis(e)),
        }
    }
}

fn is_connectivity(e: &RedisError) -> bool {
    e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
}

fn ms_until(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().max(1)
}

fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl SessionBackend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn put(&self, id: &str, payload: &[u8], now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<()> {
        let start = Instant::now();
        let key = self.session_key(id);
        let marker = self.marker_key(id);
        let ttl_ms = ms_until(now, expires_at);
        let marker_ms = ttl_ms.saturating_add(self.tombstone_retention.num_milliseconds());

        self.with_conn(|conn| {
            ::redis::pipe()
                .atomic()
                .cmd("HSETNX").arg(&key).arg("created_at").arg(now.timestamp_millis()).ignore()
                .cmd("HSET")
                .arg(&key)
                .arg("payload").arg(payload)
                .arg("updated_at").arg(now.timestamp_millis())
                .arg("expires_at").arg(expires_at.timestamp_millis())
                .ignore()
                .cmd("PEXPIRE").arg(&key).arg(ttl_ms).ignore()
                .cmd("SET").arg(&marker).arg(1).arg("PX").arg(marker_ms).ignore()
                .query::<()>(conn)
        })?;

        debug!(
            battle_id = %id,
            bytes = payload.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved session"
        );
        Ok(())
    }

    fn get(&self, id: &str, now: DateTime<Utc>, refresh_to: DateTime<Utc>) -> Result<Lookup> {
        let start = Instant::now();
        let key = self.session_key(id);
        let marker = self.marker_key(id);
        let ttl_ms = ms_until(now, refresh_to);
        let marker_ms = ttl_ms.saturating_add(self.tombstone_retention.num_milliseconds());

        let lookup = self.with_conn(|conn| {
            let (payload, created_at, expires_at): SessionRow = ::redis::cmd("HMGET")
                .arg(&key)
                .arg("payload")
                .arg("created_at")
                .arg("expires_at")
                .query(conn)?;

            match (payload, expires_at) {
                (Some(payload), Some(expires_at)) if expires_at > now.timestamp_millis() => {
                    ::redis::pipe()
                        .atomic()
                        .cmd("HSET")
                        .arg(&key)
                        .arg("updated_at").arg(now.timestamp_millis())
                        .arg("expires_at").arg(refresh_to.timestamp_millis())
                        .ignore()
                        .cmd("PEXPIRE").arg(&key).arg(ttl_ms).ignore()
                        .cmd("PEXPIRE").arg(&marker).arg(marker_ms).ignore()
                        .query::<()>(conn)?;
                    Ok(Lookup::Found(SessionRecord {
                        payload,
                        created_at: created_at.map_or(now, from_ms),
                        updated_at: now,
                        expires_at: refresh_to,
                    }))
                }
                (Some(_), _) => {
                    // Server TTL has not fired yet but our clock says it is over.
                    ::redis::cmd("DEL").arg(&key).query::<()>(conn)?;
                    Ok(Lookup::Expired)
                }
                (None, _) => {
                    let seen: bool = ::redis::cmd("EXISTS").arg(&marker).query(conn)?;
                    Ok(if seen { Lookup::Expired } else { Lookup::Missing })
                }
            }
        })?;

        debug!(
            battle_id = %id,
            found = matches!(lookup, Lookup::Found(_)),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded session"
        );
        Ok(lookup)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let key = self.session_key(id);
        let marker = self.marker_key(id);
        let removed: u64 = self.with_conn(|conn| ::redis::cmd("DEL").arg(&key).arg(&marker).query(conn))?;
        Ok(removed > 0)
    }

    fn prune(&self, _now: DateTime<Utc>, _tombstone_cutoff: DateTime<Utc>) -> Result<usize> {
        // Native key expiry handles both sessions and markers.
        Ok(0)
    }

    fn session_count(&self, _now: DateTime<Utc>) -> Result<usize> {
        let pattern = format!("{}:*", self.key_prefix);
        self.with_conn(|conn| {
            let mut cmd = ::redis::cmd("SCAN");
            cmd.cursor_arg(0).arg("MATCH").arg(&pattern).arg("COUNT").arg(500);
            let keys = cmd.iter::<String>(conn)?;
            Ok(keys.count())
        })
    }

    fn record_result(&self, agent_name: &str, won: bool, at: DateTime<Utc>) -> Result<AgentStatRecord> {
        let key = self.stats_key(agent_name);
        let ((wins, losses, total, last),): (StatsRow,) = self.with_conn(|conn| {
            ::redis::pipe()
                .atomic()
                .cmd("HINCRBY").arg(&key).arg("wins").arg(i64::from(won)).ignore()
                .cmd("HINCRBY").arg(&key).arg("losses").arg(i64::from(!won)).ignore()
                .cmd("HINCRBY").arg(&key).arg("total_battles").arg(1).ignore()
                .cmd("HSET").arg(&key).arg("last_battle_at").arg(at.timestamp_millis()).ignore()
                .cmd("HMGET")
                .arg(&key)
                .arg("wins")
                .arg("losses")
                .arg("total_battles")
                .arg("last_battle_at")
                .query(conn)
        })?;

        Ok(AgentStatRecord {
            agent_name: agent_name.to_string(),
            wins: wins.unwrap_or(0),
            losses: losses.unwrap_or(0),
            total_battles: total.unwrap_or(0),
            last_battle_at: last.map(from_ms),
        })
    }

    fn stats(&self, agent_name: &str) -> Result<Option<AgentStatRecord>> {
        let key = self.stats_key(agent_name);
        let (wins, losses, total, last): StatsRow = self.with_conn(|conn| {
            ::redis::cmd("HMGET")
                .arg(&key)
                .arg("wins")
                .arg("losses")
                .arg("total_battles")
                .arg("last_battle_at")
                .query(conn)
        })?;

        Ok(total.map(|total_battles| AgentStatRecord {
            agent_name: agent_name.to_string(),
            wins: wins.unwrap_or(0),
            losses: losses.unwrap_or(0),
            total_battles,
            last_battle_at: last.map(from_ms),
        }))
    }

    fn ping(&self) -> Result<()> {
        let pong: String = self.with_conn(|conn| ::redis::cmd("PING").query(conn))?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::unavailable(BackendKind::Redis, format!("unexpected PING reply {pong}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_url_is_config_error() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            ..RedisConfig::default()
        };
        let err = RedisBackend::connect(&config, TimeDelta::seconds(60)).expect_err("bad url");
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn unreachable_server_is_unavailable() {
        // Port 1 on localhost refuses connections.
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            connect_timeout_ms: 100,
            ..RedisConfig::default()
        };
        let err = RedisBackend::connect(&config, TimeDelta::seconds(60)).expect_err("no server");
        assert!(err.is_transient(), "{err}");
    }

    #[test]
    fn ttl_never_rounds_to_zero() {
        let now = Utc::now();
        assert_eq!(ms_until(now, now), 1);
        assert_eq!(ms_until(now, now + TimeDelta::seconds(2)), 2000);
    }
}
