//! Store configuration.
//!
//! Backend selection is explicit: `priority` lists the backend kinds to try
//! at startup, and each of `redis` / `sqlite` must be configured for that
//! kind to be eligible. Memory needs no configuration and is normally last.

use std::fmt;
use std::path::PathBuf;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Upper bound for TTL and retention windows (100 years).
const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 3600;

/// Recognized storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// External redis cache. TTL is native.
    Redis,
    /// Embedded SQLite database. TTL via an expiry column.
    Sqlite,
    /// Process memory. Lost on restart.
    Memory,
}

impl BackendKind {
    /// Lower-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Session time-to-live in seconds, refreshed on every read and write.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// How long an expired id keeps answering `Expired` instead of
    /// `NotFound`.
    #[serde(default = "default_retention")]
    pub tombstone_retention_secs: u64,
    /// Backends to try at startup, most preferred first.
    #[serde(default = "default_priority")]
    pub priority: Vec<BackendKind>,
    /// Redis connection, if redis is eligible.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// SQLite database, if SQLite is eligible.
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            tombstone_retention_secs: default_retention(),
            priority: default_priority(),
            redis: None,
            sqlite: None,
        }
    }
}

impl StoreConfig {
    /// Load from a TOML string.
    ///
    /// # Errors
    /// Returns `StoreError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// In-memory only, with the given TTL. Handy for tests and tools.
    #[must_use]
    pub fn memory(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            priority: vec![BackendKind::Memory],
            ..Self::default()
        }
    }

    /// SQLite at `path`, with the given TTL.
    #[must_use]
    pub fn sqlite(path: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            priority: vec![BackendKind::Sqlite],
            sqlite: Some(SqliteConfig {
                path: path.into(),
                ..SqliteConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Reject settings that can never produce a working store.
    ///
    /// # Errors
    /// Returns `StoreError::Config` for a zero TTL or an empty priority list.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.ttl_secs == 0 {
            return Err(StoreError::Config("ttl_secs must be at least 1".into()));
        }
        if self.priority.is_empty() {
            return Err(StoreError::Config("priority must list at least one backend".into()));
        }
        Ok(())
    }

    /// TTL as a time delta.
    #[must_use]
    pub fn ttl(&self) -> TimeDelta {
        window(self.ttl_secs)
    }

    /// Tombstone retention as a time delta.
    #[must_use]
    pub fn tombstone_retention(&self) -> TimeDelta {
        window(self.tombstone_retention_secs)
    }
}

fn window(secs: u64) -> TimeDelta {
    let secs = i64::try_from(secs.min(MAX_WINDOW_SECS)).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX)
}

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL (`redis://host:port/db`).
    pub url: String,
    /// Prefix for every key this store writes.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_redis_timeout")]
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds.
    #[serde(default = "default_redis_timeout")]
    pub io_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: default_key_prefix(),
            connect_timeout_ms: default_redis_timeout(),
            io_timeout_ms: default_redis_timeout(),
        }
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How long a writer waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_ttl() -> u64 { 3600 }
fn default_retention() -> u64 { 86_400 }
fn default_priority() -> Vec<BackendKind> { vec![BackendKind::Redis, BackendKind::Sqlite, BackendKind::Memory] }
fn default_key_prefix() -> String { "battle".to_string() }
fn default_redis_timeout() -> u64 { 500 }
fn default_db_path() -> PathBuf { PathBuf::from("battles.db") }
fn default_true() -> bool { true }
fn default_busy_timeout() -> u64 { 5000 }
