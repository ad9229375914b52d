//! SQLite backend.
//!
//! Sessions, tombstones and stat counters live in one database file. TTL is
//! emulated with an indexed `expires_at` column and explicit pruning:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS battles (
//!     battle_id  TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     created_at INTEGER NOT NULL,   -- unix ms
//!     updated_at INTEGER NOT NULL,
//!     expires_at INTEGER NOT NULL
//! );
//! ```
//!
//! The connection is guarded by a mutex and every multi-statement operation
//! runs in a transaction, so operations on one id are atomic.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Transaction, params};
use tracing::{debug, info, warn};

use super::{Lookup, SessionBackend, SessionRecord};
use crate::config::{BackendKind, SqliteConfig};
use crate::error::Result;
use crate::stats::AgentStatRecord;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS battles (
        battle_id  TEXT PRIMARY KEY,
        data       BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_battles_expires_at ON battles(expires_at);
    CREATE TABLE IF NOT EXISTS expired_battles (
        battle_id  TEXT PRIMARY KEY,
        expired_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS agent_stats (
        agent_name     TEXT PRIMARY KEY,
        wins           INTEGER NOT NULL DEFAULT 0,
        losses         INTEGER NOT NULL DEFAULT 0,
        total_battles  INTEGER NOT NULL DEFAULT 0,
        last_battle_at INTEGER
    );
";

/// SQLite-backed session storage.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open (or create) the database described by `config`.
    ///
    /// # Errors
    /// Returns [`crate::StoreError::Database`] on SQLite failures.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let db_path = config.path.clone();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "SQLite session backend opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns [`crate::StoreError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run an integrity check on the database.
    ///
    /// # Errors
    /// Returns [`crate::StoreError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn tombstoned(tx: &Transaction<'_>, id: &str) -> rusqlite::Result<bool> {
    tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM expired_battles WHERE battle_id = ?1)",
        params![id],
        |row| row.get(0),
    )
}

impl SessionBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn put(&self, id: &str, payload: &[u8], now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<()> {
        let start = Instant::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM expired_battles WHERE battle_id = ?1", params![id])?;
        // An expired row that was never pruned does not keep its created_at.
        tx.execute(
            "INSERT INTO battles (battle_id, data, created_at, updated_at, expires_at)
             VALUES (?1, ?2, ?3, ?3, ?4)
             ON CONFLICT(battle_id) DO UPDATE SET
                data = excluded.data,
                created_at = CASE WHEN battles.expires_at > excluded.updated_at
                                  THEN battles.created_at ELSE excluded.created_at END,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at",
            params![id, payload, to_ms(now), to_ms(expires_at)],
        )?;
        tx.commit()?;

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
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let row: Option<(Vec<u8>, i64, i64)> = tx
            .query_row(
                "SELECT data, created_at, expires_at FROM battles WHERE battle_id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let lookup = match row {
            Some((payload, created_at, expires_at)) if expires_at > to_ms(now) => {
                tx.execute(
                    "UPDATE battles SET updated_at = ?2, expires_at = ?3 WHERE battle_id = ?1",
                    params![id, to_ms(now), to_ms(refresh_to)],
                )?;
                Lookup::Found(SessionRecord {
                    payload,
                    created_at: from_ms(created_at),
                    updated_at: now,
                    expires_at: refresh_to,
                })
            }
            Some((_, _, expires_at)) => {
                tx.execute("DELETE FROM battles WHERE battle_id = ?1", params![id])?;
                tx.execute(
                    "INSERT OR REPLACE INTO expired_battles (battle_id, expired_at) VALUES (?1, ?2)",
                    params![id, expires_at],
                )?;
                Lookup::Expired
            }
            None if tombstoned(&tx, id)? => Lookup::Expired,
            None => Lookup::Missing,
        };
        tx.commit()?;

        debug!(
            battle_id = %id,
            found = matches!(lookup, Lookup::Found(_)),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded session"
        );
        Ok(lookup)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let sessions = tx.execute("DELETE FROM battles WHERE battle_id = ?1", params![id])?;
        let tombstones = tx.execute("DELETE FROM expired_battles WHERE battle_id = ?1", params![id])?;
        tx.commit()?;
        Ok(sessions + tombstones > 0)
    }

    fn prune(&self, now: DateTime<Utc>, tombstone_cutoff: DateTime<Utc>) -> Result<usize> {
        let start = Instant::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO expired_battles (battle_id, expired_at)
             SELECT battle_id, expires_at FROM battles WHERE expires_at <= ?1",
            params![to_ms(now)],
        )?;
        let expired = tx.execute("DELETE FROM battles WHERE expires_at <= ?1", params![to_ms(now)])?;
        let forgotten = tx.execute(
            "DELETE FROM expired_battles WHERE expired_at < ?1",
            params![to_ms(tombstone_cutoff)],
        )?;
        tx.commit()?;

        if expired > 0 || forgotten > 0 {
            debug!(
                expired,
                forgotten,
                elapsed_us = start.elapsed().as_micros(),
                "Pruned sessions"
            );
        }
        Ok(expired)
    }

    fn session_count(&self, now: DateTime<Utc>) -> Result<usize> {
        let n: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM battles WHERE expires_at > ?1",
            params![to_ms(now)],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    fn record_result(&self, agent_name: &str, won: bool, at: DateTime<Utc>) -> Result<AgentStatRecord> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO agent_stats (agent_name, wins, losses, total_battles, last_battle_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(agent_name) DO UPDATE SET
                wins = wins + excluded.wins,
                losses = losses + excluded.losses,
                total_battles = total_battles + 1,
                last_battle_at = excluded.last_battle_at",
            params![agent_name, i64::from(won), i64::from(!won), to_ms(at)],
        )?;
        let record = read_stats(&tx, agent_name)?;
        tx.commit()?;

        record.ok_or_else(|| {
            warn!(agent = %agent_name, "Stat row missing right after upsert");
            crate::StoreError::Database(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    fn stats(&self, agent_name: &str) -> Result<Option<AgentStatRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let record = read_stats(&tx, agent_name)?;
        tx.commit()?;
        Ok(record)
    }

    fn ping(&self) -> Result<()> {
        self.conn.lock().execute_batch("SELECT 1;")?;
        Ok(())
    }
}

fn read_stats(tx: &Transaction<'_>, agent_name: &str) -> rusqlite::Result<Option<AgentStatRecord>> {
    tx.query_row(
        "SELECT agent_name, wins, losses, total_battles, last_battle_at
         FROM agent_stats WHERE agent_name = ?1",
        params![agent_name],
        |row| {
            Ok(AgentStatRecord {
                agent_name: row.get(0)?,
                wins: count(row.get(1)?),
                losses: count(row.get(2)?),
                total_battles: count(row.get(3)?),
                last_battle_at: row.get::<_, Option<i64>>(4)?.map(from_ms),
            })
        },
    )
    .optional()
}

/// Extension trait that adds an `.optional()` combinator to `rusqlite::Result`.
///
/// Converts `Err(QueryReturnedNoRows)` into `Ok(None)`.
trait OptionalExt<T> {
    /// Convert `QueryReturnedNoRows` into `Ok(None)`.
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
