//! # Arena Store
//!
//! Expiring persistence for battle sessions plus cross-battle win/loss
//! counters.
//!
//! One backend is chosen at startup from an explicit priority list:
//!
//! - **redis**: native key TTL, shared across processes
//! - **sqlite**: expiry column plus explicit pruning, survives restarts
//! - **memory**: process lifetime only
//!
//! Battles are stored as a versioned JSON envelope (see [`payload`]), so
//! every backend holds the same bytes for the same battle.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod payload;
pub mod stats;
pub mod store;

pub use backend::{Lookup, SessionBackend, SessionRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BackendKind, RedisConfig, SqliteConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use stats::AgentStatRecord;
pub use store::{SessionStore, StorageInfo, StoredSession};
