//! # Arena Service
//!
//! The boundary a transport layer talks to. [`BattleService`] creates
//! battles from catalog archetypes, resolves submitted rounds against the
//! session store, answers summary, advice and stats queries, and reports
//! which storage backend is in use.
//!
//! Configuration is one [`ArenaConfig`] (TOML plus `ARENA__*` environment
//! overrides); [`telemetry::init_tracing`] installs logging from it.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod service;
pub mod telemetry;

pub use config::{ArenaConfig, LoggingConfig};
pub use error::{Result, ServiceError};
pub use service::{AgentStats, BattleService, CreatedBattle};
