//! Service configuration.
//!
//! One TOML document with three tables:
//!
//! ```toml
//! [logging]
//! level = "info"
//! json = false
//!
//! [engine]
//! stamina_regen_per_round = 5
//!
//! [store]
//! ttl_secs = 3600
//! priority = ["redis", "sqlite", "memory"]
//!
//! [store.sqlite]
//! path = "data/battles.db"
//! ```
//!
//! [`ArenaConfig::load`] layers `ARENA__`-prefixed environment variables on
//! top of the file, with `__` separating nesting levels
//! (`ARENA__STORE__REDIS__URL`, `ARENA__STORE__PRIORITY=sqlite,memory`).

use std::collections::HashMap;
use std::path::Path;

use arena_core::EngineConfig;
use arena_store::StoreConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

const ENV_PREFIX: &str = "ARENA";

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Round resolution tuning.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Session storage.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl ArenaConfig {
    /// Parse a TOML document. Environment variables are not consulted.
    ///
    /// # Errors
    /// Returns [`ServiceError::Config`] for malformed TOML or an invalid
    /// store section.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional TOML file, then apply `ARENA__*` environment
    /// overrides from the process environment.
    ///
    /// A `path` that does not exist is skipped.
    ///
    /// # Errors
    /// Returns [`ServiceError::Config`] if a source cannot be parsed or the
    /// merged result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`ArenaConfig::load`] but reads overrides from `env` instead of
    /// the process environment when given.
    ///
    /// # Errors
    /// See [`ArenaConfig::load`].
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("store.priority")
                .source(env),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns [`ServiceError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        self.store
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_store::BackendKind;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = ArenaConfig::from_toml("").expect("parse");
        assert_eq!(config, ArenaConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.store.ttl_secs, 3600);
    }

    #[test]
    fn nested_tables_parse() {
        let config = ArenaConfig::from_toml(
            r#"
            [logging]
            json = true

            [engine]
            stamina_regen_per_round = 8

            [store]
            ttl_secs = 120
            priority = ["sqlite", "memory"]

            [store.sqlite]
            path = "/tmp/arena.db"
            "#,
        )
        .expect("parse");
        assert!(config.logging.json);
        assert_eq!(config.engine.stamina_regen_per_round, 8);
        assert_eq!(config.store.priority, vec![BackendKind::Sqlite, BackendKind::Memory]);
        assert!(config.store.sqlite.is_some());
    }

    #[test]
    fn zero_ttl_rejected() {
        let err = ArenaConfig::from_toml("[store]\nttl_secs = 0").expect_err("invalid");
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ArenaConfig::load_with_env(Some(dir.path().join("absent.toml").as_path()), Some(HashMap::new()))
            .expect("load");
        assert_eq!(config, ArenaConfig::default());
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("arena.toml");
        std::fs::write(&path, "[store]\nttl_secs = 120\n\n[logging]\nlevel = \"debug\"\n").expect("write");

        let env = HashMap::from([
            ("ARENA__STORE__TTL_SECS".to_string(), "30".to_string()),
            ("ARENA__STORE__PRIORITY".to_string(), "memory".to_string()),
        ]);
        let config = ArenaConfig::load_with_env(Some(path.as_path()), Some(env)).expect("load");
        assert_eq!(config.store.ttl_secs, 30);
        assert_eq!(config.store.priority, vec![BackendKind::Memory]);
        assert_eq!(config.logging.level, "debug");
    }
}
