//! Application settings for the Hydrogen daemon, loaded the way
//! `syncstorage-settings`/`syncserver-settings` layer a config file under
//! environment-variable overrides.

use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "HYDROGEN";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Per-database worker topology knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub max_child_queues: u32,
    pub heartbeat_interval_seconds: u64,
    pub prepared_statement_cache_size: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            max_child_queues: 4,
            heartbeat_interval_seconds: 30,
            prepared_statement_cache_size: 1000,
        }
    }
}

/// One entry of `AppConfig::databases`.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    pub name: String,
    pub engine: String,
    pub connection_string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub workers: WorkerSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auto_migration: bool,
    pub host: String,
    pub port: u16,
    pub human_logs: bool,
    pub statsd_label: String,
    pub statsd_host: Option<String>,
    pub statsd_port: u16,
    pub databases: Vec<DatabaseSettings>,
    /// Cool-down before an idle child queue becomes a retirement candidate.
    pub child_retirement_cooldown_seconds: u64,
    /// Bound on migration-loop iterations per `run_migration` call; must be
    /// at least 1.
    pub migration_max_cycles: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            auto_migration: true,
            host: "127.0.0.1".to_owned(),
            port: 8080,
            human_logs: true,
            statsd_label: "hydrogen".to_owned(),
            statsd_host: None,
            statsd_port: 8125,
            databases: Vec::new(),
            child_retirement_cooldown_seconds: 120,
            migration_max_cycles: 64,
        }
    }
}

impl AppConfig {
    pub fn with_env_and_config_file(filename: Option<&str>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(filename) = filename {
            builder = builder.add_source(File::with_name(filename).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        let config = builder.build()?;
        let settings: AppConfig = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects configuration the gate should never be allowed to launch
    /// with: an unrecognized engine name, or a database that can't spawn
    /// at least the one child its own class might need.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut seen = HashMap::new();
        for db in &self.databases {
            if seen.insert(db.name.clone(), ()).is_some() {
                return Err(SettingsError::Invalid(format!(
                    "duplicate database name: {}",
                    db.name
                )));
            }
            match db.engine.as_str() {
                "postgresql" | "mysql" | "sqlite" | "db2" | "ai" => {}
                other => {
                    return Err(SettingsError::Invalid(format!(
                        "unrecognized engine kind for database {}: {}",
                        db.name, other
                    )))
                }
            }
            if db.workers.max_child_queues == 0 {
                return Err(SettingsError::Invalid(format!(
                    "database {} must allow at least one child queue",
                    db.name
                )));
            }
            if db.workers.prepared_statement_cache_size == 0 {
                return Err(SettingsError::Invalid(format!(
                    "database {} must allow a non-empty prepared statement cache",
                    db.name
                )));
            }
        }
        Ok(())
    }

    pub fn banner(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_unknown_engine() {
        let mut cfg = AppConfig::default();
        cfg.databases.push(DatabaseSettings {
            name: "primary".to_owned(),
            engine: "oracle".to_owned(),
            connection_string: None,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            workers: WorkerSettings::default(),
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_database_names() {
        let mut cfg = AppConfig::default();
        for _ in 0..2 {
            cfg.databases.push(DatabaseSettings {
                name: "primary".to_owned(),
                engine: "sqlite".to_owned(),
                connection_string: None,
                host: None,
                port: None,
                database: None,
                username: None,
                password: None,
                workers: WorkerSettings::default(),
            });
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_child_queues() {
        let mut cfg = AppConfig::default();
        cfg.databases.push(DatabaseSettings {
            name: "primary".to_owned(),
            engine: "sqlite".to_owned(),
            connection_string: None,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            workers: WorkerSettings {
                max_child_queues: 0,
                ..WorkerSettings::default()
            },
        });
        assert!(cfg.validate().is_err());
    }
}
