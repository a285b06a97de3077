use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::db::BeginMode;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Store and pool settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file, or ":memory:"
    pub path: String,
    pub max_connections: u32,
    pub connection_timeout_ms: u64,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    /// Ignored for in-memory stores
    pub journal_mode: String,
    pub transaction_behavior: BeginMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "rowtrip.db".to_string(),
            max_connections: 8,
            connection_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            foreign_keys: true,
            journal_mode: "wal".to_string(),
            transaction_behavior: BeginMode::Deferred,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber` filter directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// `<config dir>/rowtrip/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rowtrip").join("config.toml"))
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be at least 1".to_string()));
        }
        Ok(self)
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = rowtrip::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()
}
