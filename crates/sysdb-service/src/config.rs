//! Configuration management for the SysDB coordinator.
//!
//! Supports multiple configuration sources with precedence:
//! 1. Environment variables (highest priority)
//! 2. TOML configuration file
//! 3. Default values (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use sysdb_metadata::PoolOptions;

/// Main configuration structure for the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Request handling configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Metadata store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Soft-delete retention and sweep cadence
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Request handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Deadline applied to every coordinator operation in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Metadata store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database URL (default: "sqlite://sysdb.db")
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Max connections in pool (default: 8)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds (default: 5)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

/// Retention of soft-deleted databases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How long a soft-deleted database is kept before finalisation (default: 1 day)
    #[serde(default = "default_database_grace")]
    pub database_grace_seconds: u64,

    /// Interval between deletion sweeps (default: 300)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty (default: "pretty")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_db_path() -> String {
    "sqlite://sysdb.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_database_grace() -> u64 {
    86_400
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            connection_timeout_seconds: default_connection_timeout(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            database_grace_seconds: default_database_grace(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl DatabaseConfig {
    /// Pool sizing derived from this configuration.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.connection_timeout_seconds),
            ..PoolOptions::default()
        }
    }
}

impl RetentionConfig {
    pub fn database_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.database_grace_seconds).unwrap_or(i64::MAX))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file doesn't exist or has invalid TOML syntax.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError { path, source: e })
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Loads `sysdb.toml` if it exists, otherwise uses defaults.
    ///
    /// Supported environment variables:
    /// - `SYSDB_DB_PATH` - Database URL
    /// - `SYSDB_DB_MAX_CONNECTIONS` - Pool size
    /// - `SYSDB_REQUEST_TIMEOUT_SECONDS` - Per-operation deadline
    /// - `SYSDB_DATABASE_GRACE_SECONDS` - Soft-delete retention
    /// - `SYSDB_SWEEP_INTERVAL_SECONDS` - Sweep cadence
    /// - `SYSDB_LOG_LEVEL` / `SYSDB_LOG_FORMAT` - Logging
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if std::path::Path::new("sysdb.toml").exists() {
            Self::from_file("sysdb.toml")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SYSDB_DB_PATH") {
            self.database.path = path;
        }

        if let Some(value) = env_parse("SYSDB_DB_MAX_CONNECTIONS") {
            self.database.max_connections = value;
        }

        if let Some(value) = env_parse("SYSDB_REQUEST_TIMEOUT_SECONDS") {
            self.server.request_timeout_seconds = value;
        }

        if let Some(value) = env_parse("SYSDB_DATABASE_GRACE_SECONDS") {
            self.retention.database_grace_seconds = value;
        }

        if let Some(value) = env_parse("SYSDB_SWEEP_INTERVAL_SECONDS") {
            self.retention.sweep_interval_seconds = value;
        }

        if let Ok(level) = std::env::var("SYSDB_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("SYSDB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "database.path cannot be empty".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be > 0".to_string(),
            ));
        }

        if self.database.connection_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "database.connection_timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "server.request_timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.retention.sweep_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "retention.sweep_interval_seconds must be > 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of: {}",
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file
    #[error("Failed to read config file {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Failed to parse TOML in {path:?}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
