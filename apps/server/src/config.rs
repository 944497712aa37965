//! # Server Configuration
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`TALLY_*`)
//! 2. Config file (`tally.toml`)
//! 3. Defaults (this file)
//!
//! The config file path comes from `--config <PATH>`, then `TALLY_CONFIG`,
//! then the platform config directory:
//! - **macOS**: `~/Library/Application Support/com.tally.server/tally.toml`
//! - **Linux**: `~/.config/tally-server/tally.toml`
//! - **Windows**: `%APPDATA%\tally\server\config\tally.toml`
//!
//! A missing file is not an error; defaults apply.
//!
//! ## Example `tally.toml`
//! ```toml
//! host = "0.0.0.0"
//! port = 8080
//! database_path = "/var/lib/tally/tally.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//! transaction_timeout_ms = 10000
//! low_stock_threshold = 5
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_db::DbConfig;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u64,

    /// Upper bound for one create/cancel unit of work
    pub transaction_timeout_ms: u64,

    /// Threshold for `GET /api/items/low-stock` when the request gives
    /// none. Unset means each item's own `min_stock_level`.
    pub low_stock_threshold: Option<i64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: default_database_path(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            transaction_timeout_ms: 10_000,
            low_stock_threshold: None,
        }
    }
}

impl ServerConfig {
    /// Loads defaults, then the config file, then environment overrides.
    pub fn load(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = cli_path
            .or_else(|| std::env::var("TALLY_CONFIG").ok().map(PathBuf::from))
            .or_else(|| project_dirs().map(|dirs| dirs.config_dir().join("tally.toml")));

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => ServerConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file. Keys not present keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `TALLY_*` overrides. `lookup` is `std::env::var` outside tests.
    ///
    /// ## Environment Variables
    /// - `TALLY_HOST`, `TALLY_PORT`
    /// - `TALLY_DB_PATH`
    /// - `TALLY_MAX_CONNECTIONS`
    /// - `TALLY_BUSY_TIMEOUT_MS`, `TALLY_TRANSACTION_TIMEOUT_MS`
    /// - `TALLY_LOW_STOCK_THRESHOLD`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TALLY_HOST") {
            self.host = host;
        }
        if let Some(path) = lookup("TALLY_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(v) = lookup("TALLY_PORT") {
            self.port = parse_var("TALLY_PORT", &v)?;
        }
        if let Some(v) = lookup("TALLY_MAX_CONNECTIONS") {
            self.max_connections = parse_var("TALLY_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("TALLY_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = parse_var("TALLY_BUSY_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("TALLY_TRANSACTION_TIMEOUT_MS") {
            self.transaction_timeout_ms = parse_var("TALLY_TRANSACTION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("TALLY_LOW_STOCK_THRESHOLD") {
            self.low_stock_threshold = Some(parse_var("TALLY_LOW_STOCK_THRESHOLD", &v)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections must be at least 1".to_string()));
        }
        if self.transaction_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "transaction_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.low_stock_threshold.is_some_and(|t| t < 0) {
            return Err(ConfigError::InvalidValue(
                "low_stock_threshold must not be negative".to_string(),
            ));
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("invalid bind address {}:{}", self.host, self.port)))
    }

    /// Pool settings for [`tally_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .transaction_timeout(Duration::from_millis(self.transaction_timeout_ms))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tally", "server")
}

/// `tally.db` in the platform data directory, or the working directory.
fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("tally.db"))
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{key}={value}")))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid config file: {0}")]
    Parse(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8080);
        assert_eq!(config.low_stock_threshold, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml("port = 9000\ndatabase_path = \"/tmp/t.db\"").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_bad_toml_is_rejected() {
        assert!(matches!(
            ServerConfig::from_toml("port = \"eighty\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TALLY_PORT", "7000"),
            ("TALLY_DB_PATH", "/data/tally.db"),
            ("TALLY_TRANSACTION_TIMEOUT_MS", "2500"),
        ]);
        let mut config = ServerConfig::from_toml("port = 9000").unwrap();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.database_path, PathBuf::from("/data/tally.db"));
        assert_eq!(config.transaction_timeout_ms, 2500);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env(|key| (key == "TALLY_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "host = \"0.0.0.0\"\nport = 8181\n").unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.socket_addr().unwrap().port(), 8181);
    }
}
