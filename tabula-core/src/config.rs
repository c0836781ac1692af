//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tabula/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tabula/` (~/.config/tabula/)
//! - Data: `$XDG_DATA_HOME/tabula/` (~/.local/share/tabula/)
//! - State/Logs: `$XDG_STATE_HOME/tabula/` (~/.local/state/tabula/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Database location and pragma options
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database file location and connection pragmas
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Where the database file lives
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// How long to wait on a held lock before failing, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Whether the engine enforces foreign-key constraints
    #[serde(default = "default_enforce_foreign_keys")]
    pub enforce_foreign_keys: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enforce_foreign_keys: default_enforce_foreign_keys(),
        }
    }
}

impl DatabaseConfig {
    /// Config pointing at an explicit file, with default pragmas. Handy
    /// for embedders and tests that manage their own paths.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

fn default_database_path() -> PathBuf {
    Config::data_dir().join("tabula.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_enforce_foreign_keys() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tabula/config.toml` (~/.config/tabula/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tabula").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/tabula/` (~/.local/share/tabula/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("tabula")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tabula/` (~/.local/state/tabula/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tabula")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/tabula/tabula.log` (~/.local/state/tabula/tabula.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tabula.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert!(config.database.enforce_foreign_keys);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
path = "/tmp/custom.db"
busy_timeout_ms = 250
enforce_foreign_keys = false

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert!(!config.database.enforce_foreign_keys);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml = r#"
[database]
path = "/tmp/custom.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert!(config.database.enforce_foreign_keys);
    }

    #[test]
    fn test_explicit_path_helper() {
        let config = DatabaseConfig::at("/tmp/t.db");
        assert_eq!(config.path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.busy_timeout_ms, 5000);
    }
}
