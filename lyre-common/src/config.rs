//! Bootstrap configuration loading
//!
//! Configuration file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LYRE_CONFIG`)
//! 3. User config directory (`<config_dir>/lyre/config.toml`)
//! 4. Built-in defaults (fallback)
//!
//! A missing configuration file is not fatal: a warning is logged and the
//! built-in defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "LYRE_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change while the service runs.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite catalog/state database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP control surface port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the control surface binds to (loopback by default)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// What happens when navigation runs past the last queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndOfQueuePolicy {
    /// Rewind to the first entry and pause
    #[default]
    #[serde(alias = "pause")]
    PauseAtStart,
    /// Rewind to the first entry and keep playing
    Loop,
}

/// Playback session tuning
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Seconds spent Paused/Stopped before the session is torn down
    #[serde(default = "default_idle_stop_timeout_secs")]
    pub idle_stop_timeout_secs: u64,

    #[serde(default)]
    pub end_of_queue: EndOfQueuePolicy,

    /// Output level while ducked under another stream (0.0-1.0)
    #[serde(default = "default_duck_volume")]
    pub duck_volume: f32,

    /// Per-subscriber event buffer
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Output route polling period
    #[serde(default = "default_route_poll_interval_ms")]
    pub route_poll_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            idle_stop_timeout_secs: default_idle_stop_timeout_secs(),
            end_of_queue: EndOfQueuePolicy::default(),
            duck_volume: default_duck_volume(),
            event_capacity: default_event_capacity(),
            route_poll_interval_ms: default_route_poll_interval_ms(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lyre").join("lyre.db"))
        .unwrap_or_else(|| PathBuf::from("./lyre_data/lyre.db"))
}

fn default_port() -> u16 {
    5731
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_idle_stop_timeout_secs() -> u64 {
    600
}

fn default_duck_volume() -> f32 {
    0.2
}

fn default_event_capacity() -> usize {
    256
}

fn default_route_poll_interval_ms() -> u64 {
    1000
}

impl TomlConfig {
    /// Parse a configuration document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load configuration, falling back to defaults
    ///
    /// Only a file that exists but cannot be parsed is an error.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.playback.duck_volume) {
            return Err(Error::Config(format!(
                "playback.duck_volume must be within 0.0-1.0, got {}",
                self.playback.duck_volume
            )));
        }
        if self.playback.event_capacity == 0 {
            return Err(Error::Config(
                "playback.event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the configuration file by priority order
///
/// Returns `None` when no candidate exists on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    dirs::config_dir()
        .map(|d| d.join("lyre").join("config.toml"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, 5731);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.playback.end_of_queue, EndOfQueuePolicy::PauseAtStart);
        assert_eq!(config.playback.idle_stop_timeout_secs, 600);
    }

    #[test]
    fn test_playback_section_parses() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 6000

            [playback]
            end_of_queue = "loop"
            duck_volume = 0.35
            idle_stop_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.playback.end_of_queue, EndOfQueuePolicy::Loop);
        assert_eq!(config.playback.duck_volume, 0.35);
        assert_eq!(config.playback.idle_stop_timeout_secs, 30);
    }

    #[test]
    fn test_pause_alias_accepted() {
        let config = TomlConfig::from_toml_str("[playback]\nend_of_queue = \"pause\"\n").unwrap();
        assert_eq!(config.playback.end_of_queue, EndOfQueuePolicy::PauseAtStart);
    }

    #[test]
    fn test_out_of_range_duck_volume_rejected() {
        let result = TomlConfig::from_toml_str("[playback]\nduck_volume = 1.5\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial_test::serial]
    fn test_cli_argument_has_priority() {
        std::env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
        let path = PathBuf::from("/tmp/explicit-lyre.toml");
        assert_eq!(resolve_config_path(Some(&path)), Some(path));
        std::env::remove_var(CONFIG_ENV_VAR);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_used_without_cli_argument() {
        std::env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
        assert_eq!(
            resolve_config_path(None),
            Some(PathBuf::from("/tmp/from-env.toml"))
        );
        std::env::remove_var(CONFIG_ENV_VAR);
    }

    #[test]
    #[serial_test::serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 6200\n[logging]\nlevel = \"warn\"\n").unwrap();

        let config = TomlConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.port, 6200);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = TomlConfig::load(Path::new("/nonexistent/lyre/config.toml"));
        assert!(result.is_err());
    }
}
