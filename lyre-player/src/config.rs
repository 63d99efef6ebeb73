//! lyre-player runtime configuration
//!
//! Command-line arguments layered over the TOML bootstrap configuration.
//! CLI values win over the file; the file wins over built-in defaults.

use crate::playback::SessionConfig;
use clap::Parser;
use lyre_common::config::TomlConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for lyre-player
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "lyre-player")]
#[command(about = "Background playback session service for a local music library")]
#[command(version)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, env = "LYRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog/state database (overrides the config file)
    #[arg(short, long, env = "LYRE_DATABASE")]
    pub database: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "LYRE_PORT")]
    pub port: Option<u16>,

    /// Log level (overrides the config file)
    #[arg(short, long, env = "LYRE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Resolved player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub route_poll_interval: Duration,
    pub session: SessionConfig,
}

impl Config {
    /// Apply CLI overrides to a loaded configuration file
    pub fn resolve(args: &Args, file: TomlConfig) -> Self {
        Self {
            db_path: args.database.clone().unwrap_or(file.database_path),
            bind_addr: file.bind_address,
            port: args.port.unwrap_or(file.port),
            log_level: args.log_level.clone().unwrap_or(file.logging.level),
            log_file: file.logging.file,
            route_poll_interval: Duration::from_millis(file.playback.route_poll_interval_ms.max(50)),
            session: SessionConfig::from(&file.playback),
        }
    }

    /// `host:port` for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyre_common::config::EndOfQueuePolicy;

    #[test]
    fn test_file_values_used_without_overrides() {
        let file = TomlConfig::from_toml_str(
            r#"
            database_path = "/srv/lyre/catalog.db"
            port = 6100

            [logging]
            level = "debug"

            [playback]
            end_of_queue = "loop"
            idle_stop_timeout_secs = 0
            "#,
        )
        .unwrap();

        let config = Config::resolve(&Args::default(), file);
        assert_eq!(config.db_path, PathBuf::from("/srv/lyre/catalog.db"));
        assert_eq!(config.listen_addr(), "127.0.0.1:6100");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.session.end_of_queue, EndOfQueuePolicy::Loop);
        assert!(config.session.idle_stop_timeout.is_zero());
    }

    #[test]
    fn test_cli_overrides_file() {
        let args = Args::parse_from([
            "lyre-player",
            "--database",
            "/tmp/other.db",
            "--port",
            "7000",
            "--log-level",
            "trace",
        ]);

        let config = Config::resolve(&args, TomlConfig::default());
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.port, 7000);
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.session.idle_stop_timeout, Duration::from_secs(600));
    }
}
