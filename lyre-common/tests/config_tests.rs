//! Configuration loading and graceful degradation
//!
//! Uses serial_test because the resolver reads the LYRE_CONFIG environment
//! variable; tests touching it must not run in parallel.

use lyre_common::config::{resolve_config_path, EndOfQueuePolicy, TomlConfig, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::io::Write;

#[test]
#[serial]
fn test_env_var_selects_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 7000\n[playback]\nend_of_queue = \"loop\"").unwrap();

    env::set_var(CONFIG_ENV_VAR, file.path());
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved.as_deref(), Some(file.path()));

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config.port, 7000);
    assert_eq!(config.playback.end_of_queue, EndOfQueuePolicy::Loop);
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env_var() {
    let file = tempfile::NamedTempFile::new().unwrap();

    env::set_var(CONFIG_ENV_VAR, "/nonexistent/lyre.toml");
    let resolved = resolve_config_path(Some(file.path()));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved.as_deref(), Some(file.path()));
}

#[test]
#[serial]
fn test_load_or_default_reads_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

    let config = TomlConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.port, 5731);
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();

    assert!(TomlConfig::load_or_default(Some(file.path())).is_err());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let result = TomlConfig::load(std::path::Path::new("/nonexistent/lyre/config.toml"));
    assert!(result.is_err());
}
