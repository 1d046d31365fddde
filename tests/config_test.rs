//! Configuration file handling as the binary uses it

use memscan::config::{validate_config, Config, ConfigError, ConfigLoader};
use memscan::{MockProcess, Session, SessionOptions};
use pretty_assertions::assert_eq;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_saved_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::new(dir.path().join("memscan.toml"));

    let mut config = Config::default();
    config.scanner.require_writable = false;
    config.scanner.max_region_size = 1 << 20;
    config.set.tick_ms = 250;
    config.logging.level = "debug".to_string();
    loader.save(&config).unwrap();

    assert_eq!(loader.load().unwrap(), config);
}

#[test]
fn test_missing_file_means_defaults() {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::new(dir.path().join("absent.toml"));

    assert!(matches!(loader.load(), Err(ConfigError::FileNotFound(_))));
    assert_eq!(loader.load_or_default().unwrap(), Config::default());
}

#[test]
fn test_broken_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memscan.toml");
    fs::write(&path, "[scanner\nrequire_writable = ").unwrap();

    let result = ConfigLoader::new(&path).load_or_default();
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memscan.toml");
    fs::write(&path, "[set]\ntick_ms = 100\n").unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();
    validate_config(&config).unwrap();
    assert_eq!(config.set.tick(), Duration::from_millis(100));
    assert_eq!(config.set.poll_ms, Config::default().set.poll_ms);
    assert_eq!(config.scanner, Config::default().scanner);
}

#[test]
fn test_invalid_values_rejected() {
    let mut config = Config::default();
    config.set.poll_ms = config.set.tick_ms + 1;
    assert!(matches!(validate_config(&config), Err(ConfigError::Invalid(_))));

    let mut config = Config::default();
    config.logging.level = "loud".to_string();
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_config_drives_region_filter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memscan.toml");
    fs::write(&path, "[scanner]\nrequire_writable = false\n").unwrap();
    let config = ConfigLoader::new(&path).load().unwrap();

    let mock = MockProcess::new(5);
    mock.map_with(0x1000, vec![0; 16], "r--p", None);
    mock.map_with(0x2000, vec![0; 16], "rw-p", None);

    let mut strict = Session::new(mock.clone(), SessionOptions::default());
    assert_eq!(strict.bind(5).unwrap(), 1);

    let mut relaxed = Session::new(mock, SessionOptions::from_config(&config));
    assert_eq!(relaxed.bind(5).unwrap(), 2);
}
