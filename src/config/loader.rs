//! Configuration loader for memscan
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File read by [`load_config`] from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "memscan.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_set")]
    pub set: SetConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_require_writable")]
    pub require_writable: bool,
    #[serde(default = "default_max_region_size")]
    pub max_region_size: usize,
}

/// Timing of repeating `set` and `watch` loops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl SetConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads the file when present, otherwise the defaults; a present but
    /// broken file is still an error
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new(DEFAULT_CONFIG_FILE).load_or_default()
}

// Default functions for serde
fn default_scanner() -> ScannerConfig {
    let defaults = default_config();
    ScannerConfig {
        require_writable: defaults.scanner.require_writable,
        max_region_size: defaults.scanner.max_region_size,
    }
}

fn default_set() -> SetConfig {
    let defaults = default_config();
    SetConfig {
        tick_ms: defaults.set.tick_ms,
        poll_ms: defaults.set.poll_ms,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_config().logging.level,
    }
}

// Individual field defaults
fn default_require_writable() -> bool {
    default_config().scanner.require_writable
}

fn default_max_region_size() -> usize {
    default_config().scanner.max_region_size
}

fn default_tick_ms() -> u64 {
    default_config().set.tick_ms
}

fn default_poll_ms() -> u64 {
    default_config().set.poll_ms
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scanner: default_scanner(),
            set: default_set(),
            logging: default_logging(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.scanner.require_writable);
        assert_eq!(config.set.tick(), Duration::from_secs(1));
        assert_eq!(config.set.poll(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let result = loader.load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let config = loader.load_or_default().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[set\ntick_ms = ").unwrap();

        let result = ConfigLoader::new(&path).load_or_default();
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("memscan.toml");

        let mut config = Config::default();
        config.scanner.max_region_size = 1 << 20;
        config.logging.level = "debug".to_string();
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());
        assert_eq!(loader.load().unwrap(), config);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [set]
            tick_ms = 250
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.set.tick_ms, 250);
        // Check defaults are applied
        assert_eq!(config.set.poll_ms, 50);
        assert!(config.scanner.require_writable);
        assert_eq!(config.logging.level, "info");
    }
}
