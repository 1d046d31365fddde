//! Default configuration values for memscan

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub scanner: ScannerDefaults,
    pub set: SetDefaults,
    pub logging: LoggingDefaults,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub require_writable: bool,
    pub max_region_size: usize,
}

/// Default repeat-loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDefaults {
    pub tick_ms: u64,
    pub poll_ms: u64,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        scanner: ScannerDefaults {
            require_writable: true,
            max_region_size: 0, // unlimited
        },
        set: SetDefaults {
            tick_ms: 1000,
            poll_ms: 50,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_defaults() {
        let config = default_config();
        assert!(config.scanner.require_writable);
        assert_eq!(config.scanner.max_region_size, 0);
    }

    #[test]
    fn test_set_defaults() {
        let config = default_config();
        assert_eq!(config.set.tick_ms, 1000);
        assert_eq!(config.set.poll_ms, 50);
        assert!(config.set.poll_ms <= config.set.tick_ms);
    }

    #[test]
    fn test_logging_defaults() {
        assert_eq!(default_config().logging.level, "info");
    }

    #[test]
    fn test_serialization() {
        let config = default_config();
        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("require_writable"));
        assert!(serialized.contains("tick_ms"));

        let deserialized: ConfigDefaults = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.set.tick_ms, config.set.tick_ms);
        assert_eq!(deserialized.logging.level, config.logging.level);
    }
}
