//! Configuration validator for memscan
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, LoggingConfig, SetConfig};

/// Accepted values for `[logging] level`
pub const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_set(&config.set)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates repeat-loop timing
    fn validate_set(set: &SetConfig) -> Result<(), ConfigError> {
        if set.tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "Set tick must be at least 1 ms".to_string(),
            ));
        }

        if set.poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cancellation poll interval must be at least 1 ms".to_string(),
            ));
        }

        if set.poll_ms > set.tick_ms {
            return Err(ConfigError::Invalid(format!(
                "Cancellation poll interval ({} ms) cannot exceed the tick ({} ms)",
                set.poll_ms, set.tick_ms
            )));
        }

        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, LOG_LEVELS
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
