//! Configuration module for memscan
//!
//! Provides configuration loading, validation, and default settings
//! for the scanner and its front end.

mod defaults;
mod loader;
mod validator;

pub use defaults::{default_config, ConfigDefaults};
pub use loader::{load_config, ConfigLoader, DEFAULT_CONFIG_FILE};
pub use validator::{validate_config, ConfigValidator, LOG_LEVELS};

// Re-export the main configuration structures
pub use loader::{Config, LoggingConfig, ScannerConfig, SetConfig};

// Configuration-related error type
pub use loader::ConfigError;

// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
