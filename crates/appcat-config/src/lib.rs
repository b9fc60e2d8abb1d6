//! Appcat configuration
//!
//! Settings come from three layers, later ones winning:
//! 1. User config (`~/.appcat/config.toml`, or the file named by `APPCAT_CONFIG`)
//! 2. Environment variables (`APPCAT_*`)
//! 3. CLI flags (applied by the caller)
//!
//! # Example
//!
//! ```no_run
//! use appcat_config::ConfigLoader;
//!
//! let settings = ConfigLoader::new().load().unwrap();
//! println!("{}", settings.repo_url);
//! ```

pub mod loader;
pub mod user;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{ConfigLoader, Settings, DEFAULT_REPO_URL};
pub use user::UserConfig;
