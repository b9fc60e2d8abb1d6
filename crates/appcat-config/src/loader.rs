//! Configuration loader
//!
//! Reads the user config file and applies `APPCAT_*` environment overrides.
//! CLI flags are applied by the caller on the returned [`Settings`].

use crate::user::{validate_exists_action, UserConfig};
use crate::ConfigResult;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Repository used when none is configured
pub const DEFAULT_REPO_URL: &str = "http://storage.apps.openstack.org/";

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENV_CONFIG: &str = "APPCAT_CONFIG";
pub const ENV_CATALOG_URL: &str = "APPCAT_CATALOG_URL";
pub const ENV_REPO_URL: &str = "APPCAT_REPO_URL";
pub const ENV_TOKEN: &str = "APPCAT_TOKEN";
pub const ENV_EXISTS_ACTION: &str = "APPCAT_EXISTS_ACTION";
pub const ENV_DEP_EXISTS_ACTION: &str = "APPCAT_DEP_EXISTS_ACTION";

/// Effective settings after merging file and environment
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub catalog_url: Option<String>,
    pub timeout: Duration,
    pub repo_url: String,
    pub local_path: Option<PathBuf>,
    /// Pre-issued auth token
    pub token: Option<String>,
    pub exists_action: Option<String>,
    pub dep_exists_action: Option<String>,
    pub is_public: bool,
    pub categories: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_user(UserConfig::default(), None)
    }
}

impl Settings {
    fn from_user(config: UserConfig, token: Option<String>) -> Self {
        let catalog = config.catalog.unwrap_or_default();
        let repository = config.repository.unwrap_or_default();
        let import = config.import.unwrap_or_default();

        Self {
            catalog_url: catalog.url.filter(|u| !u.trim().is_empty()),
            timeout: Duration::from_secs(catalog.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            repo_url: repository
                .url
                .unwrap_or_else(|| DEFAULT_REPO_URL.to_string()),
            local_path: repository.local_path,
            token,
            exists_action: non_empty(import.exists_action),
            dep_exists_action: non_empty(import.dep_exists_action),
            is_public: import.is_public.unwrap_or(false),
            categories: import.categories.unwrap_or_default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. User config file - `APPCAT_CONFIG` or `~/.appcat/config.toml`
/// 2. Environment variables (`APPCAT_*`)
/// 3. CLI flags (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Read this file instead of the default location
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn load(&self) -> ConfigResult<Settings> {
        let config = self.load_user_config()?;
        let config = apply_env_overrides(config)?;
        config.validate()?;

        let token = env::var(ENV_TOKEN).ok().filter(|t| !t.is_empty());
        Ok(Settings::from_user(config, token))
    }

    /// The config file location in effect
    pub fn config_path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = &self.config_path {
            return Ok(path.clone());
        }
        if let Ok(path) = env::var(ENV_CONFIG) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        UserConfig::user_config_path()
    }

    /// The config file is optional; a missing one yields defaults
    fn load_user_config(&self) -> ConfigResult<UserConfig> {
        let path = self.config_path()?;
        if !path.exists() {
            return Ok(UserConfig::default());
        }
        UserConfig::load_from_file(&path)
    }
}

/// Apply `APPCAT_*` overrides on top of the file config
fn apply_env_overrides(mut config: UserConfig) -> ConfigResult<UserConfig> {
    if let Ok(url) = env::var(ENV_CATALOG_URL) {
        config.catalog_mut().url = Some(url);
    }

    if let Ok(url) = env::var(ENV_REPO_URL) {
        config.repository_mut().url = Some(url);
    }

    if let Ok(action) = env::var(ENV_EXISTS_ACTION) {
        validate_exists_action(ENV_EXISTS_ACTION, &action)?;
        config.import_mut().exists_action = Some(action);
    }

    if let Ok(action) = env::var(ENV_DEP_EXISTS_ACTION) {
        validate_exists_action(ENV_DEP_EXISTS_ACTION, &action)?;
        config.import_mut().dep_exists_action = Some(action);
    }

    Ok(config)
}
