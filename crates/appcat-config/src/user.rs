//! User configuration (~/.appcat/config.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportConfig>,
}

/// Catalog API endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Package repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Directory searched for packages before the repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

/// Import defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// "s", "u" or "a"; empty means ask
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists_action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dep_exists_action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl UserConfig {
    /// Load and validate a config file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(import) = &self.import {
            if let Some(action) = &import.exists_action {
                validate_exists_action("import.exists_action", action)?;
            }
            if let Some(action) = &import.dep_exists_action {
                validate_exists_action("import.dep_exists_action", action)?;
            }
        }

        if let Some(catalog) = &self.catalog {
            if catalog.timeout_secs == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "catalog.timeout_secs".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            if let Some(url) = &catalog.url {
                validate_http_url("catalog.url", url)?;
            }
        }

        if let Some(url) = self.repository.as_ref().and_then(|r| r.url.as_ref()) {
            validate_http_url("repository.url", url)?;
        }

        Ok(())
    }

    /// `~/.appcat/config.toml`
    pub fn user_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".appcat").join("config.toml"))
    }

    pub(crate) fn catalog_mut(&mut self) -> &mut CatalogConfig {
        self.catalog.get_or_insert_with(Default::default)
    }

    pub(crate) fn repository_mut(&mut self) -> &mut RepositoryConfig {
        self.repository.get_or_insert_with(Default::default)
    }

    pub(crate) fn import_mut(&mut self) -> &mut ImportConfig {
        self.import.get_or_insert_with(Default::default)
    }
}

/// Exists actions are `s`, `u`, `a`, or empty for prompting
pub fn validate_exists_action(field: &str, value: &str) -> ConfigResult<()> {
    if !matches!(value.trim(), "" | "s" | "u" | "a") {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be 's', 'u', 'a' or empty, got '{}'", value),
        });
    }
    Ok(())
}

/// Empty URLs are allowed; they disable the remote side
fn validate_http_url(field: &str, value: &str) -> ConfigResult<()> {
    let value = value.trim();
    if value.is_empty() || value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected an http(s) URL, got '{}'", value),
    })
}
