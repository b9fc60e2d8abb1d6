//! Package manifest parsing and types (manifest.yaml)

use crate::{PackageError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeSet, HashSet};

/// Version assumed when a manifest does not declare one
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Package manifest (manifest.yaml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PackageManifest {
    /// Dotted identifier, unique across the catalog
    pub full_name: String,
    /// Display name (falls back to the full name)
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version", deserialize_with = "version_string")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(rename = "Type", default)]
    pub package_type: PackageType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Class name to file path under `Classes/`
    #[serde(default, deserialize_with = "null_as_default")]
    pub classes: IndexMap<String, String>,
    /// Dependency full name to version constraint (`None` means any)
    #[serde(
        rename = "Require",
        default,
        deserialize_with = "requirements",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub requires: IndexMap<String, Option<String>>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub namespaces: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(rename = "UI", default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl PackageManifest {
    /// Parse manifest from YAML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let mut manifest: Self = serde_yaml::from_str(content)?;
        if manifest.name.is_empty() {
            manifest.name = manifest.full_name.clone();
        }
        Ok(manifest)
    }

    /// Serialize to YAML string
    pub fn to_string(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Class identifiers declared by this package
    pub fn class_definitions(&self) -> BTreeSet<&str> {
        self.classes.keys().map(String::as_str).collect()
    }

    /// Entry name of the logo inside the archive
    pub fn logo_entry(&self) -> &str {
        self.logo.as_deref().unwrap_or("logo.png")
    }

    /// Entry name of the UI definition inside the archive
    pub fn ui_entry(&self) -> String {
        format!("UI/{}", self.ui.as_deref().unwrap_or("ui.yaml"))
    }
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// Package kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    #[default]
    Application,
    Library,
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageType::Application => write!(f, "Application"),
            PackageType::Library => write!(f, "Library"),
        }
    }
}

/// Render a YAML scalar as a string (`Version: 1.0` is a float to YAML)
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn version_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(default_version()),
        other => scalar_to_string(&other)
            .ok_or_else(|| serde::de::Error::custom("Version must be a scalar value")),
    }
}

fn requirements<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut requires = IndexMap::new();
    for (name, constraint) in raw.unwrap_or_default() {
        let constraint = match constraint {
            Value::Null => None,
            other => Some(scalar_to_string(&other).ok_or_else(|| {
                serde::de::Error::custom(format!(
                    "version constraint for '{}' must be a scalar value",
                    name
                ))
            })?),
        };
        requires.insert(name, constraint);
    }
    Ok(requires)
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// YAML parser configuration for UI definitions and class documents.
///
/// Carries the set of custom tags a document may use (`!yaql` by default).
/// A document using any other tag is rejected.
#[derive(Debug, Clone)]
pub struct YamlLoader {
    tags: HashSet<String>,
}

impl YamlLoader {
    /// Loader that accepts no custom tags
    pub fn new() -> Self {
        Self {
            tags: HashSet::new(),
        }
    }

    /// Accept an additional custom tag
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.trim_start_matches('!').to_string());
        self
    }

    /// Check whether a tag is accepted
    pub fn accepts(&self, tag: &str) -> bool {
        self.tags.contains(tag.trim_start_matches('!'))
    }

    /// Parse a document, rejecting unknown tags
    pub fn load(&self, origin: &str, content: &str) -> Result<Value> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| PackageError::InvalidPackage(format!("malformed {}: {}", origin, e)))?;
        self.check_tags(origin, &value)?;
        Ok(value)
    }

    fn check_tags(&self, origin: &str, value: &Value) -> Result<()> {
        match value {
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                if !self.accepts(&tag) {
                    return Err(PackageError::InvalidPackage(format!(
                        "unknown tag {} in {}",
                        tag, origin
                    )));
                }
                self.check_tags(origin, &tagged.value)
            }
            Value::Sequence(items) => items.iter().try_for_each(|v| self.check_tags(origin, v)),
            Value::Mapping(map) => map.iter().try_for_each(|(k, v)| {
                self.check_tags(origin, k)?;
                self.check_tags(origin, v)
            }),
            _ => Ok(()),
        }
    }
}

impl Default for YamlLoader {
    fn default() -> Self {
        Self::new().with_tag("!yaql")
    }
}
