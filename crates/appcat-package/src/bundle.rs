//! Bundle descriptors: JSON lists of packages imported as a unit
//!
//! ```json
//! {"Packages": [{"Name": "app1"}, {"Name": "app2", "Version": "1.0"}]}
//! ```

use crate::http::Fetch;
use crate::source::{is_url, repository_url, PackageReference, BUNDLES_PATH};
use crate::{PackageError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One package named by a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BundleEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BundleEntry {
    pub fn reference(&self) -> PackageReference {
        PackageReference::named(self.name.as_str())
            .with_version(self.version.as_deref())
            .with_url(self.url.as_deref())
    }
}

/// Parsed bundle contents, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleSpec {
    #[serde(rename = "Packages")]
    pub packages: Vec<BundleEntry>,
}

impl BundleSpec {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PackageError::BundleFormat(e.to_string()))
    }

    pub fn references(&self) -> Vec<PackageReference> {
        self.packages.iter().map(BundleEntry::reference).collect()
    }
}

/// A loaded bundle and where it came from
#[derive(Debug, Clone)]
pub struct Bundle {
    pub spec: BundleSpec,
    /// Directory of a local bundle file; packages next to it are used
    /// before the repository
    pub local_dir: Option<PathBuf>,
    pub origin: String,
}

pub struct BundleParser<'a> {
    fetcher: &'a dyn Fetch,
}

impl<'a> BundleParser<'a> {
    pub fn new(fetcher: &'a dyn Fetch) -> Self {
        Self { fetcher }
    }

    /// Parse a bundle document.
    ///
    /// Fails unless the document is a JSON object with a `Packages` array.
    /// Entries without a `Name` are skipped; numeric versions become strings.
    pub fn parse_str(content: &str) -> Result<BundleSpec> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| PackageError::BundleFormat(e.to_string()))?;
        let packages = document
            .as_object()
            .and_then(|object| object.get("Packages"))
            .and_then(Value::as_array)
            .ok_or_else(|| PackageError::BundleFormat("missing 'Packages' list".to_string()))?;

        let mut entries = Vec::with_capacity(packages.len());
        for (position, item) in packages.iter().enumerate() {
            let Some(name) = item.get("Name").and_then(scalar) else {
                warn!(position, "bundle entry without a name skipped");
                continue;
            };
            entries.push(BundleEntry {
                name,
                version: item.get("Version").and_then(scalar),
                url: item.get("Url").and_then(scalar),
            });
        }

        Ok(BundleSpec { packages: entries })
    }

    /// Load a bundle from a local file, a URL or the repository.
    ///
    /// Repository bundles live at `{base_url}/bundles/{name}.bundle`.
    pub fn load(&self, arg: &str, base_url: &str) -> Result<Bundle> {
        let path = Path::new(arg);
        if path.is_file() {
            let content = fs::read_to_string(path).map_err(|source| PackageError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "read local bundle");
            return Ok(Bundle {
                spec: Self::parse_str(&content)?,
                local_dir: path.parent().map(Path::to_path_buf),
                origin: arg.to_string(),
            });
        }

        let (url, file_name) = if is_url(arg) {
            let file_name = arg.rsplit('/').next().unwrap_or(arg).to_string();
            (arg.to_string(), file_name)
        } else {
            let url = repository_url(base_url, BUNDLES_PATH, arg, None, ".bundle")?;
            (url, format!("{}.bundle", arg))
        };

        debug!(url = %url, "fetching bundle");
        let body = self.fetcher.fetch_bytes(&url).map_err(|source| {
            if source.is_not_found() {
                PackageError::BundleNotFound(file_name)
            } else {
                PackageError::Fetch {
                    url: url.clone(),
                    source,
                }
            }
        })?;
        let content = String::from_utf8(body)
            .map_err(|_| PackageError::BundleFormat("bundle is not valid UTF-8".to_string()))?;

        Ok(Bundle {
            spec: Self::parse_str(&content)?,
            local_dir: None,
            origin: url,
        })
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
