//! Resolving package references to opened archives
//!
//! A reference is tried against an explicit URL first, then the local
//! filesystem, then the package repository (`{base_url}/apps/{name}[.{version}].zip`).

use crate::archive::PackageArchive;
use crate::http::Fetch;
use crate::{PackageError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Repository path segment for packages
pub const APPS_PATH: &str = "apps";

/// Repository path segment for bundles
pub const BUNDLES_PATH: &str = "bundles";

/// A request to locate one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    /// Package full name (or the raw argument for path/URL references)
    pub name: String,
    /// Version or version constraint
    pub version: Option<String>,
    pub explicit_url: Option<String>,
    pub local_path: Option<PathBuf>,
}

impl PackageReference {
    /// Reference looked up by name in the repository
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            explicit_url: None,
            local_path: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: url.clone(),
            explicit_url: Some(url),
            ..Self::named("")
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            local_path: Some(path),
            ..Self::named("")
        }
    }

    pub fn with_version(mut self, version: Option<impl Into<String>>) -> Self {
        self.version = version.map(Into::into);
        self
    }

    pub fn with_url(mut self, url: Option<impl Into<String>>) -> Self {
        self.explicit_url = url.map(Into::into);
        self
    }

    /// Classify a command-line argument.
    ///
    /// `http(s)://` arguments are URLs, existing files or directories are
    /// local paths, everything else is a repository name.
    pub fn parse(arg: &str, version: Option<&str>) -> Self {
        if is_url(arg) {
            PackageReference::url(arg)
        } else if Path::new(arg).exists() {
            PackageReference::path(arg)
        } else {
            PackageReference::named(arg).with_version(version)
        }
    }
}

impl std::fmt::Display for PackageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({})", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Check for an `http`/`https` URL
pub fn is_url(candidate: &str) -> bool {
    url::Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Reject names that would escape the repository path
pub fn ensure_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".."
    {
        return Err(PackageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Build a repository URL: `{base_url}/{path}/{name}[.{version}]{extension}`
pub fn repository_url(
    base_url: &str,
    path: &str,
    name: &str,
    version: Option<&str>,
    extension: &str,
) -> Result<String> {
    ensure_filename(name)?;
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        return Err(PackageError::NoBaseUrl);
    }

    if let Some(version) = version {
        ensure_filename(version)?;
    }
    let infix = version.map(|v| format!(".{}", v)).unwrap_or_default();
    Ok(format!("{}/{}/{}{}{}", base, path, name, infix, extension))
}

/// Version usable as a URL infix.
///
/// A pinned version (`1.0`, `=1.0.2`, `stable`) is used as given; ranges,
/// wildcards and absent constraints fetch the unversioned archive.
pub fn version_infix(constraint: Option<&str>) -> Option<String> {
    let constraint = constraint?.trim();
    let pinned = constraint.strip_prefix('=').unwrap_or(constraint).trim();
    let is_range = pinned
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '~' | '^' | '*' | ',' | '='));
    (!pinned.is_empty() && !is_range).then(|| pinned.to_string())
}

/// Resolves [`PackageReference`]s to archives
pub struct PackageSource<'a> {
    fetcher: &'a dyn Fetch,
    search_dir: Option<PathBuf>,
}

impl<'a> PackageSource<'a> {
    pub fn new(fetcher: &'a dyn Fetch) -> Self {
        Self {
            fetcher,
            search_dir: None,
        }
    }

    /// Directory searched for `<name>` and `<name>.zip` before the repository
    pub fn with_search_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.search_dir = dir;
        self
    }

    pub fn search_dir(&self) -> Option<&Path> {
        self.search_dir.as_deref()
    }

    pub fn fetcher(&self) -> &'a dyn Fetch {
        self.fetcher
    }

    /// Locate and open the referenced package.
    ///
    /// The returned archive has not been validated; its manifest is parsed
    /// when first accessed.
    pub fn resolve(&self, reference: &PackageReference, base_url: &str) -> Result<PackageArchive> {
        if let Some(url) = &reference.explicit_url {
            debug!(package = %reference.name, url = %url, "fetching from explicit URL");
            return PackageArchive::fetch(url, self.fetcher)
                .map_err(|e| PackageError::resolution(&reference.name, e));
        }

        if let Some(path) = self.local_candidate(reference) {
            debug!(package = %reference.name, path = %path.display(), "using local package");
            return PackageArchive::open_path(&path)
                .map_err(|e| PackageError::resolution(&reference.name, e));
        }

        if let Some(path) = &reference.local_path {
            return Err(PackageError::resolution(
                &reference.name,
                PackageError::Open {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                },
            ));
        }

        let infix = version_infix(reference.version.as_deref());
        let url = repository_url(base_url, APPS_PATH, &reference.name, infix.as_deref(), ".zip")?;
        debug!(package = %reference.name, url = %url, "fetching from repository");
        PackageArchive::fetch(&url, self.fetcher).map_err(|e| PackageError::resolution(&reference.name, e))
    }

    fn local_candidate(&self, reference: &PackageReference) -> Option<PathBuf> {
        if let Some(path) = &reference.local_path {
            let mut candidates = vec![path.clone()];
            if let Some(dir) = &self.search_dir {
                if path.is_relative() {
                    candidates.push(dir.join(path));
                }
            }
            return candidates.into_iter().find(|p| p.exists());
        }

        let dir = self.search_dir.as_ref()?;
        ensure_filename(&reference.name).ok()?;
        [
            dir.join(&reference.name),
            dir.join(format!("{}.zip", reference.name)),
        ]
        .into_iter()
        .find(|p| p.exists())
    }
}
