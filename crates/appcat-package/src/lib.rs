//! Application catalog package handling
//!
//! Opening package archives, resolving package references against local
//! directories and remote repositories, walking `Require` dependencies and
//! importing the resulting package sets into a remote application catalog.

pub mod archive;
pub mod bundle;
pub mod catalog;
pub mod conflict;
pub mod http;
pub mod manifest;
pub mod pipeline;
pub mod resolver;
pub mod source;

use std::path::PathBuf;

pub use archive::PackageArchive;
pub use bundle::{Bundle, BundleEntry, BundleParser, BundleSpec};
pub use catalog::{Catalog, CatalogError, CatalogPackage, HttpCatalog, PackageData};
pub use conflict::{
    select_policy, Conflict, ConflictAction, ConflictDecision, ConflictPolicy, DecisionScope,
    InteractivePolicy, PresetPolicy, Prompter,
};
pub use http::{Fetch, HttpClient, HttpConfig, HttpError};
pub use manifest::{PackageManifest, PackageType, YamlLoader};
pub use pipeline::{
    ImportPipeline, ImportRef, ImportReport, ImportState, PackageOutcome, PackageSaver,
    SaveReport,
};
pub use resolver::{DependencyGraph, DependencyResolver, InheritanceEdge, InheritanceIndex};
pub use source::{PackageReference, PackageSource};

/// Package handling errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Can't open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: http::HttpError,
    },

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Can't parse bundle contents: {0}")]
    BundleFormat(String),

    #[error("Bundle file '{0}' not found")]
    BundleNotFound(String),

    #[error("Can't resolve package '{name}': {source}")]
    Resolution {
        name: String,
        #[source]
        source: Box<PackageError>,
    },

    #[error("Can't resolve package '{name}' required by '{required_by}': {source}")]
    Dependency {
        name: String,
        required_by: String,
        #[source]
        source: Box<PackageError>,
    },

    #[error("Invalid filename path supplied: {0}")]
    InvalidName(String),

    #[error("No base_url for repository supplied")]
    NoBaseUrl,

    #[error("Import aborted at package '{0}'")]
    Aborted(String),

    #[error("Import interrupted at package '{0}'")]
    Interrupted(String),

    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PackageError {
    /// Wrap an error as a failure to resolve `name`, unless it already is one
    pub fn resolution(name: impl Into<String>, error: PackageError) -> Self {
        match error {
            e @ (PackageError::Resolution { .. } | PackageError::Dependency { .. }) => e,
            e => PackageError::Resolution {
                name: name.into(),
                source: Box::new(e),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;
