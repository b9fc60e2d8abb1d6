//! Remote application catalog

use crate::http::{HttpClient, HttpError};
use reqwest::blocking::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

const PACKAGES_PATH: &str = "v1/catalog/packages";

/// Multipart part carrying the package metadata
const METADATA_PART: &str = "__metadata__";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Create answered 409
    #[error("Package '{name}' already exists: {reason}")]
    Conflict { name: String, reason: String },

    #[error("Package '{0}' conflicts with a package from another tenant")]
    ForeignConflict(String),

    #[error("Invalid catalog URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unexpected catalog response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] HttpError),
}

impl CatalogError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::Conflict { .. })
    }
}

/// A package as stored by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPackage {
    pub id: String,
    #[serde(rename = "fully_qualified_name", default)]
    pub full_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Metadata sent along with an uploaded archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageData {
    pub is_public: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// Operations the import pipeline needs from the catalog
pub trait Catalog {
    /// Upload an archive; a same-identity package yields [`CatalogError::Conflict`]
    fn create_package(
        &self,
        full_name: &str,
        data: &PackageData,
        payload: Vec<u8>,
    ) -> Result<CatalogPackage, CatalogError>;

    /// Packages owned by the caller with this full name (and version, if given)
    fn find_owned(
        &self,
        full_name: &str,
        version: Option<&str>,
    ) -> Result<Vec<CatalogPackage>, CatalogError>;

    fn delete_package(&self, id: &str) -> Result<(), CatalogError>;
}

#[derive(Deserialize)]
struct PackageList {
    #[serde(default)]
    packages: Vec<CatalogPackage>,
}

/// Catalog API over HTTP
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: HttpClient,
    packages_url: Url,
}

impl HttpCatalog {
    pub fn new(client: HttpClient, endpoint: &str) -> Result<Self, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidUrl {
            url: endpoint.to_string(),
            reason,
        };
        let mut base = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let packages_url = base.join(PACKAGES_PATH).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            client,
            packages_url,
        })
    }

    fn package_url(&self, id: &str) -> Result<Url, CatalogError> {
        let mut url = self.packages_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidResponse("catalog URL has no path".to_string()))?
            .push(id);
        Ok(url)
    }
}

impl Catalog for HttpCatalog {
    fn create_package(
        &self,
        full_name: &str,
        data: &PackageData,
        payload: Vec<u8>,
    ) -> Result<CatalogPackage, CatalogError> {
        let metadata = serde_json::to_string(data)
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        let file = Part::bytes(payload).file_name(format!("{}.zip", full_name));
        let form = Form::new()
            .text(METADATA_PART, metadata)
            .part(full_name.to_string(), file);

        debug!(package = full_name, url = %self.packages_url, "creating package");
        let created: CatalogPackage = self
            .client
            .post_multipart(self.packages_url.as_str(), form)
            .map_err(|e| match e {
                HttpError::Status { status: 409, body } => CatalogError::Conflict {
                    name: full_name.to_string(),
                    reason: body,
                },
                other => CatalogError::Http(other),
            })?;
        info!(package = full_name, id = %created.id, "package created");
        Ok(created)
    }

    fn find_owned(
        &self,
        full_name: &str,
        version: Option<&str>,
    ) -> Result<Vec<CatalogPackage>, CatalogError> {
        let mut url = self.packages_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fqn", full_name);
            if let Some(version) = version {
                query.append_pair("version", version);
            }
            query.append_pair("owned", "true");
        }

        let list: PackageList = self.client.get_json(url.as_str())?;
        debug!(package = full_name, found = list.packages.len(), "owned packages");
        Ok(list.packages)
    }

    fn delete_package(&self, id: &str) -> Result<(), CatalogError> {
        let url = self.package_url(id)?;
        self.client.delete(url.as_str())?;
        info!(id, "package deleted");
        Ok(())
    }
}
