pub mod deps;
pub mod import;
pub mod output;
pub mod prompt;
pub mod save;

use anyhow::{Context, Result};
use appcat_config::Settings;
use appcat_package::{HttpClient, HttpConfig, ImportRef, PackageReference};
use tracing::warn;

/// Authenticated client built from settings
pub fn http_client(settings: &Settings) -> Result<HttpClient> {
    HttpClient::new(HttpConfig {
        timeout: settings.timeout,
        token: settings.token.clone(),
    })
    .context("Failed to initialise HTTP client")
}

/// Classify package arguments.
///
/// A version only makes sense for a single package; with several it is
/// ignored.
pub fn package_refs(args: &[String], version: Option<&str>) -> Vec<ImportRef> {
    let version = match version {
        Some(v) if args.len() > 1 => {
            warn!(version = v, "--package-version is ignored when several packages are given");
            None
        }
        other => other,
    };

    args.iter()
        .map(|arg| ImportRef::Package(PackageReference::parse(arg, version)))
        .collect()
}
