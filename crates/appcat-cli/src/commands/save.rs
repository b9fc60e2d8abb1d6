//! Download packages or bundles (appcat package-save / bundle-save)

use super::http_client;
use super::output::print_save_report;
use anyhow::{Context, Result};
use appcat_config::Settings;
use appcat_package::{ImportRef, PackageSaver};
use std::path::Path;

/// Returns whether every reference failed
pub fn run(refs: Vec<ImportRef>, dir: &Path, settings: &Settings) -> Result<bool> {
    let client = http_client(settings)?;
    let saver = PackageSaver::new(&client, settings.repo_url.as_str())
        .with_search_dir(settings.local_path.clone());

    let report = saver
        .save(&refs, dir)
        .with_context(|| format!("Failed to save packages to {}", dir.display()))?;
    print_save_report(&report);

    Ok(report.is_failure())
}
