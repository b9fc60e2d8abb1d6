//! Import packages or bundles (appcat package-import / bundle-import)

use super::output::print_import_report;
use super::prompt::TerminalPrompter;
use super::{http_client, package_refs};
use anyhow::{anyhow, Context, Result};
use appcat_config::Settings;
use appcat_package::{select_policy, ConflictAction, HttpCatalog, ImportPipeline, ImportRef, PackageData};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Arguments shared by both import commands
#[derive(Debug, Clone, Default)]
pub struct ImportArgs {
    pub packages: Vec<String>,
    pub bundles: Vec<String>,
    pub package_version: Option<String>,
    /// Overrides the configured categories when non-empty
    pub categories: Vec<String>,
    pub is_public: bool,
    pub exists_action: Option<ConflictAction>,
    pub dep_exists_action: Option<ConflictAction>,
}

/// Run an import; returns whether the run counts as failed
pub fn run(args: ImportArgs, settings: &Settings) -> Result<bool> {
    let catalog_url = settings
        .catalog_url
        .as_deref()
        .context("No catalog URL configured; pass --catalog-url or set APPCAT_CATALOG_URL")?;

    let client = http_client(settings)?;
    let catalog = HttpCatalog::new(client.clone(), catalog_url)?;

    let exists_action = effective_action(args.exists_action, settings.exists_action.as_deref())?;
    let dep_exists_action =
        effective_action(args.dep_exists_action, settings.dep_exists_action.as_deref())?;

    let mut refs = package_refs(&args.packages, args.package_version.as_deref());
    refs.extend(args.bundles.into_iter().map(ImportRef::Bundle));

    let categories = if args.categories.is_empty() {
        settings.categories.clone()
    } else {
        args.categories
    };
    let data = PackageData {
        is_public: args.is_public || settings.is_public,
        categories,
    };

    let pipeline = ImportPipeline::new(&client, &catalog, settings.repo_url.as_str())
        .with_search_dir(settings.local_path.clone())
        .with_package_data(data);
    let mut policy = select_policy(exists_action, dep_exists_action, TerminalPrompter);

    // The spinner would draw over interactive prompts
    let spinner = exists_action.map(|_| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Importing packages...");
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    });

    let report = pipeline.run(&refs, policy.as_mut());

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    print_import_report(&report);

    Ok(report.is_failure())
}

/// CLI flag first, then the configured value
fn effective_action(flag: Option<ConflictAction>, configured: Option<&str>) -> Result<Option<ConflictAction>> {
    match (flag, configured) {
        (Some(action), _) => Ok(Some(action)),
        (None, Some(value)) => value.parse::<ConflictAction>().map(Some).map_err(|e: String| anyhow!(e)),
        (None, None) => Ok(None),
    }
}
