//! Importing packages and bundles into the catalog
//!
//! Each top-level reference is resolved together with its `Require` closure
//! and the resulting packages are created requirements-first. Conflicts go
//! through the run's [`ConflictPolicy`]; an abort decision or an
//! interrupted prompt stops the run.

use crate::archive::PackageArchive;
use crate::bundle::BundleParser;
use crate::catalog::{Catalog, CatalogError, CatalogPackage, PackageData};
use crate::conflict::{aborted, Conflict, ConflictAction, ConflictPolicy};
use crate::http::Fetch;
use crate::resolver::{DependencyGraph, DependencyResolver};
use crate::source::{PackageReference, PackageSource};
use crate::{PackageError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A top-level import request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRef {
    Package(PackageReference),
    /// Bundle file path, URL or repository name
    Bundle(String),
}

/// Final state of one package in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportState {
    Created(CatalogPackage),
    /// Existing package kept, or already handled earlier in the run
    Skipped,
    ResolutionFailed(String),
    Failed(String),
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub name: String,
    pub is_dependency: bool,
    pub state: ImportState,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub created: Vec<CatalogPackage>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// Every package in processing order
    pub outcomes: Vec<PackageOutcome>,
    pub aborted: bool,
    pub roots_total: usize,
    pub roots_failed: usize,
}

impl ImportReport {
    /// An abort was taken, or no top-level reference succeeded
    pub fn is_failure(&self) -> bool {
        self.aborted || (self.roots_total > 0 && self.roots_failed == self.roots_total)
    }

    fn record(&mut self, name: &str, is_dependency: bool, state: ImportState) {
        match &state {
            ImportState::Created(package) => self.created.push(package.clone()),
            ImportState::Skipped => self.skipped.push(name.to_string()),
            ImportState::ResolutionFailed(reason) | ImportState::Failed(reason) => {
                self.failed.push((name.to_string(), reason.clone()))
            }
            ImportState::Aborted => self.aborted = true,
        }
        self.outcomes.push(PackageOutcome {
            name: name.to_string(),
            is_dependency,
            state,
        });
    }

    fn root_result(&mut self, succeeded: bool) {
        self.roots_total += 1;
        if !succeeded {
            self.roots_failed += 1;
        }
    }
}

/// Result of writing packages to a directory
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
    pub roots_total: usize,
    pub roots_failed: usize,
}

impl SaveReport {
    pub fn is_failure(&self) -> bool {
        self.roots_total > 0 && self.roots_failed == self.roots_total
    }
}

pub struct ImportPipeline<'a> {
    fetcher: &'a dyn Fetch,
    catalog: &'a dyn Catalog,
    base_url: String,
    search_dir: Option<PathBuf>,
    data: PackageData,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(fetcher: &'a dyn Fetch, catalog: &'a dyn Catalog, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            catalog,
            base_url: base_url.into(),
            search_dir: None,
            data: PackageData::default(),
        }
    }

    pub fn with_search_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.search_dir = dir;
        self
    }

    /// Metadata sent with every created package
    pub fn with_package_data(mut self, data: PackageData) -> Self {
        self.data = data;
        self
    }

    /// Import references in order.
    ///
    /// Failures are recorded per package and the run moves on; an abort
    /// decision marks the report and stops before the next create.
    pub fn run(&self, refs: &[ImportRef], policy: &mut dyn ConflictPolicy) -> ImportReport {
        policy.reset();
        let mut report = ImportReport::default();
        let mut handled = HashSet::new();

        for import_ref in refs {
            let outcome = match import_ref {
                ImportRef::Package(reference) => {
                    let search_dir = self.search_dir.as_deref();
                    self.import_reference(reference, search_dir, policy, &mut handled, &mut report)
                }
                ImportRef::Bundle(arg) => self.import_bundle(arg, policy, &mut handled, &mut report),
            };
            if let Err(e) = outcome {
                warn!(error = %e, "import aborted");
                break;
            }
        }

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            aborted = report.aborted,
            "import finished"
        );
        report
    }

    fn import_bundle(
        &self,
        arg: &str,
        policy: &mut dyn ConflictPolicy,
        handled: &mut HashSet<String>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let bundle = match BundleParser::new(self.fetcher).load(arg, &self.base_url) {
            Ok(bundle) => bundle,
            Err(e) => {
                report.record(arg, false, ImportState::ResolutionFailed(e.to_string()));
                report.root_result(false);
                return Ok(());
            }
        };
        info!(bundle = %bundle.origin, packages = bundle.spec.packages.len(), "importing bundle");

        let search_dir = bundle.local_dir.as_deref().or(self.search_dir.as_deref());
        for reference in bundle.spec.references() {
            self.import_reference(&reference, search_dir, policy, handled, report)?;
        }
        Ok(())
    }

    /// Resolve one reference and create its graph; `Err` only on abort or interrupt
    fn import_reference(
        &self,
        reference: &PackageReference,
        search_dir: Option<&Path>,
        policy: &mut dyn ConflictPolicy,
        handled: &mut HashSet<String>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let source = PackageSource::new(self.fetcher).with_search_dir(search_dir.map(Path::to_path_buf));
        let graph = match resolve_graph(&source, reference, &self.base_url) {
            Ok(graph) => graph,
            Err(e) => {
                warn!(package = %reference.name, error = %e, "resolution failed");
                report.record(&reference.name, false, ImportState::ResolutionFailed(e.to_string()));
                report.root_result(false);
                return Ok(());
            }
        };

        let root = graph.names().next().map(str::to_string).unwrap_or_default();
        let mut root_succeeded = true;

        for (name, mut archive) in graph.into_creation_order() {
            let is_dependency = name != root;
            if !handled.insert(name.clone()) {
                debug!(package = %name, "already handled in this run");
                archive.close();
                continue;
            }

            let result = self.create(&archive, &name, is_dependency, policy);
            archive.close();

            let state = match result {
                Ok(state) => state,
                Err(e @ (PackageError::Aborted(_) | PackageError::Interrupted(_))) => {
                    report.record(&name, is_dependency, ImportState::Aborted);
                    report.root_result(false);
                    return Err(e);
                }
                Err(e) => {
                    warn!(package = %name, error = %e, "import failed");
                    ImportState::Failed(e.to_string())
                }
            };
            if !is_dependency {
                root_succeeded = matches!(state, ImportState::Created(_) | ImportState::Skipped);
            }
            report.record(&name, is_dependency, state);
        }

        report.root_result(root_succeeded);
        Ok(())
    }

    fn create(
        &self,
        archive: &PackageArchive,
        name: &str,
        is_dependency: bool,
        policy: &mut dyn ConflictPolicy,
    ) -> Result<ImportState> {
        let version = archive.manifest()?.version.clone();
        let payload = archive.bytes()?;

        let reason = match self.catalog.create_package(name, &self.data, payload.clone()) {
            Ok(package) => return Ok(ImportState::Created(package)),
            Err(CatalogError::Conflict { reason, .. }) => reason,
            Err(e) => return Err(e.into()),
        };

        let conflict = Conflict {
            full_name: name,
            version: &version,
            is_dependency,
            reason: &reason,
        };
        let decision = policy.decide(&conflict)?;
        info!(package = name, action = %decision.action, "package exists");

        match decision.action {
            ConflictAction::Skip => Ok(ImportState::Skipped),
            ConflictAction::Abort => Err(aborted(&conflict)),
            ConflictAction::Update => self.replace(name, &version, payload),
        }
    }

    /// Delete the caller's copies and create once more
    fn replace(&self, name: &str, version: &str, payload: Vec<u8>) -> Result<ImportState> {
        let owned = self.catalog.find_owned(name, Some(version))?;
        if owned.is_empty() {
            return Err(CatalogError::ForeignConflict(name.to_string()).into());
        }
        for existing in &owned {
            debug!(package = name, id = %existing.id, "deleting existing package");
            self.catalog.delete_package(&existing.id)?;
        }

        let package = self.catalog.create_package(name, &self.data, payload)?;
        Ok(ImportState::Created(package))
    }
}

/// Writes packages and their requirements to a directory
pub struct PackageSaver<'a> {
    fetcher: &'a dyn Fetch,
    base_url: String,
    search_dir: Option<PathBuf>,
}

impl<'a> PackageSaver<'a> {
    pub fn new(fetcher: &'a dyn Fetch, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            search_dir: None,
        }
    }

    pub fn with_search_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.search_dir = dir;
        self
    }

    /// Save references into `dir`.
    ///
    /// Bundles are written next to their packages as `<name>.bundle`.
    pub fn save(&self, refs: &[ImportRef], dir: &Path) -> Result<SaveReport> {
        fs::create_dir_all(dir)?;
        let mut report = SaveReport::default();
        let mut handled = HashSet::new();

        for import_ref in refs {
            match import_ref {
                ImportRef::Package(reference) => {
                    let search_dir = self.search_dir.as_deref();
                    self.save_reference(reference, search_dir, dir, &mut handled, &mut report);
                }
                ImportRef::Bundle(arg) => {
                    let bundle = match BundleParser::new(self.fetcher).load(arg, &self.base_url) {
                        Ok(bundle) => bundle,
                        Err(e) => {
                            report.failed.push((arg.clone(), e.to_string()));
                            report.roots_total += 1;
                            report.roots_failed += 1;
                            continue;
                        }
                    };

                    let target = dir.join(bundle_file_name(arg));
                    fs::write(&target, bundle.spec.to_json()?)?;
                    report.saved.push(target);

                    let search_dir = bundle.local_dir.as_deref().or(self.search_dir.as_deref());
                    for reference in bundle.spec.references() {
                        self.save_reference(&reference, search_dir, dir, &mut handled, &mut report);
                    }
                }
            }
        }

        Ok(report)
    }

    fn save_reference(
        &self,
        reference: &PackageReference,
        search_dir: Option<&Path>,
        dir: &Path,
        handled: &mut HashSet<String>,
        report: &mut SaveReport,
    ) {
        report.roots_total += 1;
        let source = PackageSource::new(self.fetcher).with_search_dir(search_dir.map(Path::to_path_buf));
        let graph = match resolve_graph(&source, reference, &self.base_url) {
            Ok(graph) => graph,
            Err(e) => {
                warn!(package = %reference.name, error = %e, "resolution failed");
                report.failed.push((reference.name.clone(), e.to_string()));
                report.roots_failed += 1;
                return;
            }
        };

        for (name, mut archive) in graph.into_creation_order() {
            if handled.insert(name.clone()) {
                match archive.save_to(dir) {
                    Ok(path) => {
                        info!(package = %name, path = %path.display(), "package saved");
                        report.saved.push(path);
                    }
                    Err(e) => report.failed.push((name.clone(), e.to_string())),
                }
            }
            archive.close();
        }
    }
}

fn resolve_graph(source: &PackageSource<'_>, reference: &PackageReference, base_url: &str) -> Result<DependencyGraph> {
    let root = source.resolve(reference, base_url)?;
    DependencyResolver::new(source)
        .requirements(root, base_url)
        .map_err(|e| PackageError::resolution(&reference.name, e))
}

/// `<stem>.bundle` for a bundle argument (path, URL or name)
fn bundle_file_name(arg: &str) -> String {
    let last = arg.trim_end_matches('/').rsplit(['/', '\\']).next().unwrap_or(arg);
    let stem = last.strip_suffix(".bundle").unwrap_or(last);
    format!("{}.bundle", stem)
}
