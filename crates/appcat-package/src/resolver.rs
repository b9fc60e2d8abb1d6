//! Transitive `Require` resolution

use crate::archive::PackageArchive;
use crate::source::{PackageReference, PackageSource};
use crate::{PackageError, Result};
use indexmap::IndexMap;
use semver::{Version, VersionReq};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

pub mod inheritance;

pub use inheritance::{InheritanceEdge, InheritanceIndex};

/// Packages keyed by full name, in discovery order.
///
/// Inserting a name that is already present is a no-op, which is what lets
/// cyclic and diamond-shaped requirement graphs terminate.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    packages: IndexMap<String, PackageArchive>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the name is already present; returns whether it was added
    pub fn insert(&mut self, full_name: String, archive: PackageArchive) -> bool {
        if self.packages.contains_key(&full_name) {
            return false;
        }
        self.packages.insert(full_name, archive);
        true
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.packages.contains_key(full_name)
    }

    pub fn get(&self, full_name: &str) -> Option<&PackageArchive> {
        self.packages.get(full_name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Full names in discovery order (root first)
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &PackageArchive)> {
        self.packages.iter().map(|(name, archive)| (name.as_str(), archive))
    }

    /// Entries with the most recently discovered first, so that
    /// requirements come before the packages that pulled them in
    pub fn into_creation_order(self) -> Vec<(String, PackageArchive)> {
        let mut entries: Vec<_> = self.packages.into_iter().collect();
        entries.reverse();
        entries
    }
}

/// Walks `Require` metadata breadth-first from a root package.
///
/// The first archive discovered for a name wins; differing constraints on
/// the same dependency from different requirers are not reconciled.
pub struct DependencyResolver<'a> {
    source: &'a PackageSource<'a>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(source: &'a PackageSource<'a>) -> Self {
        Self { source }
    }

    /// Resolve the root and its transitive requirements.
    ///
    /// A requirement that cannot be resolved fails the whole walk.
    pub fn requirements(&self, root: PackageArchive, base_url: &str) -> Result<DependencyGraph> {
        let root_manifest = root.manifest()?;
        let root_name = root_manifest.full_name.clone();

        let mut queue: VecDeque<(String, Option<String>, String)> = root_manifest
            .requires
            .iter()
            .map(|(name, constraint)| (name.clone(), constraint.clone(), root_name.clone()))
            .collect();
        let mut requested: HashSet<String> = HashSet::from([root_name.clone()]);

        let mut graph = DependencyGraph::new();
        graph.insert(root_name, root);

        while let Some((name, constraint, required_by)) = queue.pop_front() {
            if graph.contains(&name) || !requested.insert(name.clone()) {
                debug!(package = %name, "already resolved");
                continue;
            }

            let reference = PackageReference::named(name.as_str()).with_version(constraint.as_deref());
            let dependency_error = |e: PackageError| PackageError::Dependency {
                name: name.clone(),
                required_by: required_by.clone(),
                source: Box::new(e),
            };
            let archive = self.source.resolve(&reference, base_url).map_err(dependency_error)?;
            let manifest = archive.manifest().map_err(dependency_error)?;
            if manifest.full_name != name {
                warn!(
                    requested = %name,
                    declared = %manifest.full_name,
                    "archive declares a different full name"
                );
            }
            if let Some(constraint) = constraint.as_deref() {
                if satisfies(&manifest.version, constraint) == Some(false) {
                    warn!(
                        package = %name,
                        version = %manifest.version,
                        constraint,
                        required_by = %required_by,
                        "resolved version does not satisfy requirement"
                    );
                }
            }

            let full_name = manifest.full_name.clone();
            queue.extend(
                manifest
                    .requires
                    .iter()
                    .map(|(dep, c)| (dep.clone(), c.clone(), full_name.clone())),
            );
            debug!(package = %full_name, required_by = %required_by, "resolved requirement");
            graph.insert(full_name, archive);
        }

        Ok(graph)
    }
}

/// Check a manifest version against a constraint.
///
/// Versions with fewer than three components are padded (`1.0` is `1.0.0`).
/// Returns `None` when either side can't be interpreted as semver.
pub fn satisfies(version: &str, constraint: &str) -> Option<bool> {
    let constraint = constraint.trim();
    if constraint.is_empty() || constraint == "*" {
        return Some(true);
    }
    let version = parse_lenient(version)?;
    let requirement = VersionReq::parse(constraint).ok()?;
    Some(requirement.matches(&version))
}

fn parse_lenient(version: &str) -> Option<Version> {
    let version = version.trim();
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }
    let parts: Vec<&str> = version.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    Version::parse(&padded).ok()
}
