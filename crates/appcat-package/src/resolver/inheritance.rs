//! Class inheritance edges between packages
//!
//! Class documents declare `Name`, `Extends` (a class or a list of classes)
//! and an optional `Namespaces` map. When a class extends a class declared by
//! another package in the graph, the base class's package becomes a parent
//! of the child's package. These edges describe the local class hierarchy
//! only; they play no part in the `Require` walk.

use super::DependencyGraph;
use crate::manifest::YamlLoader;
use crate::Result;
use indexmap::IndexMap;
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Alias for the default namespace
const DEFAULT_NAMESPACE: &str = "=";

/// Parent package declares `base_class`, which `class` in the child extends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceEdge {
    pub parent: String,
    pub child: String,
    pub class: String,
    pub base_class: String,
}

#[derive(Debug, Default)]
pub struct InheritanceIndex {
    owners: HashMap<String, String>,
    edges: Vec<InheritanceEdge>,
}

impl InheritanceIndex {
    /// Read every class document in the graph and link packages
    pub fn build(graph: &DependencyGraph, loader: &YamlLoader) -> Result<Self> {
        let mut index = Self::default();
        let mut extends: Vec<(String, String, Vec<String>)> = Vec::new();

        for (package, archive) in graph.entries() {
            let manifest = archive.manifest()?;
            for class in manifest.classes.keys() {
                index
                    .owners
                    .entry(class.clone())
                    .or_insert_with(|| package.to_string());

                let Some(document) = archive.class_document(class, loader)? else {
                    warn!(package, class = %class, "class file missing from archive");
                    continue;
                };

                let mut namespaces = manifest.namespaces.clone();
                namespaces.extend(document_namespaces(&document));
                let bases = extends_of(&document)
                    .iter()
                    .map(|base| resolve_class_name(base, &namespaces))
                    .collect();
                extends.push((package.to_string(), class.clone(), bases));
            }
        }

        for (child, class, bases) in extends {
            for base_class in bases {
                match index.owners.get(&base_class) {
                    Some(parent) if *parent != child => {
                        debug!(parent = %parent, child = %child, base_class = %base_class, "inheritance edge");
                        index.edges.push(InheritanceEdge {
                            parent: parent.clone(),
                            child: child.clone(),
                            class: class.clone(),
                            base_class,
                        });
                    }
                    Some(_) => {}
                    None => debug!(class = %class, base_class = %base_class, "base class outside graph"),
                }
            }
        }

        Ok(index)
    }

    pub fn edges(&self) -> &[InheritanceEdge] {
        &self.edges
    }

    /// Package declaring `class`
    pub fn owner_of(&self, class: &str) -> Option<&str> {
        self.owners.get(class).map(String::as_str)
    }
}

/// Expand a class reference to a full name.
///
/// `alias:Name` uses the namespace registered for `alias`; a bare name
/// without dots uses the `=` namespace. Dotted bare names are already full.
pub fn resolve_class_name(name: &str, namespaces: &IndexMap<String, String>) -> String {
    let (alias, short) = match name.split_once(':') {
        Some((alias, short)) => (alias, short),
        None if name.contains('.') => return name.to_string(),
        None => (DEFAULT_NAMESPACE, name),
    };
    let alias = if alias.is_empty() { DEFAULT_NAMESPACE } else { alias };

    match namespaces.get(alias) {
        Some(prefix) => format!("{}.{}", prefix.trim_end_matches('.'), short),
        None => short.to_string(),
    }
}

fn document_namespaces(document: &Value) -> IndexMap<String, String> {
    document
        .get("Namespaces")
        .and_then(Value::as_mapping)
        .map(|mapping| {
            mapping
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn extends_of(document: &Value) -> Vec<String> {
    match document.get("Extends") {
        Some(Value::String(base)) => vec![base.clone()],
        Some(Value::Sequence(bases)) => bases
            .iter()
            .filter_map(|b| b.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
