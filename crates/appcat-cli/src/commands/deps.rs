//! Show what a package pulls in (appcat package-deps)

use super::http_client;
use anyhow::{Context, Result};
use appcat_config::Settings;
use appcat_package::{DependencyResolver, InheritanceIndex, PackageReference, PackageSource, YamlLoader};
use colored::Colorize;

pub fn run(arg: &str, version: Option<&str>, settings: &Settings) -> Result<()> {
    let client = http_client(settings)?;
    let source = PackageSource::new(&client).with_search_dir(settings.local_path.clone());

    let reference = PackageReference::parse(arg, version);
    let root = source
        .resolve(&reference, &settings.repo_url)
        .with_context(|| format!("Failed to resolve {}", reference))?;
    let graph = DependencyResolver::new(&source)
        .requirements(root, &settings.repo_url)
        .with_context(|| format!("Failed to resolve requirements of {}", reference))?;

    for (name, archive) in graph.entries() {
        let manifest = archive.manifest()?;
        println!(
            "{} {} ({})",
            name.bold(),
            manifest.version,
            manifest.package_type
        );
        for (dependency, constraint) in &manifest.requires {
            println!("  requires {} {}", dependency, constraint.as_deref().unwrap_or("*"));
        }
    }

    let index = InheritanceIndex::build(&graph, &YamlLoader::default())?;
    if !index.edges().is_empty() {
        println!();
        println!("{}", "Inheritance:".bold());
        for edge in index.edges() {
            println!(
                "  {} <- {} ({} extends {})",
                edge.parent, edge.child, edge.class, edge.base_class
            );
        }
    }

    Ok(())
}
