use anyhow::{Context, Result};
use appcat_config::{ConfigLoader, Settings};
use appcat_package::ConflictAction;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod logger;

/// Application catalog package importer.
///
/// Resolves application packages and bundles from local files, URLs or a
/// package repository, together with everything they require, and imports
/// them into an application catalog.
///
/// EXAMPLES:
///     appcat package-import io.murano.apps.Apache      Import from the repository
///     appcat package-import ./MyApp.zip --exists-action u
///     appcat bundle-import webapps                     Import a repository bundle
///     appcat package-save io.murano.apps.Apache --path ./out
///     appcat package-deps ./MyApp                      Show what a package pulls in
///
/// ENVIRONMENT VARIABLES:
///     APPCAT_CATALOG_URL        Catalog API endpoint
///     APPCAT_REPO_URL           Package repository base URL
///     APPCAT_TOKEN              Auth token sent with catalog requests
///     APPCAT_EXISTS_ACTION      Default action for existing packages (s/u/a)
///     APPCAT_DEP_EXISTS_ACTION  Same, for dependencies
///     RUST_LOG                  Log filter (overrides --verbose/--debug)
#[derive(Parser)]
#[command(name = "appcat")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Catalog API endpoint
    #[arg(long, global = true)]
    catalog_url: Option<String>,

    /// Package repository base URL
    #[arg(long, global = true)]
    repo_url: Option<String>,

    /// Configuration file (default: ~/.appcat/config.toml)
    #[arg(long, global = true, env = "APPCAT_CONFIG")]
    config: Option<PathBuf>,

    /// Show progress logs
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Show debug logs
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import packages and their requirements
    ///
    /// Each argument is a local file or directory, an http(s) URL, or a
    /// package name looked up in the repository.
    ///
    /// EXAMPLES:
    ///     appcat package-import io.murano.apps.Apache --package-version 1.0
    ///     appcat package-import app.zip --is-public --categories Web
    PackageImport {
        /// Package files, URLs or names
        #[arg(required = true)]
        packages: Vec<String>,
        /// Version of the package to fetch from the repository
        #[arg(long)]
        package_version: Option<String>,
        /// Categories for the imported packages
        #[arg(long, num_args = 1..)]
        categories: Vec<String>,
        /// Make the packages public
        #[arg(long)]
        is_public: bool,
        /// Action for existing packages: s(kip), u(pdate), a(bort)
        #[arg(long)]
        exists_action: Option<ConflictAction>,
        /// Action for existing dependencies (defaults to --exists-action)
        #[arg(long)]
        dep_exists_action: Option<ConflictAction>,
    },

    /// Import bundles of packages
    ///
    /// EXAMPLES:
    ///     appcat bundle-import webapps
    ///     appcat bundle-import ./my.bundle --exists-action s
    BundleImport {
        /// Bundle files, URLs or names
        #[arg(required = true)]
        bundles: Vec<String>,
        /// Make the packages public
        #[arg(long)]
        is_public: bool,
        /// Action for existing packages: s(kip), u(pdate), a(bort)
        #[arg(long)]
        exists_action: Option<ConflictAction>,
        /// Action for existing dependencies (defaults to --exists-action)
        #[arg(long)]
        dep_exists_action: Option<ConflictAction>,
    },

    /// Download packages and their requirements to a directory
    PackageSave {
        /// Package names, files or URLs
        #[arg(required = true)]
        packages: Vec<String>,
        /// Target directory
        #[arg(long)]
        path: PathBuf,
        /// Version of the package to fetch from the repository
        #[arg(long)]
        package_version: Option<String>,
    },

    /// Download a bundle and all its packages to a directory
    BundleSave {
        /// Bundle file, URL or name
        bundle: String,
        /// Target directory
        #[arg(long)]
        path: PathBuf,
    },

    /// Show the requirement graph and class inheritance of a package
    PackageDeps {
        /// Package file, URL or name
        package: String,
        /// Version of the package to fetch from the repository
        #[arg(long)]
        package_version: Option<String>,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     appcat completions bash > ~/.local/share/bash-completion/completions/appcat
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_config_path(path),
        None => ConfigLoader::new(),
    };
    let mut settings = loader.load().context("Failed to load configuration")?;

    if let Some(url) = &cli.catalog_url {
        settings.catalog_url = Some(url.clone());
    }
    if let Some(url) = &cli.repo_url {
        settings.repo_url = url.clone();
    }
    Ok(settings)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose, cli.debug);

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let settings = load_settings(&cli)?;

    let failed = match cli.command {
        Commands::PackageImport {
            packages,
            package_version,
            categories,
            is_public,
            exists_action,
            dep_exists_action,
        } => {
            let args = commands::import::ImportArgs {
                packages,
                bundles: Vec::new(),
                package_version,
                categories,
                is_public,
                exists_action,
                dep_exists_action,
            };
            commands::import::run(args, &settings)?
        }
        Commands::BundleImport {
            bundles,
            is_public,
            exists_action,
            dep_exists_action,
        } => {
            let args = commands::import::ImportArgs {
                bundles,
                is_public,
                exists_action,
                dep_exists_action,
                ..Default::default()
            };
            commands::import::run(args, &settings)?
        }
        Commands::PackageSave {
            packages,
            path,
            package_version,
        } => {
            let refs = commands::package_refs(&packages, package_version.as_deref());
            commands::save::run(refs, &path, &settings)?
        }
        Commands::BundleSave { bundle, path } => {
            let refs = vec![appcat_package::ImportRef::Bundle(bundle)];
            commands::save::run(refs, &path, &settings)?
        }
        Commands::PackageDeps {
            package,
            package_version,
        } => {
            commands::deps::run(&package, package_version.as_deref(), &settings)?;
            false
        }
        Commands::Completions { .. } => false,
    };

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
