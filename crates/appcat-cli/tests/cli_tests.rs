//! CLI integration tests
//!
//! Everything here runs offline: packages come from local directories and
//! network-bound commands are made to fail before any request.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

/// `appcat` isolated from the user's config and environment
fn appcat(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("appcat").unwrap();
    cmd.env("APPCAT_CONFIG", home.join("config.toml"))
        .env_remove("APPCAT_CATALOG_URL")
        .env_remove("APPCAT_REPO_URL")
        .env_remove("APPCAT_TOKEN")
        .env_remove("APPCAT_EXISTS_ACTION")
        .env_remove("APPCAT_DEP_EXISTS_ACTION")
        .env_remove("RUST_LOG");
    cmd
}

fn create_package_dir(parent: &Path, full_name: &str, manifest_extra: &str) -> std::path::PathBuf {
    let dir = parent.join(full_name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("manifest.yaml"),
        format!(
            "Format: MuranoPL/1.0\nType: Application\nFullName: {}\nVersion: 1.0\n{}",
            full_name, manifest_extra
        ),
    )
    .unwrap();
    dir
}

// ============================================================================
// Help and completions
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    appcat(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("package-import"))
        .stdout(predicate::str::contains("bundle-import"))
        .stdout(predicate::str::contains("package-save"));
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    appcat(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("appcat"));
}

// ============================================================================
// Offline commands
// ============================================================================

#[test]
fn test_package_save_from_local_directory() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let package = create_package_dir(work.path(), "io.example.Local", "");
    let out = work.path().join("out");

    appcat(home.path())
        .arg("package-save")
        .arg(&package)
        .arg("--path")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("saved"));

    assert!(out.join("io.example.Local.zip").is_file());
}

#[test]
fn test_package_deps_uses_configured_local_path() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let app = create_package_dir(work.path(), "io.example.App", "Require:\n  io.example.Lib:\n");
    create_package_dir(work.path(), "io.example.Lib", "");
    fs::write(
        home.path().join("config.toml"),
        format!(
            "[repository]\nurl = \"\"\nlocal_path = {:?}\n",
            work.path().display().to_string()
        ),
    )
    .unwrap();

    appcat(home.path())
        .arg("package-deps")
        .arg(&app)
        .assert()
        .success()
        .stdout(predicate::str::contains("io.example.App 1.0"))
        .stdout(predicate::str::contains("requires io.example.Lib *"))
        .stdout(predicate::str::contains("io.example.Lib 1.0"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_import_without_catalog_url() {
    let home = TempDir::new().unwrap();
    appcat(home.path())
        .args(["package-import", "io.example.App"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No catalog URL"));
}

#[test]
fn test_import_with_empty_repository_fails_run() {
    let home = TempDir::new().unwrap();
    appcat(home.path())
        .args([
            "package-import",
            "io.example.Missing",
            "--catalog-url",
            "http://127.0.0.1:9",
            "--repo-url",
            "",
            "--exists-action",
            "s",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No base_url for repository supplied"));
}

#[test]
fn test_invalid_exists_action_in_environment() {
    let home = TempDir::new().unwrap();
    appcat(home.path())
        .env("APPCAT_EXISTS_ACTION", "replace")
        .args(["package-save", "x", "--path", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("APPCAT_EXISTS_ACTION"));
}

#[test]
fn test_invalid_exists_action_flag() {
    let home = TempDir::new().unwrap();
    appcat(home.path())
        .args(["bundle-import", "webapps", "--exists-action", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid exists action"));
}
