//! Import runs against an in-memory repository and catalog

mod common;

use appcat_package::{
    ConflictAction, ImportPipeline, ImportRef, ImportState, InteractivePolicy, PackageData,
    PackageReference, PackageSaver, PresetPolicy,
};
use common::{package_zip, MockCatalog, MockRepo, ScriptedPrompter, BASE_URL};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

const TWO_APP_BUNDLE: &str =
    r#"{"Packages":[{"Name":"first_app"},{"Name":"second_app","Version":"1.0"}]}"#;

fn package(name: &str) -> ImportRef {
    ImportRef::Package(PackageReference::named(name))
}

fn bundle_repo(bundle: &str) -> MockRepo {
    MockRepo::new().with_file(
        &format!("{}/bundles/apps.bundle", BASE_URL),
        bundle.as_bytes().to_vec(),
    )
}

fn preset(action: ConflictAction) -> PresetPolicy {
    PresetPolicy::new(action)
}

mod single_package {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_creates_dependencies_before_root() {
        let repo = MockRepo::new()
            .with_package("io.example.App", &[("io.example.Lib", None)])
            .with_package("io.example.Lib", &[]);
        let catalog = MockCatalog::new();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.App")], &mut preset(ConflictAction::Skip));

        assert_eq!(catalog.create_calls(), vec!["io.example.Lib", "io.example.App"]);
        assert_eq!(report.created.len(), 2);
        assert!(!report.is_failure());
        assert!(report.outcomes[0].is_dependency);
    }

    #[test]
    fn test_skip_keeps_existing_package() {
        let repo = MockRepo::new().with_package("io.example.App", &[]);
        let catalog = MockCatalog::new().with_existing("io.example.App");

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.App")], &mut preset(ConflictAction::Skip));

        assert_eq!(catalog.create_calls().len(), 1);
        assert!(catalog.delete_calls().is_empty());
        assert_eq!(report.skipped, vec!["io.example.App".to_string()]);
        assert!(report.created.is_empty());
        assert!(!report.is_failure());
    }

    #[test]
    fn test_update_deletes_then_retries_once() {
        let repo = MockRepo::new().with_package("io.example.App", &[]);
        let catalog = MockCatalog::new().with_existing("io.example.App");

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.App")], &mut preset(ConflictAction::Update));

        assert_eq!(catalog.delete_calls(), vec!["old-io.example.App"]);
        assert_eq!(catalog.create_calls().len(), 2);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].id, "id-io.example.App");
    }

    #[test]
    fn test_update_second_conflict_is_hard_failure() {
        let repo = MockRepo::new().with_package("io.example.App", &[]);
        let catalog = MockCatalog::new().with_existing("io.example.App").racing();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.App")], &mut preset(ConflictAction::Update));

        assert_eq!(catalog.create_calls().len(), 2);
        assert_eq!(catalog.delete_calls().len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.is_failure());
        assert!(!report.aborted);
    }

    #[test]
    fn test_update_of_foreign_package_fails() {
        let repo = MockRepo::new().with_package("io.example.App", &[]);
        let catalog = MockCatalog::new().with_foreign("io.example.App");

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.App")], &mut preset(ConflictAction::Update));

        assert!(catalog.delete_calls().is_empty());
        assert!(report.failed[0].1.contains("another tenant"));
    }

    #[test]
    fn test_dependency_action_applies_to_dependencies_only() {
        let repo = MockRepo::new()
            .with_package("io.example.App", &[("io.example.Lib", None)])
            .with_package("io.example.Lib", &[]);
        let catalog = MockCatalog::new()
            .with_existing("io.example.App")
            .with_existing("io.example.Lib");
        let mut policy =
            PresetPolicy::new(ConflictAction::Update).with_dependency_action(ConflictAction::Skip);

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.App")], &mut policy);

        assert_eq!(catalog.delete_calls(), vec!["old-io.example.App"]);
        assert_eq!(report.skipped, vec!["io.example.Lib".to_string()]);
        assert_eq!(report.created.len(), 1);
    }

    #[test]
    fn test_package_data_sent_with_create() {
        let repo = MockRepo::new().with_package("io.example.App", &[]);
        let catalog = MockCatalog::new();
        let data = PackageData {
            is_public: true,
            categories: vec!["Web".into()],
        };

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .with_package_data(data.clone())
            .run(&[package("io.example.App")], &mut preset(ConflictAction::Skip));

        assert_eq!(*catalog.data.borrow(), vec![data]);
        assert!(report.created[0].is_public);
    }

    #[test]
    fn test_unresolvable_root_fails_run() {
        let repo = MockRepo::new();
        let catalog = MockCatalog::new();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.Missing")], &mut preset(ConflictAction::Skip));

        assert!(catalog.create_calls().is_empty());
        assert!(matches!(
            report.outcomes[0].state,
            ImportState::ResolutionFailed(_)
        ));
        assert!(report.is_failure());
    }

    #[test]
    fn test_missing_dependency_blocks_dependents() {
        let repo = MockRepo::new().with_package("io.example.App", &[("io.example.Gone", None)]);
        let catalog = MockCatalog::new();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[package("io.example.App")], &mut preset(ConflictAction::Skip));

        assert!(catalog.create_calls().is_empty());
        assert!(report.failed[0].1.contains("io.example.Gone"));
    }
}

mod bundles {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_two_app_bundle_creates_both() {
        let repo = bundle_repo(TWO_APP_BUNDLE)
            .with_package("first_app", &[])
            .with_file(
                &format!("{}/apps/second_app.1.0.zip", BASE_URL),
                package_zip("second_app", "1.0", &[]),
            );
        let catalog = MockCatalog::new();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL).run(
            &[ImportRef::Bundle("apps".into())],
            &mut preset(ConflictAction::Skip),
        );

        let created: HashSet<String> = catalog.create_calls().into_iter().collect();
        assert_eq!(
            created,
            HashSet::from(["first_app".to_string(), "second_app".to_string()])
        );
        assert_eq!(report.roots_total, 2);
        assert!(!report.is_failure());
    }

    #[test]
    fn test_missing_entry_does_not_stop_bundle() {
        let repo = bundle_repo(TWO_APP_BUNDLE).with_package("first_app", &[]);
        let catalog = MockCatalog::new();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL).run(
            &[ImportRef::Bundle("apps".into())],
            &mut preset(ConflictAction::Skip),
        );

        assert_eq!(catalog.create_calls(), vec!["first_app"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "second_app");
        assert_eq!(report.roots_failed, 1);
        assert!(!report.is_failure());
    }

    #[test]
    fn test_abort_stops_later_entries() {
        let repo = bundle_repo(r#"{"Packages":[{"Name":"first_app"},{"Name":"second_app"}]}"#)
            .with_package("first_app", &[])
            .with_package("second_app", &[]);
        let catalog = MockCatalog::new().with_existing("first_app");

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL).run(
            &[ImportRef::Bundle("apps".into())],
            &mut preset(ConflictAction::Abort),
        );

        assert_eq!(catalog.create_calls(), vec!["first_app"]);
        assert!(report.aborted);
        assert!(report.is_failure());
        assert!(matches!(
            report.outcomes.last().map(|o| &o.state),
            Some(ImportState::Aborted)
        ));
    }

    #[test]
    fn test_missing_bundle_is_reported() {
        let repo = MockRepo::new();
        let catalog = MockCatalog::new();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL).run(
            &[ImportRef::Bundle("nope".into())],
            &mut preset(ConflictAction::Skip),
        );

        assert!(report.failed[0].1.contains("nope.bundle"));
        assert!(report.is_failure());
    }

    #[test]
    fn test_shared_dependency_created_once_per_run() {
        let repo = bundle_repo(r#"{"Packages":[{"Name":"a"},{"Name":"b"}]}"#)
            .with_package("a", &[("lib", None)])
            .with_package("b", &[("lib", None)])
            .with_package("lib", &[]);
        let catalog = MockCatalog::new();

        ImportPipeline::new(&repo, &catalog, BASE_URL).run(
            &[ImportRef::Bundle("apps".into())],
            &mut preset(ConflictAction::Skip),
        );

        assert_eq!(catalog.create_calls(), vec!["lib", "a", "b"]);
    }

    #[test]
    fn test_local_bundle_uses_neighbouring_packages() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("local.bundle");
        fs::write(&bundle, r#"{"Packages":[{"Name":"io.example.Local"}]}"#).unwrap();
        fs::write(
            temp.path().join("io.example.Local.zip"),
            package_zip("io.example.Local", "1.0", &[]),
        )
        .unwrap();
        let repo = MockRepo::new();
        let catalog = MockCatalog::new();

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL).run(
            &[ImportRef::Bundle(bundle.display().to_string())],
            &mut preset(ConflictAction::Skip),
        );

        assert_eq!(catalog.create_calls(), vec!["io.example.Local"]);
        assert!(repo.requests.borrow().is_empty());
        assert!(!report.is_failure());
    }
}

mod saving {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_save_writes_package_and_dependencies() {
        let temp = TempDir::new().unwrap();
        let repo = MockRepo::new()
            .with_package("io.example.App", &[("io.example.Lib", None)])
            .with_package("io.example.Lib", &[]);

        let report = PackageSaver::new(&repo, BASE_URL)
            .save(&[package("io.example.App")], temp.path())
            .unwrap();

        assert_eq!(report.saved.len(), 2);
        assert!(temp.path().join("io.example.App.zip").is_file());
        assert!(temp.path().join("io.example.Lib.zip").is_file());
    }

    #[test]
    fn test_save_bundle_writes_descriptor() {
        let temp = TempDir::new().unwrap();
        let repo = bundle_repo(r#"{"Packages":[{"Name":"first_app"}]}"#).with_package("first_app", &[]);

        let report = PackageSaver::new(&repo, BASE_URL)
            .save(&[ImportRef::Bundle("apps".into())], temp.path())
            .unwrap();

        assert!(!report.is_failure());
        let written = fs::read_to_string(temp.path().join("apps.bundle")).unwrap();
        assert!(written.contains("first_app"));
        assert!(temp.path().join("first_app.zip").is_file());
    }
}

mod interactive {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_existing_apps() -> (MockRepo, MockCatalog) {
        let repo = bundle_repo(r#"{"Packages":[{"Name":"first_app"},{"Name":"second_app"}]}"#)
            .with_package("first_app", &[])
            .with_package("second_app", &[]);
        let catalog = MockCatalog::new()
            .with_existing("first_app")
            .with_existing("second_app");
        (repo, catalog)
    }

    #[test]
    fn test_interrupted_prompt_ends_run() {
        let (repo, catalog) = two_existing_apps();
        let mut prompter = ScriptedPrompter::new(&[]);
        let mut policy = InteractivePolicy::new(&mut prompter);

        let report = ImportPipeline::new(&repo, &catalog, BASE_URL)
            .run(&[ImportRef::Bundle("apps".into())], &mut policy);
        drop(policy);

        assert_eq!(prompter.asked, 1);
        assert_eq!(catalog.create_calls(), vec!["first_app"]);
        assert!(report.aborted);
        assert!(report.is_failure());
        assert!(report.failed.is_empty());
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].state, ImportState::Aborted);
    }

    #[test]
    fn test_apply_to_all_lasts_for_one_run() {
        let (repo, catalog) = two_existing_apps();
        let mut prompter = ScriptedPrompter::new(&["S", "s", "s"]);
        let mut policy = InteractivePolicy::new(&mut prompter);
        let pipeline = ImportPipeline::new(&repo, &catalog, BASE_URL);
        let bundle = [ImportRef::Bundle("apps".into())];

        let first = pipeline.run(&bundle, &mut policy);
        assert_eq!(first.skipped, vec!["first_app", "second_app"]);

        let second = pipeline.run(&bundle, &mut policy);
        assert_eq!(second.skipped, vec!["first_app", "second_app"]);
        drop(policy);

        // One prompt in the first run, one per conflict in the second
        assert_eq!(prompter.asked, 3);
        assert!(!first.is_failure());
        assert!(!second.is_failure());
    }
}
