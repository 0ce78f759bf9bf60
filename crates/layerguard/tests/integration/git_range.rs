//! Detection over a real `base..head` commit range.

use super::test_repo::TestRepo;

/// Given: a lambda handler changes between two commits
/// When: detect runs over that range
/// Then: only the lambda layer is scheduled and the range is recorded
#[test]
fn given_lambda_change_when_detect_then_only_lambda_layer_deploys() {
    let repo = TestRepo::new();
    repo.write_file("lambda-orders/src/handler.py", "def handler(e, c):\n    pass\n");
    let head = repo.commit("add handler");

    let result = repo.run_detect(&head);
    result.assert_exit_code(0);

    let meta = result.parse_metadata();
    assert_eq!(meta.change.changed_files, vec!["lambda-orders/src/handler.py"]);
    let diff = meta.change.diff.expect("range recorded");
    assert_eq!(diff.base, repo.base_sha);
    assert_eq!(diff.head, head);

    for (layer, deploy) in &meta.change.deployment_checklist {
        assert_eq!(*deploy, layer == "lambda_layer", "layer {layer}");
    }
    assert_eq!(meta.is_valid, Some(true));
}

/// Given: no commits between base and head
/// When: detect runs
/// Then: nothing deploys and the document is valid
#[test]
fn given_empty_range_when_detect_then_no_deployment() {
    let repo = TestRepo::new();
    let base = repo.base_sha.clone();

    let result = repo.run_detect_with_args(&base, &["--strict"]);
    result.assert_exit_code(0);

    let meta = result.parse_metadata();
    assert!(meta.change.changed_files.is_empty());
    assert!(!meta.has_deployments);
    assert!(meta.cloudformation_conditions.values().all(|v| !*v));
}

/// Given: a shared library file changes
/// When: detect runs
/// Then: every layer deploys with CRITICAL impact
#[test]
fn given_shared_library_change_when_detect_then_all_layers_deploy() {
    let repo = TestRepo::new();
    repo.write_file("lib/common.py", "VERSION = 2\n");
    let head = repo.commit("touch shared code");

    let result = repo.run_detect_with_args(&head, &["--strict"]);
    result.assert_exit_code(0);

    let meta = result.parse_metadata();
    assert!(meta.change.deployment_checklist.values().all(|d| *d));
    assert_eq!(
        meta.change.impact_level.map(|l| l.as_str()),
        Some("CRITICAL")
    );
    assert_eq!(
        meta.change.required_actions,
        vec!["rebuild_all_artifacts", "run_full_test_suite"]
    );
}

/// Given: a lambda file is moved out of the lambda tree
/// When: detect runs
/// Then: the old path still schedules the lambda layer and the new path is unmatched
#[test]
fn given_rename_when_detect_then_both_paths_are_classified() {
    let repo = TestRepo::new();
    repo.write_file("lambda/legacy.py", "print('legacy')\n");
    let base = repo.commit("add legacy lambda");

    repo.rename("lambda/legacy.py", "scripts/legacy.py");
    let head = repo.commit("move legacy script");

    let out = repo.path().join("artifacts/meta.json");
    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("layerguard"))
        .current_dir(repo.path())
        .args(["detect", "--base", base.as_str(), "--head", head.as_str(), "--out"])
        .arg(&out)
        .output()
        .expect("run layerguard");
    assert!(output.status.success());

    let meta: layerguard_types::EnhancedMetadata =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(
        meta.change.changed_files,
        vec!["lambda/legacy.py", "scripts/legacy.py"]
    );
    assert_eq!(meta.change.unmatched_files, vec!["scripts/legacy.py"]);
    assert_eq!(meta.change.deployment_checklist.get("lambda_layer"), Some(&true));
}

/// Given: an unmatched file changes
/// When: detect runs with and without --strict
/// Then: only the strict run fails, and both write the document
#[test]
fn given_unmatched_file_when_strict_detect_then_exit_two() {
    let repo = TestRepo::new();
    repo.write_file("Makefile", "all:\n\ttrue\n");
    let head = repo.commit("add makefile");

    let lenient = repo.run_detect(&head);
    lenient.assert_exit_code(0);
    assert_eq!(lenient.parse_metadata().is_valid, Some(true));

    let strict = repo.run_detect_with_args(&head, &["--strict"]);
    strict.assert_exit_code(2);
    let meta = strict.parse_metadata();
    assert_eq!(meta.is_valid, Some(false));
    assert_eq!(meta.change.unmatched_files, vec!["Makefile"]);
    assert!(strict.stderr.contains("Makefile"));
}

/// Given: a base ref that does not exist
/// When: detect runs
/// Then: git's failure is reported and no document is written
#[test]
fn given_unknown_base_when_detect_then_tool_error() {
    let repo = TestRepo::new();
    let head = repo.base_sha.clone();

    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("layerguard"))
        .current_dir(repo.path())
        .args(["detect", "--base", "no-such-ref", "--head", head.as_str()])
        .output()
        .expect("run layerguard");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("git diff failed"));
    assert!(!repo.path().join("change-metadata.json").exists());
}

/// Given: the config sets base and head defaults
/// When: detect runs without --base/--head
/// Then: the configured refs are used
#[test]
fn given_config_defaults_when_detect_then_refs_come_from_config() {
    let repo = TestRepo::new();
    repo.write_file("infrastructure/s3/buckets.yaml", "Resources: {}\n");
    let head = repo.commit("add bucket");

    let mut cfg = layerguard_types::ConfigFile::starter();
    cfg.defaults.base = Some(repo.base_sha.clone());
    cfg.defaults.head = Some(head.clone());
    cfg.defaults.output = Some("out/meta.json".to_string());
    std::fs::write(
        repo.path().join("custom.toml"),
        toml::to_string_pretty(&cfg).unwrap(),
    )
    .unwrap();

    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("layerguard"))
        .current_dir(repo.path())
        .args(["detect", "--config", "custom.toml"])
        .output()
        .expect("run layerguard");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let meta: layerguard_types::EnhancedMetadata = serde_json::from_str(
        &std::fs::read_to_string(repo.path().join("out/meta.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(meta.change.changed_files, vec!["infrastructure/s3/buckets.yaml"]);
    assert_eq!(meta.change.config.as_deref(), Some("custom.toml"));
    assert_eq!(meta.cloudformation_conditions.get("DeployS3Layer"), Some(&true));
}
