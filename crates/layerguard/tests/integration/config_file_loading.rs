//! Config discovery, legacy YAML layout, includes and env expansion.

use super::test_repo::TestRepo;

const LEGACY_YAML: &str = r#"
exclusions:
  patterns:
    - "**/*.md"
resourceMappings:
  network:
    patterns: ["infrastructure/vpc/**"]
    resource_type: vpc
    impact_level: HIGH
    target_stack: vpc_layer
    required_actions: [review_network_changes]
  lambda_functions:
    patterns: ["lambda-*/src/**"]
    resource_type: lambda_function
    impact_level: HIGH
    target_stack: lambda_layer
deploymentChecklist:
  vpc_layer: false
  lambda_layer: false
  application: false
cloudFormationConditionMapping:
  vpc_layer: DeployVpcLayer
  lambda_layer: DeployLambdaLayer
  application: DeployApplicationStack
"#;

/// Given: no layerguard.toml, only config/change-detection-config.yaml in the old layout
/// When: detect runs
/// Then: the YAML config is discovered and converted
#[test]
fn given_legacy_yaml_config_when_detect_then_it_is_used() {
    let repo = TestRepo::with_initial_content(&[
        ("config/change-detection-config.yaml", LEGACY_YAML),
        ("README.md", "# infra\n"),
    ]);
    repo.write_file("infrastructure/vpc/subnets.yaml", "Resources: {}\n");
    repo.write_file("docs.md", "notes\n");
    let head = repo.commit("network change");

    let result = repo.run_detect_with_args(&head, &["--strict"]);
    result.assert_exit_code(0);

    let meta = result.parse_metadata();
    assert_eq!(
        meta.change.config.as_deref(),
        Some("config/change-detection-config.yaml")
    );
    assert_eq!(meta.change.layers, vec!["vpc_layer", "lambda_layer", "application"]);
    assert_eq!(meta.change.deployment_checklist.get("vpc_layer"), Some(&true));
    assert_eq!(meta.change.deployment_checklist.get("lambda_layer"), Some(&false));
    assert_eq!(meta.change.excluded_files, vec!["docs.md"]);
    assert_eq!(meta.change.affected_rules, vec!["network"]);
}

/// Given: a config that includes a shared rule file
/// When: detect runs
/// Then: included rules apply
#[test]
fn given_included_rules_when_detect_then_they_apply() {
    let repo = TestRepo::with_initial_content(&[
        (
            "layerguard.toml",
            r#"
includes = ["config/shared.toml"]
layers = ["lambda_layer"]

[[rule]]
id = "lambda"
patterns = ["lambda/**"]
resource_type = "lambda_function"
impact_level = "HIGH"
target_layers = ["lambda_layer"]
"#,
        ),
        (
            "config/shared.toml",
            r#"
layers = ["ec2_layer"]

[[rule]]
id = "compute"
patterns = ["infrastructure/ec2/**"]
resource_type = "ec2_instance"
impact_level = "MEDIUM"
target_layers = ["ec2_layer"]
"#,
        ),
    ]);
    repo.write_file("infrastructure/ec2/web.yaml", "Resources: {}\n");
    let head = repo.commit("ec2 change");

    let result = repo.run_detect(&head);
    result.assert_exit_code(0);

    let meta = result.parse_metadata();
    assert_eq!(meta.change.layers, vec!["ec2_layer", "lambda_layer", "application"]);
    assert_eq!(meta.cloudformation_conditions.get("DeployEc2Layer"), Some(&true));
    assert_eq!(meta.cloudformation_conditions.get("DeployLambdaLayer"), Some(&false));
}

/// Given: a config referencing an unset environment variable without default
/// When: detect runs
/// Then: it fails with a config error naming the variable
#[test]
fn given_unset_env_var_when_detect_then_config_error() {
    let repo = TestRepo::with_initial_content(&[(
        "layerguard.toml",
        "[defaults]\nbase = \"${LAYERGUARD_TEST_SURELY_UNSET_BASE}\"\n",
    )]);

    let result = repo.run_detect(&repo.base_sha.clone());
    result.assert_exit_code(1);
    assert!(result.stderr.contains("LAYERGUARD_TEST_SURELY_UNSET_BASE"));
    assert!(result.metadata.is_none());
}

/// Given: a rule targeting a layer that is not declared
/// When: detect runs
/// Then: the catalog is rejected before git is consulted
#[test]
fn given_unknown_target_layer_when_detect_then_config_error() {
    let repo = TestRepo::with_initial_content(&[(
        "layerguard.toml",
        r#"
layers = ["vpc_layer"]

[[rule]]
id = "lambda"
patterns = ["lambda/**"]
resource_type = "lambda_function"
impact_level = "HIGH"
target_layers = ["lambda_layer"]
"#,
    )]);

    let result = repo.run_detect(&repo.base_sha.clone());
    result.assert_exit_code(1);
    assert!(result.stderr.contains("invalid config"));
    assert!(result.stderr.contains("lambda_layer"));
}
