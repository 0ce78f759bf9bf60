//! Common test fixtures for layerguard.
//!
//! Sample configs modeled on a four-layer serverless stack (VPC, S3, EC2,
//! Lambda) plus the synthetic `application` layer, and changesets that exercise
//! each pipeline outcome.

use layerguard_types::{ConfigFile, Defaults, Exclusions, RuleConfig, ALL_LAYERS};

fn rule(
    id: &str,
    patterns: &[&str],
    resource_type: &str,
    impact: &str,
    targets: &[&str],
    actions: &[&str],
) -> RuleConfig {
    RuleConfig {
        id: id.to_string(),
        description: None,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        resource_type: Some(resource_type.to_string()),
        impact_level: Some(impact.to_string()),
        target_layers: targets.iter().map(|t| t.to_string()).collect(),
        required_actions: actions.iter().map(|a| a.to_string()).collect(),
    }
}

/// Sample configuration files.
pub mod sample_configs {
    use super::*;

    pub const FOUR_LAYERS: [&str; 4] = ["vpc_layer", "s3_layer", "ec2_layer", "lambda_layer"];

    /// No layers, no rules. Only `application` is known.
    pub fn empty() -> ConfigFile {
        ConfigFile::default()
    }

    /// The config written by `layerguard init`.
    pub fn starter() -> ConfigFile {
        ConfigFile::starter()
    }

    /// Four layers, one Lambda rule.
    pub fn lambda_only() -> ConfigFile {
        ConfigFile {
            layers: FOUR_LAYERS.iter().map(|l| l.to_string()).collect(),
            rule: vec![rule(
                "lambda_source",
                &["lambda-*/src/**"],
                "lambda_function",
                "HIGH",
                &["lambda_layer"],
                &[],
            )],
            ..ConfigFile::default()
        }
    }

    /// Four layers with a CRITICAL shared-library rule declared first.
    pub fn shared_library(actions: &[&str]) -> ConfigFile {
        ConfigFile {
            layers: FOUR_LAYERS.iter().map(|l| l.to_string()).collect(),
            defaults: Defaults::default(),
            exclusions: Exclusions {
                patterns: vec!["**/*.md".to_string()],
            },
            rule: vec![
                rule(
                    "shared_library",
                    &["lib/**"],
                    "shared_library",
                    "CRITICAL",
                    &[ALL_LAYERS],
                    actions,
                ),
                rule(
                    "lambda_source",
                    &["lambda-*/src/**", "lib/lambda/**"],
                    "lambda_function",
                    "HIGH",
                    &["lambda_layer"],
                    &["package_lambda"],
                ),
            ],
            includes: vec![],
        }
    }

    /// A rule with no target layers: matches without scheduling a deployment.
    pub fn informational() -> ConfigFile {
        ConfigFile {
            layers: FOUR_LAYERS.iter().map(|l| l.to_string()).collect(),
            rule: vec![rule(
                "app_config",
                &["config/**"],
                "app_config",
                "LOW",
                &[],
                &[],
            )],
            ..ConfigFile::default()
        }
    }
}

/// Sample changed-path lists.
pub mod sample_changesets {
    pub fn lambda_handler() -> Vec<String> {
        vec!["lambda-a/src/handler.py".to_string()]
    }

    pub fn shared_library() -> Vec<String> {
        vec!["lib/common.py".to_string()]
    }

    /// Paths that no starter rule claims or that are excluded.
    pub fn docs_only() -> Vec<String> {
        vec![
            "README.md".to_string(),
            "docs/architecture.md".to_string(),
            ".github/workflows/ci.yml".to_string(),
        ]
    }

    /// One path per starter rule, plus an excluded and an unmatched path.
    pub fn mixed() -> Vec<String> {
        [
            "infrastructure/vpc/main.yaml",
            "infrastructure/s3/buckets.yaml",
            "lambda-orders/src/handler.py",
            "docs/runbook.md",
            "Makefile",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect()
    }

    /// `git diff --name-status -M` output with a rename out of the Lambda tree.
    pub fn name_status_with_rename() -> &'static str {
        "M\tinfrastructure/ec2/instances.yaml\nR091\tlambda/legacy.py\tscripts/legacy.py\nA\tREADME.md\n"
    }
}
