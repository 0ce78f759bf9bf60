//! Data types (config + change metadata) for layerguard.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Schema Identifiers ─────────────────────────────────────────
pub const CHANGE_SCHEMA_V1: &str = "layerguard.change.v1";

// ── Frozen Vocabulary ──────────────────────────────────────────
/// Target-layer sentinel meaning "every known layer".
pub const ALL_LAYERS: &str = "all";

/// Synthetic layer that is always part of the checklist.
pub const APPLICATION_LAYER: &str = "application";

pub const DEFAULT_BASE: &str = "main";
pub const DEFAULT_HEAD: &str = "HEAD";
pub const DEFAULT_OUTPUT: &str = "change-metadata.json";

/// How far-reaching a change is. Ordered `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    pub const ALL: [ImpactLevel; 4] = [
        ImpactLevel::Low,
        ImpactLevel::Medium,
        ImpactLevel::High,
        ImpactLevel::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImpactLevel::Low => "LOW",
            ImpactLevel::Medium => "MEDIUM",
            ImpactLevel::High => "HIGH",
            ImpactLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownImpactLevel(pub String);

impl fmt::Display for UnknownImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown impact level '{}' (expected LOW, MEDIUM, HIGH or CRITICAL)",
            self.0
        )
    }
}

impl std::error::Error for UnknownImpactLevel {}

impl FromStr for ImpactLevel {
    type Err = UnknownImpactLevel;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ImpactLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownImpactLevel(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

impl ToolMeta {
    pub fn current() -> Self {
        Self {
            name: "layerguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The revision range a changeset was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiffMeta {
    pub base: String,
    pub head: String,
}

// ============================================================================
// Configuration
// ============================================================================

/// The on-disk configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ConfigFile {
    /// Include other config files. Paths are relative to this config file's directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    /// Known deployable layers, in declaration order. `application` is implied.
    #[serde(default)]
    pub layers: Vec<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub exclusions: Exclusions,

    /// Ordered mapping rules. The first rule with a matching pattern wins.
    #[serde(default)]
    pub rule: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,

    /// Where `detect` writes its metadata document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Paths that never produce a match record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Exclusions {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// A mapping rule as written in the config file.
///
/// Required fields are optional here so that the catalog compiler can report
/// which rule is incomplete instead of a bare parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Path globs. `**` crosses directory separators, `*` does not.
    #[serde(default)]
    pub patterns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// One of LOW, MEDIUM, HIGH, CRITICAL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_level: Option<String>,

    /// Known layer names, or `["all"]`.
    #[serde(default)]
    pub target_layers: Vec<String>,

    #[serde(default)]
    pub required_actions: Vec<String>,
}

impl ConfigFile {
    /// Starter configuration written by `layerguard init`.
    pub fn starter() -> Self {
        let layers = ["vpc_layer", "s3_layer", "ec2_layer", "lambda_layer"];
        Self {
            includes: vec![],
            layers: layers.iter().map(|l| l.to_string()).collect(),
            defaults: Defaults {
                base: Some(DEFAULT_BASE.to_string()),
                head: Some(DEFAULT_HEAD.to_string()),
                output: Some(DEFAULT_OUTPUT.to_string()),
                strict: Some(false),
            },
            exclusions: Exclusions {
                patterns: vec![
                    "**/*.md".to_string(),
                    "docs/**".to_string(),
                    ".github/**".to_string(),
                ],
            },
            rule: vec![
                RuleConfig {
                    id: "shared_library".to_string(),
                    description: Some("Code shared by every deployable unit".to_string()),
                    patterns: vec!["lib/**".to_string()],
                    resource_type: Some("shared_library".to_string()),
                    impact_level: Some("CRITICAL".to_string()),
                    target_layers: vec![ALL_LAYERS.to_string()],
                    required_actions: vec![
                        "rebuild_all_artifacts".to_string(),
                        "run_full_test_suite".to_string(),
                    ],
                },
                RuleConfig {
                    id: "network".to_string(),
                    description: Some("VPC, subnets and security groups".to_string()),
                    patterns: vec!["infrastructure/vpc/**".to_string()],
                    resource_type: Some("vpc".to_string()),
                    impact_level: Some("HIGH".to_string()),
                    target_layers: vec!["vpc_layer".to_string()],
                    required_actions: vec!["review_network_changes".to_string()],
                },
                RuleConfig {
                    id: "storage".to_string(),
                    description: None,
                    patterns: vec!["infrastructure/s3/**".to_string()],
                    resource_type: Some("s3_bucket".to_string()),
                    impact_level: Some("MEDIUM".to_string()),
                    target_layers: vec!["s3_layer".to_string()],
                    required_actions: vec![],
                },
                RuleConfig {
                    id: "compute".to_string(),
                    description: None,
                    patterns: vec!["infrastructure/ec2/**".to_string()],
                    resource_type: Some("ec2_instance".to_string()),
                    impact_level: Some("HIGH".to_string()),
                    target_layers: vec!["ec2_layer".to_string()],
                    required_actions: vec![],
                },
                RuleConfig {
                    id: "lambda_source".to_string(),
                    description: Some("Lambda handler sources".to_string()),
                    patterns: vec!["lambda-*/src/**".to_string(), "lambda/**".to_string()],
                    resource_type: Some("lambda_function".to_string()),
                    impact_level: Some("HIGH".to_string()),
                    target_layers: vec!["lambda_layer".to_string()],
                    required_actions: vec!["package_lambda".to_string()],
                },
                RuleConfig {
                    id: "application".to_string(),
                    description: Some("Application stack templates".to_string()),
                    patterns: vec!["application*/**".to_string()],
                    resource_type: Some("application_stack".to_string()),
                    impact_level: Some("LOW".to_string()),
                    target_layers: vec![APPLICATION_LAYER.to_string()],
                    required_actions: vec![],
                },
            ],
        }
    }
}

// ============================================================================
// Pipeline output
// ============================================================================

/// One changed path classified by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchRecord {
    pub file: String,
    /// Id of the rule that claimed this path.
    pub rule_id: String,
    pub resource_type: String,
    pub impact_level: ImpactLevel,
    pub target_layers: Vec<String>,
    #[serde(default)]
    pub required_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MatchRecord {
    pub fn targets_all_layers(&self) -> bool {
        self.target_layers.iter().any(|l| l == ALL_LAYERS)
    }
}

/// Layer name -> "must be redeployed".
pub type Checklist = BTreeMap<String, bool>;

/// Result of aggregating one changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChangeMetadata {
    pub schema: String,
    pub tool: ToolMeta,
    /// Revision range, when the changeset came from version control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffMeta>,
    /// Label of the configuration the catalog was loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    /// Every layer the checklist is keyed by, `application` included.
    pub layers: Vec<String>,
    pub changed_files_count: u32,
    pub changed_files: Vec<String>,
    pub affected_resources: Vec<MatchRecord>,
    #[serde(default)]
    pub affected_rules: Vec<String>,
    #[serde(default)]
    pub excluded_files: Vec<String>,
    #[serde(default)]
    pub unmatched_files: Vec<String>,
    pub deployment_checklist: Checklist,
    pub required_actions: Vec<String>,
    /// Absent when nothing matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_level: Option<ImpactLevel>,
}

/// Change metadata decorated with orchestrator condition flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnhancedMetadata {
    #[serde(flatten)]
    pub change: ChangeMetadata,
    pub cloudformation_conditions: BTreeMap<String, bool>,
    pub has_affected_resources: bool,
    pub has_deployments: bool,
    /// Set once the document has been validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub problems: Vec<String>,
    /// Reported but never affect `is_valid`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn from_problems(problems: Vec<String>) -> Self {
        Self {
            is_valid: problems.is_empty(),
            problems,
            warnings: vec![],
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}
