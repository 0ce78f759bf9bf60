//! Proptest strategies for generating valid test inputs.
//!
//! Strategies are constructive: every generated glob compiles and every rule
//! targets only layers declared by the same config, so a generated
//! [`ConfigFile`] always builds a catalog.
//!
//! Paths and globs are drawn from a small shared vocabulary of directory names
//! so that generated changesets actually hit generated rules and exclusions.

use layerguard_types::{ConfigFile, Defaults, Exclusions, ImpactLevel, RuleConfig, ALL_LAYERS};
use proptest::prelude::*;

/// Maximum number of paths in a generated changeset
pub const MAX_PATHS: usize = 12;

/// Maximum number of rules in a generated config
pub const MAX_RULES: usize = 6;

/// Maximum number of declared layers in a generated config
pub const MAX_LAYERS: usize = 4;

const DIRS: &[&str] = &[
    "lib",
    "lambda",
    "lambda-a",
    "infrastructure",
    "vpc",
    "src",
    "docs",
    "config",
    "application",
];

const EXTENSIONS: &[&str] = &["py", "ts", "yaml", "json", "md", "sh"];

pub fn arb_impact_level() -> impl Strategy<Value = ImpactLevel> {
    prop::sample::select(ImpactLevel::ALL.to_vec())
}

pub fn arb_dir_name() -> impl Strategy<Value = String> {
    prop::sample::select(DIRS).prop_map(str::to_string)
}

pub fn arb_extension() -> impl Strategy<Value = String> {
    prop::sample::select(EXTENSIONS).prop_map(str::to_string)
}

/// Strategy for `<name>_layer` layer names. Distinct names always map to
/// distinct condition flags.
pub fn arb_layer_name() -> impl Strategy<Value = String> {
    "[a-z]{2,8}".prop_map(|s| format!("{s}_layer"))
}

/// A relative, forward-slash changed path such as `lambda-a/src/handler.py`.
pub fn arb_changed_path() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(arb_dir_name(), 1..4),
        "[a-z]{1,8}",
        arb_extension(),
    )
        .prop_map(|(dirs, stem, ext)| format!("{}/{stem}.{ext}", dirs.join("/")))
}

pub fn arb_changeset() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_changed_path(), 0..MAX_PATHS)
}

/// Globs built from the same vocabulary as [`arb_changed_path`].
pub fn arb_rule_glob() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_dir_name().prop_map(|d| format!("{d}/**")),
        (arb_dir_name(), arb_extension()).prop_map(|(d, e)| format!("{d}/*.{e}")),
        arb_extension().prop_map(|e| format!("**/*.{e}")),
        (arb_dir_name(), arb_dir_name()).prop_map(|(a, b)| format!("{a}/**/{b}/**")),
        arb_dir_name().prop_map(|d| format!("{d}-*/src/**")),
    ]
}

/// Target layers for a rule: either the `all` sentinel or a subset of `layers`.
pub fn arb_target_layers(layers: Vec<String>) -> impl Strategy<Value = Vec<String>> {
    let count = layers.len();
    prop_oneof![
        1 => Just(vec![ALL_LAYERS.to_string()]),
        4 => prop::sample::subsequence(layers, 0..=count),
    ]
}

fn arb_rule(id: String, layers: Vec<String>) -> impl Strategy<Value = RuleConfig> {
    (
        prop::collection::vec(arb_rule_glob(), 1..3),
        arb_impact_level(),
        arb_target_layers(layers),
        prop::collection::vec("[a-z]{3,10}", 0..3),
    )
        .prop_map(move |(patterns, impact, target_layers, required_actions)| RuleConfig {
            id: id.clone(),
            description: None,
            patterns,
            resource_type: Some(format!("{id}_resource")),
            impact_level: Some(impact.as_str().to_string()),
            target_layers,
            required_actions,
        })
}

/// A config that always compiles into a catalog.
pub fn arb_config_file() -> impl Strategy<Value = ConfigFile> {
    (
        prop::collection::btree_set(arb_layer_name(), 1..=MAX_LAYERS),
        prop::collection::vec(arb_rule_glob(), 0..3),
        0..MAX_RULES,
    )
        .prop_flat_map(|(layers, exclusions, rule_count)| {
            let layers: Vec<String> = layers.into_iter().collect();
            let rules: Vec<_> = (0..rule_count)
                .map(|i| arb_rule(format!("rule_{i}"), layers.clone()))
                .collect();
            (Just(layers), Just(exclusions), rules)
        })
        .prop_map(|(layers, exclusions, rule)| ConfigFile {
            includes: vec![],
            layers,
            defaults: Defaults::default(),
            exclusions: Exclusions {
                patterns: exclusions,
            },
            rule,
        })
}
