//! Configuration loading with include resolution.
//!
//! - TOML or YAML, chosen by file extension
//! - `includes` compose configs from multiple files, relative to the including file
//! - Circular include detection and a depth limit
//! - Order-preserving merge: included rules first, a repeated rule id replaces
//!   the earlier rule in place
//!
//! YAML files written in the older `resourceMappings` layout are converted to
//! the current shape on load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use layerguard_types::{ConfigFile, Defaults, Exclusions, RuleConfig};

/// Maximum depth for include resolution.
const MAX_INCLUDE_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml` / `.yml` are YAML; anything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

/// Load a configuration file and everything it includes.
///
/// `expand_env` runs over each file's raw text before parsing.
pub fn load_config_with_includes<F>(path: &Path, expand_env: F) -> Result<ConfigFile>
where
    F: Fn(&str) -> Result<String> + Copy,
{
    let mut stack = HashSet::new();
    load_config_recursive(path, expand_env, &mut stack, 0)
}

fn load_config_recursive<F>(
    path: &Path,
    expand_env: F,
    stack: &mut HashSet<PathBuf>,
    depth: usize,
) -> Result<ConfigFile>
where
    F: Fn(&str) -> Result<String> + Copy,
{
    if depth > MAX_INCLUDE_DEPTH {
        bail!(
            "Include depth exceeded maximum of {} levels at '{}'",
            MAX_INCLUDE_DEPTH,
            path.display()
        );
    }

    let canonical = path
        .canonicalize()
        .with_context(|| format!("read config '{}'", path.display()))?;

    if !stack.insert(canonical.clone()) {
        bail!("Circular include detected: '{}'", path.display());
    }

    debug!("Loading config from '{}' (depth {})", path.display(), depth);

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let expanded = expand_env(&text)?;
    let config = parse_config(&expanded, ConfigFormat::from_path(path))
        .with_context(|| format!("parse config '{}'", path.display()))?;

    let base_dir = path.parent().unwrap_or(Path::new("."));
    let mut merged = ConfigFile::default();

    for include in &config.includes {
        let full_path = base_dir.join(include);
        debug!(
            "Resolving include '{}' relative to '{}'",
            include,
            base_dir.display()
        );
        if !full_path.exists() {
            bail!(
                "Included config file not found: '{}' (resolved from '{}')",
                full_path.display(),
                include
            );
        }
        let included = load_config_recursive(&full_path, expand_env, stack, depth + 1)?;
        merge_into(&mut merged, included);
    }

    // Siblings may include the same file; only ancestors count as a cycle.
    stack.remove(&canonical);

    merge_into(&mut merged, config);
    Ok(merged)
}

/// Parse one config document without resolving its includes.
pub fn parse_config(text: &str, format: ConfigFormat) -> Result<ConfigFile> {
    match format {
        ConfigFormat::Toml => Ok(toml::from_str(text)?),
        ConfigFormat::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(text)?;
            if value.get("resourceMappings").is_some() {
                debug!("Converting resourceMappings layout");
                let legacy: LegacyConfig = serde_yaml::from_value(value)?;
                legacy.into_config()
            } else {
                Ok(serde_yaml::from_value(value)?)
            }
        }
    }
}

/// Fold `other` into `base`.
///
/// Layers and exclusion patterns are unioned in order. Rules keep their
/// position; a rule whose id already exists replaces it where it stands.
/// Defaults set in `other` win field by field.
pub fn merge_into(base: &mut ConfigFile, other: ConfigFile) {
    for layer in other.layers {
        if !base.layers.contains(&layer) {
            base.layers.push(layer);
        }
    }

    for pattern in other.exclusions.patterns {
        if !base.exclusions.patterns.contains(&pattern) {
            base.exclusions.patterns.push(pattern);
        }
    }

    for rule in other.rule {
        match base.rule.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => base.rule.push(rule),
        }
    }

    let Defaults {
        base: base_ref,
        head,
        output,
        strict,
    } = other.defaults;
    if base_ref.is_some() {
        base.defaults.base = base_ref;
    }
    if head.is_some() {
        base.defaults.head = head;
    }
    if output.is_some() {
        base.defaults.output = output;
    }
    if strict.is_some() {
        base.defaults.strict = strict;
    }
}

/// The `resourceMappings` / `deploymentChecklist` YAML layout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyConfig {
    #[serde(default)]
    exclusions: Exclusions,
    #[serde(default)]
    resource_mappings: serde_yaml::Mapping,
    #[serde(default)]
    deployment_checklist: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
struct LegacyMapping {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    impact_level: Option<String>,
    #[serde(default)]
    target_stack: Option<String>,
    #[serde(default)]
    required_actions: Vec<String>,
}

impl LegacyConfig {
    fn into_config(self) -> Result<ConfigFile> {
        let layers = self
            .deployment_checklist
            .keys()
            .map(|k| mapping_key(k).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let mut rule = Vec::with_capacity(self.resource_mappings.len());
        for (key, value) in self.resource_mappings {
            let id = mapping_key(&key)?.to_string();
            let mapping: LegacyMapping = serde_yaml::from_value(value)
                .with_context(|| format!("resource mapping '{id}'"))?;
            rule.push(RuleConfig {
                id,
                description: mapping.description,
                patterns: mapping.patterns,
                resource_type: mapping.resource_type,
                impact_level: mapping.impact_level,
                target_layers: mapping.target_stack.into_iter().collect(),
                required_actions: mapping.required_actions,
            });
        }

        Ok(ConfigFile {
            includes: vec![],
            layers,
            defaults: Defaults::default(),
            exclusions: self.exclusions,
            rule,
        })
    }
}

fn mapping_key(key: &serde_yaml::Value) -> Result<&str> {
    match key.as_str() {
        Some(s) => Ok(s),
        None => bail!("mapping keys must be strings, found {key:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_expand(s: &str) -> Result<String> {
        Ok(s.to_string())
    }

    fn ids(cfg: &ConfigFile) -> Vec<&str> {
        cfg.rule.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn loads_a_single_toml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("layerguard.toml");
        fs::write(
            &path,
            r#"
layers = ["lambda_layer"]

[defaults]
base = "origin/main"

[[rule]]
id = "lambda"
patterns = ["lambda/**"]
resource_type = "lambda_function"
impact_level = "HIGH"
target_layers = ["lambda_layer"]
"#,
        )
        .unwrap();

        let cfg = load_config_with_includes(&path, no_expand).unwrap();
        assert_eq!(ids(&cfg), vec!["lambda"]);
        assert_eq!(cfg.layers, vec!["lambda_layer"]);
        assert_eq!(cfg.defaults.base.as_deref(), Some("origin/main"));
        assert!(cfg.includes.is_empty());
    }

    #[test]
    fn includes_come_first_and_overrides_stay_in_place() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("base.toml"),
            r#"
layers = ["vpc_layer"]

[exclusions]
patterns = ["**/*.md"]

[[rule]]
id = "shared"
patterns = ["lib/**"]
resource_type = "shared_library"
impact_level = "CRITICAL"
target_layers = ["all"]
required_actions = ["rebuild"]

[[rule]]
id = "network"
patterns = ["infrastructure/vpc/**"]
resource_type = "vpc"
impact_level = "HIGH"
target_layers = ["vpc_layer"]
"#,
        )
        .unwrap();
        let main = temp.path().join("main.toml");
        fs::write(
            &main,
            r#"
includes = ["base.toml"]
layers = ["lambda_layer", "vpc_layer"]

[exclusions]
patterns = ["docs/**", "**/*.md"]

[[rule]]
id = "lambda"
patterns = ["lambda/**"]
resource_type = "lambda_function"
impact_level = "HIGH"
target_layers = ["lambda_layer"]

[[rule]]
id = "shared"
patterns = ["lib/**", "common/**"]
resource_type = "shared_library"
impact_level = "CRITICAL"
target_layers = ["all"]
required_actions = ["rebuild_everything"]
"#,
        )
        .unwrap();

        let cfg = load_config_with_includes(&main, no_expand).unwrap();
        assert_eq!(ids(&cfg), vec!["shared", "network", "lambda"]);
        assert_eq!(cfg.rule[0].patterns, vec!["lib/**", "common/**"]);
        assert_eq!(cfg.layers, vec!["vpc_layer", "lambda_layer"]);
        assert_eq!(cfg.exclusions.patterns, vec!["**/*.md", "docs/**"]);
    }

    #[test]
    fn main_defaults_override_included_defaults_per_field() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("base.toml"),
            "[defaults]\nbase = \"develop\"\nstrict = true\n",
        )
        .unwrap();
        let main = temp.path().join("main.toml");
        fs::write(
            &main,
            "includes = [\"base.toml\"]\n[defaults]\nbase = \"main\"\n",
        )
        .unwrap();

        let cfg = load_config_with_includes(&main, no_expand).unwrap();
        assert_eq!(cfg.defaults.base.as_deref(), Some("main"));
        assert_eq!(cfg.defaults.strict, Some(true));
    }

    #[test]
    fn nested_includes_resolve_relative_to_their_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("shared/inner")).unwrap();
        fs::write(
            temp.path().join("shared/inner/leaf.toml"),
            "layers = [\"s3_layer\"]\n",
        )
        .unwrap();
        fs::write(
            temp.path().join("shared/mid.toml"),
            "includes = [\"inner/leaf.toml\"]\nlayers = [\"ec2_layer\"]\n",
        )
        .unwrap();
        let main = temp.path().join("main.toml");
        fs::write(&main, "includes = [\"shared/mid.toml\"]\n").unwrap();

        let cfg = load_config_with_includes(&main, no_expand).unwrap();
        assert_eq!(cfg.layers, vec!["s3_layer", "ec2_layer"]);
    }

    #[test]
    fn diamond_includes_are_not_cycles() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("common.toml"), "layers = [\"vpc_layer\"]\n").unwrap();
        fs::write(temp.path().join("a.toml"), "includes = [\"common.toml\"]\n").unwrap();
        fs::write(temp.path().join("b.toml"), "includes = [\"common.toml\"]\n").unwrap();
        let main = temp.path().join("main.toml");
        fs::write(&main, "includes = [\"a.toml\", \"b.toml\"]\n").unwrap();

        let cfg = load_config_with_includes(&main, no_expand).unwrap();
        assert_eq!(cfg.layers, vec!["vpc_layer"]);
    }

    #[test]
    fn circular_includes_are_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.toml"), "includes = [\"b.toml\"]\n").unwrap();
        fs::write(temp.path().join("b.toml"), "includes = [\"a.toml\"]\n").unwrap();

        let err = load_config_with_includes(&temp.path().join("a.toml"), no_expand).unwrap_err();
        assert!(format!("{err:#}").contains("Circular include"));
    }

    #[test]
    fn missing_include_is_an_error() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("main.toml");
        fs::write(&main, "includes = [\"nope.toml\"]\n").unwrap();

        let err = load_config_with_includes(&main, no_expand).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn include_depth_is_limited() {
        let temp = TempDir::new().unwrap();
        for i in 0..=MAX_INCLUDE_DEPTH + 1 {
            fs::write(
                temp.path().join(format!("c{i}.toml")),
                format!("includes = [\"c{}.toml\"]\n", i + 1),
            )
            .unwrap();
        }
        fs::write(
            temp.path().join(format!("c{}.toml", MAX_INCLUDE_DEPTH + 2)),
            "",
        )
        .unwrap();

        let err = load_config_with_includes(&temp.path().join("c0.toml"), no_expand).unwrap_err();
        assert!(format!("{err:#}").contains("Include depth exceeded"));
    }

    #[test]
    fn env_expansion_runs_before_parsing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("layerguard.toml");
        fs::write(&path, "[defaults]\nbase = \"${BASE}\"\n").unwrap();

        let cfg = load_config_with_includes(&path, |s: &str| Ok(s.replace("${BASE}", "release")))
            .unwrap();
        assert_eq!(cfg.defaults.base.as_deref(), Some("release"));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        fs::write(&path, "layers = [\n").unwrap();

        let err = load_config_with_includes(&path, no_expand).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn yaml_configs_use_the_same_shape() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("layerguard.yaml");
        fs::write(
            &path,
            r#"
layers: [vpc_layer, lambda_layer]
exclusions:
  patterns: ["**/*.md"]
rule:
  - id: lambda
    patterns: ["lambda-*/src/**"]
    resource_type: lambda_function
    impact_level: HIGH
    target_layers: [lambda_layer]
"#,
        )
        .unwrap();

        let cfg = load_config_with_includes(&path, no_expand).unwrap();
        assert_eq!(ids(&cfg), vec!["lambda"]);
        assert_eq!(cfg.layers, vec!["vpc_layer", "lambda_layer"]);
    }

    #[test]
    fn resource_mappings_layout_is_converted() {
        let cfg = parse_config(
            r#"
exclusions:
  patterns:
    - "**/*.md"
resourceMappings:
  shared_library:
    description: Shared code
    patterns: ["lib/**"]
    resource_type: shared_library
    impact_level: CRITICAL
    target_stack: all
    required_actions: [rebuild_all]
  lambda_functions:
    patterns: ["lambda-*/src/**", "lambda/**"]
    resource_type: lambda_function
    impact_level: HIGH
    target_stack: lambda_layer
deploymentChecklist:
  vpc_layer: VPC and networking
  lambda_layer: Lambda functions
  application: Application stack
cloudFormationConditionMapping:
  lambda_layer: DeployLambdaLayer
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(ids(&cfg), vec!["shared_library", "lambda_functions"]);
        assert_eq!(cfg.rule[0].target_layers, vec!["all"]);
        assert_eq!(cfg.rule[0].description.as_deref(), Some("Shared code"));
        assert_eq!(cfg.rule[1].target_layers, vec!["lambda_layer"]);
        assert_eq!(cfg.layers, vec!["vpc_layer", "lambda_layer", "application"]);
        assert_eq!(cfg.exclusions.patterns, vec!["**/*.md"]);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/b.yml")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("c.YAML")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("layerguard.toml")),
            ConfigFormat::Toml
        );
        assert_eq!(ConfigFormat::from_path(Path::new("noext")), ConfigFormat::Toml);
    }
}
