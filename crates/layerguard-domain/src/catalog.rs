use std::collections::{BTreeMap, BTreeSet};

use layerguard_types::{
    ConfigFile, ImpactLevel, MatchRecord, RuleConfig, ALL_LAYERS, APPLICATION_LAYER,
};

use crate::enhance::condition_flag_name;
use crate::pattern::{GlobMatcher, PatternError, PatternMatcher};

/// Raised when a configuration cannot be turned into a usable catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("rule #{index} has an empty id")]
    MissingRuleId { index: usize },

    #[error("rule '{rule_id}' is declared more than once")]
    DuplicateRuleId { rule_id: String },

    #[error("rule '{rule_id}' has no patterns")]
    MissingPatterns { rule_id: String },

    #[error("rule '{rule_id}' has no resource_type")]
    MissingResourceType { rule_id: String },

    #[error("rule '{rule_id}' has no impact_level")]
    MissingImpactLevel { rule_id: String },

    #[error("rule '{rule_id}' has unknown impact_level '{value}' (expected LOW, MEDIUM, HIGH or CRITICAL)")]
    UnknownImpactLevel { rule_id: String, value: String },

    #[error("rule '{rule_id}' targets unknown layer '{layer}'")]
    UnknownLayer { rule_id: String, layer: String },

    #[error("rule '{rule_id}' has {source}")]
    InvalidPattern {
        rule_id: String,
        source: PatternError,
    },

    #[error("exclusions have {source}")]
    InvalidExclusion { source: PatternError },

    #[error("layer name '{layer}' is not allowed: {reason}")]
    InvalidLayerName { layer: String, reason: String },

    #[error("layers '{first}' and '{second}' both map to condition flag '{flag}'")]
    ConditionFlagCollision {
        first: String,
        second: String,
        flag: String,
    },
}

/// Layers a rule redeploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetLayers {
    /// The `all` sentinel: every known layer.
    All,
    /// Named known layers, declaration order, no duplicates. May be empty for
    /// purely informational rules.
    Layers(Vec<String>),
}

impl TargetLayers {
    pub fn to_names(&self) -> Vec<String> {
        match self {
            TargetLayers::All => vec![ALL_LAYERS.to_string()],
            TargetLayers::Layers(layers) => layers.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledPattern<P> {
    pub raw: String,
    pub compiled: P,
}

#[derive(Debug, Clone)]
pub struct CompiledRule<P> {
    pub id: String,
    pub description: Option<String>,
    pub patterns: Vec<CompiledPattern<P>>,
    pub resource_type: String,
    pub impact_level: ImpactLevel,
    pub target_layers: TargetLayers,
    pub required_actions: Vec<String>,
}

impl<P> CompiledRule<P> {
    /// Build the match record this rule produces for `file`.
    pub fn record_for(&self, file: &str) -> MatchRecord {
        MatchRecord {
            file: file.to_string(),
            rule_id: self.id.clone(),
            resource_type: self.resource_type.clone(),
            impact_level: self.impact_level,
            target_layers: self.target_layers.to_names(),
            required_actions: self.required_actions.clone(),
            description: self.description.clone(),
        }
    }
}

/// Ordered mapping rules plus the exclusion set, compiled and validated.
///
/// Immutable once built. Pass it by reference to every pipeline run.
#[derive(Debug, Clone)]
pub struct RuleCatalog<M: PatternMatcher = GlobMatcher> {
    matcher: M,
    layers: Vec<String>,
    exclusions: Vec<CompiledPattern<M::Compiled>>,
    rules: Vec<CompiledRule<M::Compiled>>,
    source: Option<String>,
}

impl RuleCatalog<GlobMatcher> {
    /// Compile a configuration with glob pattern semantics.
    pub fn compile(config: &ConfigFile) -> Result<Self, CatalogError> {
        Self::compile_with(config, GlobMatcher)
    }
}

impl<M: PatternMatcher> RuleCatalog<M> {
    /// Compile a configuration with a caller-supplied pattern capability.
    pub fn compile_with(config: &ConfigFile, matcher: M) -> Result<Self, CatalogError> {
        let layers = known_layers(&config.layers)?;
        let layer_set: BTreeSet<&str> = layers.iter().map(String::as_str).collect();

        let mut exclusions = Vec::with_capacity(config.exclusions.patterns.len());
        for raw in &config.exclusions.patterns {
            let compiled = matcher
                .compile(raw)
                .map_err(|source| CatalogError::InvalidExclusion { source })?;
            exclusions.push(CompiledPattern {
                raw: raw.clone(),
                compiled,
            });
        }

        let mut seen_ids = BTreeSet::<&str>::new();
        let mut rules = Vec::with_capacity(config.rule.len());
        for (index, cfg) in config.rule.iter().enumerate() {
            if cfg.id.trim().is_empty() {
                return Err(CatalogError::MissingRuleId { index });
            }
            if !seen_ids.insert(cfg.id.as_str()) {
                return Err(CatalogError::DuplicateRuleId {
                    rule_id: cfg.id.clone(),
                });
            }
            rules.push(compile_rule(cfg, &matcher, &layer_set)?);
        }

        Ok(Self {
            matcher,
            layers,
            exclusions,
            rules,
            source: None,
        })
    }

    /// Attach a label (usually the config path) that is echoed into metadata.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Every checklist layer: declared layers in order, then `application`
    /// unless it was declared explicitly.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn exclusions(&self) -> &[CompiledPattern<M::Compiled>] {
        &self.exclusions
    }

    pub fn rules(&self) -> &[CompiledRule<M::Compiled>] {
        &self.rules
    }
}

fn known_layers(declared: &[String]) -> Result<Vec<String>, CatalogError> {
    let mut layers: Vec<String> = Vec::with_capacity(declared.len() + 1);
    for layer in declared {
        let layer = layer.trim();
        if layer.is_empty() {
            return Err(CatalogError::InvalidLayerName {
                layer: layer.to_string(),
                reason: "empty name".to_string(),
            });
        }
        if layer == ALL_LAYERS {
            return Err(CatalogError::InvalidLayerName {
                layer: layer.to_string(),
                reason: format!("'{ALL_LAYERS}' is reserved for targeting every layer"),
            });
        }
        if !layers.iter().any(|l| l == layer) {
            layers.push(layer.to_string());
        }
    }
    if !layers.iter().any(|l| l == APPLICATION_LAYER) {
        layers.push(APPLICATION_LAYER.to_string());
    }

    let mut flags = BTreeMap::<String, &str>::new();
    for layer in &layers {
        let flag = condition_flag_name(layer);
        if let Some(first) = flags.get(&flag) {
            return Err(CatalogError::ConditionFlagCollision {
                first: first.to_string(),
                second: layer.clone(),
                flag,
            });
        }
        flags.insert(flag, layer);
    }

    Ok(layers)
}

fn compile_rule<M: PatternMatcher>(
    cfg: &RuleConfig,
    matcher: &M,
    known: &BTreeSet<&str>,
) -> Result<CompiledRule<M::Compiled>, CatalogError> {
    let rule_id = cfg.id.clone();

    if cfg.patterns.is_empty() {
        return Err(CatalogError::MissingPatterns { rule_id });
    }

    let resource_type = match cfg.resource_type.as_deref().map(str::trim) {
        Some(rt) if !rt.is_empty() => rt.to_string(),
        _ => return Err(CatalogError::MissingResourceType { rule_id }),
    };

    let impact_level = match cfg.impact_level.as_deref() {
        None => return Err(CatalogError::MissingImpactLevel { rule_id }),
        Some(raw) if raw.trim().is_empty() => {
            return Err(CatalogError::MissingImpactLevel { rule_id })
        }
        Some(raw) => raw
            .parse::<ImpactLevel>()
            .map_err(|_| CatalogError::UnknownImpactLevel {
                rule_id: rule_id.clone(),
                value: raw.to_string(),
            })?,
    };

    let mut all = false;
    let mut layers: Vec<String> = Vec::with_capacity(cfg.target_layers.len());
    for layer in &cfg.target_layers {
        let layer = layer.trim();
        if layer == ALL_LAYERS {
            all = true;
            continue;
        }
        if !known.contains(layer) {
            return Err(CatalogError::UnknownLayer {
                rule_id,
                layer: layer.to_string(),
            });
        }
        if !layers.iter().any(|l| l == layer) {
            layers.push(layer.to_string());
        }
    }
    let target_layers = if all {
        TargetLayers::All
    } else {
        TargetLayers::Layers(layers)
    };

    let mut patterns = Vec::with_capacity(cfg.patterns.len());
    for raw in &cfg.patterns {
        let compiled = matcher
            .compile(raw)
            .map_err(|source| CatalogError::InvalidPattern {
                rule_id: rule_id.clone(),
                source,
            })?;
        patterns.push(CompiledPattern {
            raw: raw.clone(),
            compiled,
        });
    }

    Ok(CompiledRule {
        id: rule_id,
        description: cfg.description.clone(),
        patterns,
        resource_type,
        impact_level,
        target_layers,
        required_actions: cfg.required_actions.clone(),
    })
}
