use std::collections::{BTreeMap, BTreeSet};

use layerguard_types::{EnhancedMetadata, ImpactLevel, ValidationResult};

use crate::enhance::condition_flag_name;

/// Check enhanced metadata for internal consistency.
///
/// Every check runs; problems accumulate in a stable order. The input is never
/// modified. Every changed file should be accounted for by exactly one match
/// record or exclusion: gaps are warnings, and problems under `strict`.
pub fn validate(enhanced: &EnhancedMetadata, strict: bool) -> ValidationResult {
    let meta = &enhanced.change;
    let mut problems = Vec::new();
    let mut warnings = Vec::new();

    if enhanced.has_affected_resources && !enhanced.has_deployments {
        problems.push(
            "affected resources were detected but no layer is scheduled for deployment".to_string(),
        );
    }

    let actually_affected = !meta.affected_resources.is_empty();
    if enhanced.has_affected_resources != actually_affected {
        problems.push(format!(
            "has_affected_resources is {} but affected_resources holds {} record(s)",
            enhanced.has_affected_resources,
            meta.affected_resources.len()
        ));
    }

    let actually_deploying = meta.deployment_checklist.values().any(|deploy| *deploy);
    if enhanced.has_deployments != actually_deploying {
        problems.push(format!(
            "has_deployments is {} but the deployment checklist says {}",
            enhanced.has_deployments, actually_deploying
        ));
    }

    for record in &meta.affected_resources {
        if record.impact_level == ImpactLevel::Critical && record.required_actions.is_empty() {
            problems.push(format!(
                "CRITICAL change to '{}' (rule '{}') has no required_actions",
                record.file, record.rule_id
            ));
        }
    }

    // Documents without a layer list fall back to the checklist keys.
    let layers: BTreeSet<&str> = if meta.layers.is_empty() {
        meta.deployment_checklist.keys().map(String::as_str).collect()
    } else {
        meta.layers.iter().map(String::as_str).collect()
    };

    let checklist_keys: BTreeSet<&str> = meta
        .deployment_checklist
        .keys()
        .map(String::as_str)
        .collect();
    for layer in layers.difference(&checklist_keys) {
        problems.push(format!("deployment checklist is missing layer '{layer}'"));
    }
    for layer in checklist_keys.difference(&layers) {
        problems.push(format!("deployment checklist names unknown layer '{layer}'"));
    }

    let expected: BTreeMap<String, &str> = layers
        .iter()
        .map(|layer| (condition_flag_name(layer), *layer))
        .collect();
    for (flag, layer) in &expected {
        match enhanced.cloudformation_conditions.get(flag) {
            None => {
                problems.push(format!("condition flag '{flag}' for layer '{layer}' is missing"))
            }
            Some(value) => {
                if let Some(deploy) = meta.deployment_checklist.get(*layer) {
                    if value != deploy {
                        problems.push(format!(
                            "condition flag '{flag}' is {value} but layer '{layer}' is {deploy} in the checklist"
                        ));
                    }
                }
            }
        }
    }
    for flag in enhanced.cloudformation_conditions.keys() {
        if !expected.contains_key(flag) {
            problems.push(format!(
                "condition flag '{flag}' does not correspond to any known layer"
            ));
        }
    }

    if meta.changed_files_count as usize != meta.changed_files.len() {
        problems.push(format!(
            "changed_files_count is {} but changed_files lists {} path(s)",
            meta.changed_files_count,
            meta.changed_files.len()
        ));
    }

    if !meta.changed_files.is_empty() && meta.affected_resources.is_empty() {
        warnings.push(format!(
            "{} changed file(s) but no affected resources; all changes may have been excluded",
            meta.changed_files.len()
        ));
    }

    if strict {
        check_classification(enhanced, &mut problems);
    } else {
        check_classification(enhanced, &mut warnings);
    }

    ValidationResult::from_problems(problems).with_warnings(warnings)
}

fn check_classification(enhanced: &EnhancedMetadata, problems: &mut Vec<String>) {
    let meta = &enhanced.change;

    let mut claims: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &meta.affected_resources {
        *claims.entry(record.file.as_str()).or_default() += 1;
    }
    for file in &meta.excluded_files {
        *claims.entry(file.as_str()).or_default() += 1;
    }

    for file in &meta.changed_files {
        match claims.get(file.as_str()).copied().unwrap_or(0) {
            0 => problems.push(format!(
                "changed file '{file}' is neither matched by a rule nor excluded"
            )),
            1 => {}
            n => problems.push(format!("changed file '{file}' is classified {n} times")),
        }
    }

    let changed: BTreeSet<&str> = meta.changed_files.iter().map(String::as_str).collect();
    for file in claims.keys() {
        if !changed.contains(file) {
            problems.push(format!("'{file}' is classified but is not listed in changed_files"));
        }
    }
}
