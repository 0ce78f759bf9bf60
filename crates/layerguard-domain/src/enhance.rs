use std::collections::BTreeMap;

use layerguard_types::{ChangeMetadata, EnhancedMetadata};

/// Orchestrator condition flag for a layer.
///
/// `"Deploy" + PascalCase(layer)`, with a `Stack` suffix unless the name already
/// ends in `Layer` or `Stack`: `lambda_layer` -> `DeployLambdaLayer`,
/// `application` -> `DeployApplicationStack`.
pub fn condition_flag_name(layer: &str) -> String {
    let pascal = pascal_case(layer);
    let mut flag = String::with_capacity(pascal.len() + 11);
    flag.push_str("Deploy");
    flag.push_str(&pascal);
    if !(pascal.ends_with("Layer") || pascal.ends_with("Stack")) {
        flag.push_str("Stack");
    }
    flag
}

fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for segment in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Derive orchestrator-facing flags from a change summary.
///
/// Condition values are copied from the checklist verbatim.
pub fn enhance(metadata: &ChangeMetadata) -> EnhancedMetadata {
    let cloudformation_conditions: BTreeMap<String, bool> = metadata
        .deployment_checklist
        .iter()
        .map(|(layer, deploy)| (condition_flag_name(layer), *deploy))
        .collect();

    EnhancedMetadata {
        change: metadata.clone(),
        cloudformation_conditions,
        has_affected_resources: !metadata.affected_resources.is_empty(),
        has_deployments: metadata.deployment_checklist.values().any(|deploy| *deploy),
        is_valid: None,
    }
}
