use layerguard_domain::{condition_flag_name, Classification};
use layerguard_types::{EnhancedMetadata, MatchRecord, ValidationResult};

/// Human-readable deployment report.
pub fn render_markdown_for_metadata(
    metadata: &EnhancedMetadata,
    validation: &ValidationResult,
) -> String {
    let change = &metadata.change;
    let deploying = change
        .deployment_checklist
        .values()
        .filter(|deploy| **deploy)
        .count();

    let status = if deploying == 0 {
        "NO DEPLOYMENT".to_string()
    } else {
        format!("DEPLOY {deploying} LAYER(S)")
    };

    let mut out = String::new();
    out.push_str(&format!("## layerguard: {status}\n\n"));

    let range = match &change.diff {
        Some(diff) => format!(" (base: `{}`, head: `{}`)", diff.base, diff.head),
        None => String::new(),
    };
    out.push_str(&format!(
        "Classified **{}** changed file(s){range}: {} matched, {} excluded, {} unmatched.\n\n",
        change.changed_files.len(),
        change.affected_resources.len(),
        change.excluded_files.len(),
        change.unmatched_files.len(),
    ));

    if let Some(level) = change.impact_level {
        out.push_str(&format!("**Impact:** {level}\n\n"));
    }

    out.push_str("| Layer | Condition | Deploy |\n");
    out.push_str("|---|---|---|\n");
    for (layer, deploy) in &change.deployment_checklist {
        let flag = condition_flag_name(layer);
        let mark = if *deploy { "yes" } else { "no" };
        out.push_str(&format!(
            "| {} | `{}` | {mark} |\n",
            escape_md(layer),
            escape_md(&flag)
        ));
    }
    out.push('\n');

    if !change.affected_resources.is_empty() {
        out.push_str("| Impact | Rule | Resource | File | Layers |\n");
        out.push_str("|---|---|---|---|---|\n");
        for record in &change.affected_resources {
            out.push_str(&render_record_row(record));
        }
        out.push('\n');
    }

    if !change.required_actions.is_empty() {
        out.push_str("**Required actions:**\n");
        for action in &change.required_actions {
            out.push_str(&format!("- {}\n", escape_md(action)));
        }
        out.push('\n');
    }

    if !validation.is_valid {
        out.push_str(&format!(
            "**Validation failed** with {} problem(s):\n",
            validation.problems.len()
        ));
        for problem in &validation.problems {
            out.push_str(&format!("- {}\n", escape_md(problem)));
        }
        out.push('\n');
    }

    if !validation.warnings.is_empty() {
        out.push_str(&format!("**Warnings** ({}):\n", validation.warnings.len()));
        for warning in &validation.warnings {
            out.push_str(&format!("- {}\n", escape_md(warning)));
        }
        out.push('\n');
    }

    out
}

fn render_record_row(record: &MatchRecord) -> String {
    format!(
        "| {impact} | `{rule}` | {resource} | `{file}` | {layers} |\n",
        impact = record.impact_level,
        rule = escape_md(&record.rule_id),
        resource = escape_md(&record.resource_type),
        file = escape_md(&record.file),
        layers = escape_md(&record.target_layers.join(", ")),
    )
}

/// Numbered problem list, or a one-line success message, followed by any
/// warnings.
pub fn render_validation_text(result: &ValidationResult) -> String {
    let mut out = if result.is_valid {
        "Metadata is valid.\n".to_string()
    } else {
        let mut out = format!("Metadata has {} problem(s):\n", result.problems.len());
        for (i, problem) in result.problems.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, problem));
        }
        out
    };

    for warning in &result.warnings {
        out.push_str(&format!("warning: {warning}\n"));
    }
    out
}

/// One line describing how a path was classified.
pub fn render_classification(path: &str, classification: &Classification) -> String {
    match classification {
        Classification::Excluded { pattern } => {
            format!("{path}: excluded by `{pattern}`")
        }
        Classification::Matched { pattern, record } => format!(
            "{path}: rule '{}' via `{pattern}` -> {} [{}] layers: {}",
            record.rule_id,
            record.resource_type,
            record.impact_level,
            if record.target_layers.is_empty() {
                "(none)".to_string()
            } else {
                record.target_layers.join(", ")
            }
        ),
        Classification::Unmatched => format!("{path}: no matching rule"),
    }
}

fn escape_md(s: &str) -> String {
    s.replace('|', "\\|").replace('`', "\\`")
}
