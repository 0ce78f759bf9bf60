use layerguard_domain::{aggregate_range, enhance, validate, PatternMatcher, RuleCatalog};
use layerguard_types::{DiffMeta, EnhancedMetadata, ValidationResult};
use tracing::{debug, info, warn};

pub const EXIT_OK: i32 = 0;
/// Configuration, input or I/O failure.
pub const EXIT_TOOL_ERROR: i32 = 1;
/// The metadata document failed validation.
pub const EXIT_INVALID: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectPlan {
    /// Revision range the paths were taken from, if any.
    pub diff: Option<DiffMeta>,
    /// Require every changed path to be matched or excluded, and fail the run
    /// when validation does not pass.
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectRun {
    /// Enhanced metadata with `is_valid` filled in.
    pub metadata: EnhancedMetadata,
    pub validation: ValidationResult,
    pub markdown: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateRun {
    pub validation: ValidationResult,
    pub text: String,
    pub exit_code: i32,
}

/// Classify `paths`, aggregate, enhance and validate in one pass.
///
/// Never fails: an invalid document is still produced and reported through
/// `validation`. Only a strict plan turns it into a failing exit code.
pub fn run_detect<M: PatternMatcher>(
    plan: &DetectPlan,
    catalog: &RuleCatalog<M>,
    paths: &[String],
) -> DetectRun {
    debug!(
        paths = paths.len(),
        rules = catalog.rules().len(),
        layers = catalog.layers().len(),
        "running change-impact pipeline"
    );

    let change = aggregate_range(paths, catalog, plan.diff.clone());
    debug!(
        affected = change.affected_resources.len(),
        excluded = change.excluded_files.len(),
        unmatched = change.unmatched_files.len(),
        "classified changed paths"
    );

    let mut metadata = enhance(&change);
    let validation = validate(&metadata, plan.strict);
    metadata.is_valid = Some(validation.is_valid);

    let deploying: Vec<&str> = metadata
        .change
        .deployment_checklist
        .iter()
        .filter(|(_, deploy)| **deploy)
        .map(|(layer, _)| layer.as_str())
        .collect();
    info!(
        "{} changed file(s), {} affected resource(s), deploying: {}",
        metadata.change.changed_files.len(),
        metadata.change.affected_resources.len(),
        if deploying.is_empty() {
            "nothing".to_string()
        } else {
            deploying.join(", ")
        }
    );

    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let exit_code = if validation.is_valid {
        EXIT_OK
    } else {
        for problem in &validation.problems {
            warn!("{problem}");
        }
        if plan.strict {
            EXIT_INVALID
        } else {
            EXIT_OK
        }
    };

    let markdown = crate::render::render_markdown_for_metadata(&metadata, &validation);

    DetectRun {
        metadata,
        validation,
        markdown,
        exit_code,
    }
}

/// Re-check a metadata document read back from disk.
pub fn run_validate(metadata: &EnhancedMetadata, strict: bool) -> ValidateRun {
    let validation = validate(metadata, strict);
    if let Some(recorded) = metadata.is_valid {
        if recorded != validation.is_valid {
            warn!(
                recorded,
                actual = validation.is_valid,
                "document's is_valid disagrees with validation"
            );
        }
    }

    let text = crate::render::render_validation_text(&validation);
    let exit_code = if validation.is_valid {
        EXIT_OK
    } else {
        EXIT_INVALID
    };

    ValidateRun {
        validation,
        text,
        exit_code,
    }
}
