use std::collections::HashSet;

use layerguard_types::{
    ChangeMetadata, Checklist, DiffMeta, ImpactLevel, MatchRecord, ToolMeta, CHANGE_SCHEMA_V1,
};

use crate::catalog::RuleCatalog;
use crate::matcher::{classify, Classification};
use crate::pattern::{normalize_path, PatternMatcher};

/// Aggregate a changeset that did not come from a revision range.
pub fn aggregate<M, I, S>(paths: I, catalog: &RuleCatalog<M>) -> ChangeMetadata
where
    M: PatternMatcher,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    aggregate_range(paths, catalog, None)
}

/// Classify every path and fold the match records into change metadata.
///
/// Duplicate paths are dropped (first occurrence keeps its position), so
/// `affected_resources` follows input order and holds at most one record per path.
/// Paths that normalize to the same file count as duplicates.
pub fn aggregate_range<M, I, S>(
    paths: I,
    catalog: &RuleCatalog<M>,
    diff: Option<DiffMeta>,
) -> ChangeMetadata
where
    M: PatternMatcher,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::<String>::new();
    let mut changed_files = Vec::new();
    let mut affected_resources = Vec::new();
    let mut excluded_files = Vec::new();
    let mut unmatched_files = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if !seen.insert(normalize_path(path)) {
            continue;
        }
        changed_files.push(path.to_string());

        match classify(path, catalog) {
            Classification::Excluded { .. } => excluded_files.push(path.to_string()),
            Classification::Matched { record, .. } => affected_resources.push(record),
            Classification::Unmatched => unmatched_files.push(path.to_string()),
        }
    }

    let deployment_checklist = build_checklist(catalog.layers(), &affected_resources);
    let impact_level = max_impact(&affected_resources);
    let required_actions = dedup_in_order(
        affected_resources
            .iter()
            .flat_map(|r| r.required_actions.iter()),
    );
    let affected_rules = dedup_in_order(affected_resources.iter().map(|r| &r.rule_id));

    ChangeMetadata {
        schema: CHANGE_SCHEMA_V1.to_string(),
        tool: ToolMeta::current(),
        diff,
        config: catalog.source().map(str::to_string),
        layers: catalog.layers().to_vec(),
        changed_files_count: changed_files.len() as u32,
        changed_files,
        affected_resources,
        affected_rules,
        excluded_files,
        unmatched_files,
        deployment_checklist,
        required_actions,
        impact_level,
    }
}

/// Fold match records into a per-layer checklist.
///
/// Every layer starts false. A record targeting `all` flips every layer and ends
/// the fold. Layer names outside `layers` are ignored.
pub fn build_checklist(layers: &[String], records: &[MatchRecord]) -> Checklist {
    let mut checklist: Checklist = layers.iter().map(|l| (l.clone(), false)).collect();

    for record in records {
        if record.targets_all_layers() {
            checklist.values_mut().for_each(|deploy| *deploy = true);
            break;
        }
        for layer in &record.target_layers {
            if let Some(deploy) = checklist.get_mut(layer) {
                *deploy = true;
            }
        }
    }

    checklist
}

/// Highest impact across records; `None` for an empty set.
pub fn max_impact(records: &[MatchRecord]) -> Option<ImpactLevel> {
    records.iter().map(|r| r.impact_level).max()
}

fn dedup_in_order<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::<&str>::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.as_str()) {
            out.push(item.clone());
        }
    }
    out
}
