use layerguard_types::MatchRecord;

use crate::catalog::RuleCatalog;
use crate::pattern::{normalize_path, PatternMatcher};

/// How a single changed path was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Matched an exclusion pattern; rules were not consulted.
    Excluded { pattern: String },
    /// Claimed by the first rule with a matching pattern.
    Matched { pattern: String, record: MatchRecord },
    /// Neither excluded nor claimed by any rule.
    Unmatched,
}

impl Classification {
    pub fn into_record(self) -> Option<MatchRecord> {
        match self {
            Classification::Matched { record, .. } => Some(record),
            Classification::Excluded { .. } | Classification::Unmatched => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Classification::Excluded { .. })
    }
}

/// Classify one changed path against the catalog.
///
/// Exclusions are checked first and take absolute precedence. Rules are then
/// scanned in declaration order and the first rule owning a matching pattern
/// wins; later rules are never consulted.
pub fn classify<M: PatternMatcher>(path: &str, catalog: &RuleCatalog<M>) -> Classification {
    let normalized = normalize_path(path);
    let matcher = catalog.matcher();

    if let Some(ex) = catalog
        .exclusions()
        .iter()
        .find(|ex| matcher.matches(&ex.compiled, &normalized))
    {
        return Classification::Excluded {
            pattern: ex.raw.clone(),
        };
    }

    for rule in catalog.rules() {
        if let Some(p) = rule
            .patterns
            .iter()
            .find(|p| matcher.matches(&p.compiled, &normalized))
        {
            return Classification::Matched {
                pattern: p.raw.clone(),
                record: rule.record_for(path),
            };
        }
    }

    Classification::Unmatched
}

/// The match record for `path`, if a non-excluded rule claims it.
pub fn match_path<M: PatternMatcher>(path: &str, catalog: &RuleCatalog<M>) -> Option<MatchRecord> {
    classify(path, catalog).into_record()
}
