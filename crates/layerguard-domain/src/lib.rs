//! Domain logic: rule catalog, path matching, checklist aggregation,
//! condition flags and metadata validation.
//!
//! This crate is designed to be I/O-free and highly testable. Every stage is a
//! pure function of its inputs; a compiled [`RuleCatalog`] is read-only and can be
//! shared across concurrent pipeline runs.

pub mod aggregate;
pub mod catalog;
pub mod enhance;
pub mod matcher;
pub mod pattern;
pub mod validate;

pub use aggregate::{aggregate, aggregate_range, build_checklist, max_impact};
pub use catalog::{CatalogError, CompiledPattern, CompiledRule, RuleCatalog, TargetLayers};
pub use enhance::{condition_flag_name, enhance};
pub use matcher::{classify, match_path, Classification};
pub use pattern::{normalize_path, GlobMatcher, PatternError, PatternMatcher};
pub use validate::validate;
