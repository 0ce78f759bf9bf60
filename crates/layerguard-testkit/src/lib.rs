//! Shared test utilities for the layerguard workspace.
//!
//! - **arb**: Proptest strategies for configs, changed paths and match records
//! - **fixtures**: Sample configs and changesets
//! - **schema**: JSON schema validation for the serialized documents
//!
//! ```rust,ignore
//! use layerguard_testkit::arb;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     fn classifies(cfg in arb::arb_config_file(), paths in arb::arb_changeset()) {
//!         // ...
//!     }
//! }
//! ```

pub mod arb;
pub mod fixtures;
pub mod schema;

pub use arb::{arb_changed_path, arb_changeset, arb_config_file, arb_impact_level, arb_rule_glob};
pub use fixtures::{sample_changesets, sample_configs};
pub use schema::{validate_change_metadata, validate_config_file, validate_enhanced_metadata};
