//! Core engine: runs the change-impact pipeline for one changeset and renders
//! its reports.

mod detect;
mod render;

pub use detect::{
    run_detect, run_validate, DetectPlan, DetectRun, ValidateRun, EXIT_INVALID, EXIT_OK,
    EXIT_TOOL_ERROR,
};
pub use render::{render_classification, render_markdown_for_metadata, render_validation_text};
