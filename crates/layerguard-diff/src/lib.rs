//! Changed-path list parsing.
//!
//! This crate turns `git diff --name-only` / `--name-status` output (or a plain
//! newline-separated list) into the ordered path list the pipeline consumes.

mod names;

pub use names::{listed_paths, parse_changed_paths, ChangeListError, ChangeStatus, ChangedPath};
