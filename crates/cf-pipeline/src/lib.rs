//! # cf-pipeline
//!
//! Plan execution for cutforge.
//!
//! - [`ArtifactRegistry`] -- the per-run map from output names to files,
//!   with the `current` chain pointer and transient-file ownership.
//! - [`ContentSource`] -- where fetch tasks get their media, with
//!   [`fetch_with_fallback`] walking the fallback query list.
//! - [`TaskGraphExecutor`] -- runs a validated plan and persists the result.

pub mod executor;
pub mod registry;
pub mod source;
mod steps;

pub use executor::{RunReport, SkippedTask, TaskGraphExecutor};
pub use registry::{ArtifactRegistry, ArtifactState};
pub use source::{
    fallback_queries, fetch_with_fallback, ContentRequest, ContentSource, DirectorySource,
    MediaKind, NoContent,
};
