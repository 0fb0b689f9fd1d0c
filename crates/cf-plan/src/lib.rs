//! # cf-plan
//!
//! Everything that happens to a plan before it is executed.
//!
//! - [`normalize`] turns loosely shaped plan documents into canonical
//!   [`Task`]s, parsing timestamps once.
//! - [`slots`] computes insertion windows from a transcript, optionally
//!   starting from a ranking collaborator's proposals.
//! - [`repair`] enforces insertion rules and rewrites wasteful assemblies.
//! - [`validate`] reports ordering and naming problems without changing
//!   anything.

pub mod normalize;
pub mod repair;
pub mod slots;
pub mod task;
pub mod transcript;
pub mod validate;

pub use normalize::{normalize_plan, normalize_plan_str, Normalized};
pub use repair::{Correction, PlanRepairer, RepairReport, SOURCE};
pub use slots::{RecordedProposals, Slot, SlotPlanner, SlotProposal, SlotRanker};
pub use task::{ChainEffect, Operation, OperationKind, Task, WireTask};
pub use transcript::{SidecarTranscriber, Transcriber, Transcript, TranscriptSegment};
pub use validate::{validate_plan, PlanIssue};
