//! # cf-av
//!
//! External media tool management for the cutforge executor.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support and a bounded stderr tail for diagnostics.
//! - **Scratch management** ([`Workspace`]) -- fresh transient paths for every
//!   produced artifact, and their deletion.
//! - **The media tool seam** ([`MediaTool`], [`FfmpegRunner`]) -- one
//!   [`Invocation`] in, one new artifact out.
//! - **Argument builders** ([`actions`]) -- ffmpeg filters and argument
//!   vectors for each editing operation.
//! - **Probing** ([`probe`]) -- duration and frame size via ffprobe.

pub mod actions;
pub mod command;
pub mod probe;
pub mod runner;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{tail_chars, ToolCommand, ToolOutput};
pub use runner::{FfmpegRunner, Invocation, MediaTool};
pub use tools::{ToolInfo, ToolRegistry};
pub use workspace::Workspace;
