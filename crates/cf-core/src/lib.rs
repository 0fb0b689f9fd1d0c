//! cf-core: shared error type, configuration, and canonical time parsing.
//!
//! This crate is the foundational dependency for all other cf-* crates.

pub mod config;
pub mod error;
pub mod time;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use time::{ceil_tenth, floor_tenth, parse_timestamp, round_tenth, Seconds};
