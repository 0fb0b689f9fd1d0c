//! Unified error type for cutforge.
//!
//! Every crate funnels its failures into [`Error`]. Variants distinguish the
//! failure classes the executor must keep apart: a tool that ran and failed,
//! a reference that never resolved, and an input that is blocked because no
//! content could be found for it.

/// Unified error type covering all failure modes in cutforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration or task parameters failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A raw plan document could not be read as a task list.
    #[error("Plan error: {0}")]
    Plan(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) could not be run, exited with a
    /// failure status, or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A recognized operation failed while executing a plan.
    #[error("Execution error [{step} #{index}]: {message}")]
    Execution {
        /// Wire name of the operation that failed.
        step: String,
        /// 1-based position of the task in the plan.
        index: usize,
        /// Human-readable error description.
        message: String,
    },

    /// A task named an input that is not in the registry.
    #[error(
        "Unresolved reference [{step} #{index}]: '{name}' not found (available: {})",
        available.join(", ")
    )]
    UnresolvedReference {
        /// Wire name of the referencing operation.
        step: String,
        /// 1-based position of the task in the plan.
        index: usize,
        /// The name that could not be resolved.
        name: String,
        /// Registry names available when the task was reached.
        available: Vec<String>,
    },

    /// A required input was never produced because its content source came
    /// back empty.
    #[error("Blocked [{step} #{index}]: no content was found for '{name}'")]
    Blocked {
        /// Wire name of the blocked operation.
        step: String,
        /// 1-based position of the task in the plan.
        index: usize,
        /// The input whose fetch produced nothing.
        name: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Execution`].
    pub fn execution(step: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Error::Execution {
            step: step.into(),
            index,
            message: message.into(),
        }
    }

    /// Whether this error aborted a plan at a specific task position.
    pub fn task_index(&self) -> Option<usize> {
        match self {
            Error::Execution { index, .. }
            | Error::UnresolvedReference { index, .. }
            | Error::Blocked { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::Validation("factor must be positive".into());
        assert_eq!(err.to_string(), "Validation error: factor must be positive");
        assert_eq!(err.task_index(), None);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
    }

    #[test]
    fn execution_display() {
        let err = Error::execution("trim", 3, "ffmpeg exited with status 1");
        assert_eq!(
            err.to_string(),
            "Execution error [trim #3]: ffmpeg exited with status 1"
        );
        assert_eq!(err.task_index(), Some(3));
    }

    #[test]
    fn unresolved_reference_lists_available_names() {
        let err = Error::UnresolvedReference {
            step: "concat".into(),
            index: 4,
            name: "missing".into(),
            available: vec!["source".into(), "clip_a".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'missing'"), "got: {msg}");
        assert!(msg.contains("source, clip_a"), "got: {msg}");
    }

    #[test]
    fn blocked_display() {
        let err = Error::Blocked {
            step: "concat".into(),
            index: 2,
            name: "stock_1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Blocked [concat #2]: no content was found for 'stock_1'"
        );
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::Internal("boom".into()))
        }
        assert!(err_fn().is_err());
    }
}
