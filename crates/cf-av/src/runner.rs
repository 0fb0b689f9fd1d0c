//! The media tool seam.
//!
//! Each editing operation is reduced to an [`Invocation`]: the resolved input
//! paths, a fresh output path, and the full argument vector. A [`MediaTool`]
//! turns that into a new artifact on disk or a failure.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::ToolCommand;

/// One call to the external transformation tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Wire name of the operation this call implements (e.g. "trim").
    pub step: String,
    /// Resolved input artifacts, in order.
    pub inputs: Vec<PathBuf>,
    /// Fresh path the tool must write; never an existing artifact.
    pub output: PathBuf,
    /// Full argument vector, excluding the program itself.
    pub args: Vec<String>,
}

/// Something that can carry out an [`Invocation`].
///
/// Implementations must write `invocation.output` on success and must not
/// modify any of `invocation.inputs`.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Produce `invocation.output` or fail.
    async fn run(&self, invocation: &Invocation) -> cf_core::Result<()>;
}

/// [`MediaTool`] backed by the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
    timeout: Duration,
    diagnostic_tail: usize,
}

impl FfmpegRunner {
    /// Create a runner for the given ffmpeg path.
    pub fn new(program: PathBuf) -> Self {
        let defaults = cf_core::config::ExecutorConfig::default();
        Self {
            program,
            timeout: Duration::from_secs(defaults.tool_timeout_secs),
            diagnostic_tail: defaults.diagnostic_tail_chars,
        }
    }

    /// Create a runner from the tool registry and executor policy.
    pub fn from_config(
        tools: &crate::ToolRegistry,
        config: &cf_core::config::ExecutorConfig,
    ) -> cf_core::Result<Self> {
        let program = tools.require("ffmpeg")?.to_path_buf();
        Ok(Self::new(program)
            .with_timeout(Duration::from_secs(config.tool_timeout_secs))
            .with_diagnostic_tail(config.diagnostic_tail_chars))
    }

    /// Builder: set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set how many trailing stderr characters a failure keeps.
    pub fn with_diagnostic_tail(mut self, chars: usize) -> Self {
        self.diagnostic_tail = chars;
        self
    }
}

#[async_trait]
impl MediaTool for FfmpegRunner {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn run(&self, invocation: &Invocation) -> cf_core::Result<()> {
        tracing::debug!("ffmpeg {}", invocation.args.join(" "));

        ToolCommand::new(self.program.clone())
            .args(invocation.args.iter().cloned())
            .timeout(self.timeout)
            .diagnostic_tail(self.diagnostic_tail)
            .execute()
            .await?;

        if !invocation.output.exists() {
            return Err(cf_core::Error::tool(
                "ffmpeg",
                format!(
                    "exited successfully but wrote no output at {}",
                    invocation.output.display()
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_fails() {
        let runner = FfmpegRunner::new(PathBuf::from("nonexistent_ffmpeg_xyz"));
        let inv = Invocation {
            step: "trim".into(),
            inputs: vec![],
            output: PathBuf::from("/tmp/never.mp4"),
            args: vec!["-version".into()],
        };
        let err = runner.run(&inv).await.unwrap_err();
        assert!(matches!(err, cf_core::Error::Tool { .. }));
    }

    #[test]
    fn from_config_applies_executor_policy() {
        let tools = crate::ToolRegistry::with_paths([("ffmpeg".to_string(), PathBuf::from("/opt/ffmpeg"))]);
        let cfg = cf_core::config::ExecutorConfig {
            tool_timeout_secs: 30,
            diagnostic_tail_chars: 500,
            ..Default::default()
        };
        let runner = FfmpegRunner::from_config(&tools, &cfg).unwrap();
        assert_eq!(runner.program, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(runner.timeout, Duration::from_secs(30));
        assert_eq!(runner.diagnostic_tail, 500);
    }

    #[test]
    fn from_config_requires_ffmpeg() {
        let tools = crate::ToolRegistry::default();
        let cfg = cf_core::config::ExecutorConfig::default();
        assert!(FfmpegRunner::from_config(&tools, &cfg).is_err());
    }
}
