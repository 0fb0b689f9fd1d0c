//! Async process invocation with a hard time limit.
//!
//! Every external program cutforge runs (ffmpeg, ffprobe) goes through
//! [`ToolCommand`]. A call either finishes inside its time limit with a zero
//! exit status, or becomes a [`cf_core::Error::Tool`] whose message carries
//! the end of the program's stderr. Timed-out children are killed, never
//! retried.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Per-invocation limit when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(900);

/// Stderr characters kept in failure messages when none is configured.
const DEFAULT_DIAGNOSTIC_TAIL: usize = 3000;

/// What a finished process left behind.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// One external program call under construction.
///
/// # Example
///
/// ```no_run
/// use cf_av::ToolCommand;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() -> cf_core::Result<()> {
/// let probe = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-show_format", "talk.mp4"])
///     .timeout(Duration::from_secs(30))
///     .execute()
///     .await?;
/// println!("{}", probe.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    diagnostic_tail: usize,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            diagnostic_tail: DEFAULT_DIAGNOSTIC_TAIL,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Kill the process if it has not exited after `limit`.
    pub fn timeout(&mut self, limit: Duration) -> &mut Self {
        self.timeout = limit;
        self
    }

    /// Keep the last `chars` characters of stderr in failure messages.
    pub fn diagnostic_tail(&mut self, chars: usize) -> &mut Self {
        self.diagnostic_tail = chars;
        self
    }

    /// Run to completion and capture both output streams.
    ///
    /// # Errors
    ///
    /// [`cf_core::Error::Tool`] when the program cannot be started, exits
    /// unsuccessfully, or outlives the time limit.
    pub async fn execute(&self) -> cf_core::Result<ToolOutput> {
        let label = program_label(&self.program);
        let fail = |message: String| cf_core::Error::tool(label.clone(), message);

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("failed to spawn: {e}")))?;

        // On timeout the wait future is dropped, which kills the child.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| fail(format!("timed out after {}s", self.timeout.as_secs_f64())))?
            .map_err(|e| fail(format!("I/O error waiting for process: {e}")))?;

        let output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            return Ok(output);
        }

        let diagnostic = tail_chars(output.stderr.trim(), self.diagnostic_tail);
        tracing::error!("{label} exited with {}:\n{diagnostic}", output.status);
        Err(fail(format!("exited with {}: {diagnostic}", output.status)))
    }
}

/// File name of the program, for messages.
fn program_label(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Return at most the last `max_chars` characters of `s`.
pub fn tail_chars(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    let start = s.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(s.len());
    &s[start..]
}
