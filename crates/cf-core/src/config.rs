//! Runtime settings for cutforge.
//!
//! A config file is JSON with four optional sections: `tools`, `rules`,
//! `executor` and `content`. Missing keys take their defaults, so `{}` is a
//! complete config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub rules: InsertRules,
    pub executor: ExecutorConfig,
    pub content: ContentConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read `path` if given. Any problem with the file is logged and the
    /// defaults are used instead; a bad config never stops a run.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let loaded = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Config {} not found, running with defaults", path.display());
                return Self::default();
            }
            Err(e) => Err(Error::from(e)),
        };

        loaded.unwrap_or_else(|e| {
            tracing::warn!("Ignoring config {}: {e}", path.display());
            Self::default()
        })
    }

    /// Problems worth telling the user about. None of them are fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.rules.validate();

        if self.executor.tool_timeout_secs == 0 {
            warnings.push("executor.tool_timeout_secs is 0; every tool call will time out".into());
        }

        let paths = [
            ("tools.ffmpeg_path", self.tools.ffmpeg_path.as_deref()),
            ("tools.ffprobe_path", self.tools.ffprobe_path.as_deref()),
            ("executor.font_path", self.executor.font_path.as_deref()),
            ("content.library_dir", self.content.library_dir.as_deref()),
        ];
        for (key, path) in paths {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!("{key} '{}' does not exist", p.display()));
                }
            }
        }

        warnings
    }
}

/// Explicit program paths; unset entries are looked up on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Timing rules for supplementary-media insertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertRules {
    /// Maximum number of insertions per video.
    pub max_inserts: usize,
    /// Minimum insertion length in seconds.
    pub min_duration: f64,
    /// Maximum insertion length in seconds.
    pub max_duration: f64,
    /// Speech needed around a proposed slot for the proposal to be kept.
    pub min_topic_sec: f64,
    /// No insertion may start before this offset.
    pub avoid_first: f64,
    /// No insertion may end within this many seconds of the end.
    pub avoid_last: f64,
    /// Minimum distance between the end of one insertion and the next start.
    pub min_gap: f64,
}

impl Default for InsertRules {
    fn default() -> Self {
        Self {
            max_inserts: 3,
            min_duration: 4.0,
            max_duration: 5.0,
            min_topic_sec: 5.0,
            avoid_first: 6.0,
            avoid_last: 8.0,
            min_gap: 10.0,
        }
    }
}

impl InsertRules {
    /// Target insertion length: the midpoint of the allowed range.
    pub fn target_duration(&self) -> f64 {
        (self.min_duration + self.max_duration) / 2.0
    }

    /// Clamp a duration into `[min_duration, max_duration]`.
    pub fn clamp_duration(&self, duration: f64) -> f64 {
        duration.max(self.min_duration).min(self.max_duration)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_inserts == 0 {
            warnings.push("rules.max_inserts is 0; no insertions will be planned".into());
        }
        if self.min_duration > self.max_duration {
            warnings.push(format!(
                "rules.min_duration ({}) exceeds rules.max_duration ({})",
                self.min_duration, self.max_duration
            ));
        }
        if self.min_duration <= 0.0 {
            warnings.push("rules.min_duration should be positive".into());
        }
        warnings
    }
}

/// Policy for running a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on a single external tool invocation. Exceeding it kills
    /// the process and fails the run; there is no retry.
    pub tool_timeout_secs: u64,
    /// How much of a failing tool's stderr is kept for logs and errors.
    pub diagnostic_tail_chars: usize,
    /// Font file used by text overlays. Platform default when unset.
    pub font_path: Option<PathBuf>,
    /// Scratch directory for transient artifacts. A private temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

fn default_tool_timeout() -> u64 {
    900
}

fn default_diagnostic_tail() -> usize {
    3000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout(),
            diagnostic_tail_chars: default_diagnostic_tail(),
            font_path: None,
            scratch_dir: None,
        }
    }
}

/// Supplementary media lookup settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory searched by the built-in directory content source.
    pub library_dir: Option<PathBuf>,
}
