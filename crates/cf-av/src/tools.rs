//! Locating the external programs cutforge drives.
//!
//! [`ToolRegistry`] resolves each program once, from a configured override or
//! from `PATH`, and hands out the resolved path to whoever needs it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cf_core::config::ToolsConfig;

/// `(program, what cutforge uses it for)`.
const KNOWN_TOOLS: &[(&str, &str)] = &[
    ("ffmpeg", "renders every edit step"),
    ("ffprobe", "reads media duration for slot planning"),
];

/// Availability of one program, as reported by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub purpose: String,
    pub available: bool,
    /// First line of `<tool> -version`.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolved program paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Resolve every known program. A configured path wins when it exists;
    /// otherwise `PATH` is searched. Programs that cannot be found are left
    /// out, and [`ToolRegistry::require`] reports them.
    pub fn discover(config: &ToolsConfig) -> Self {
        let tools = KNOWN_TOOLS
            .iter()
            .filter_map(|&(name, _)| {
                let configured = match name {
                    "ffmpeg" => config.ffmpeg_path.as_deref(),
                    "ffprobe" => config.ffprobe_path.as_deref(),
                    _ => None,
                };
                locate(name, configured).map(|path| (name.to_string(), path))
            })
            .collect();
        Self { tools }
    }

    /// Registry with fixed paths and no discovery.
    pub fn with_paths(entries: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        Self {
            tools: entries.into_iter().collect(),
        }
    }

    /// Path of `name`, or a tool error telling the user to install it.
    pub fn require(&self, name: &str) -> cf_core::Result<&Path> {
        match self.tools.get(name) {
            Some(path) => Ok(path),
            None => Err(cf_core::Error::tool(
                name,
                format!("{name} not found; is it installed and in PATH?"),
            )),
        }
    }

    /// Availability of every known program, in a fixed order.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&(name, purpose)| {
                let path = self.tools.get(name).cloned();
                ToolInfo {
                    name: name.to_string(),
                    purpose: purpose.to_string(),
                    available: path.is_some(),
                    version: path.as_deref().and_then(version_line),
                    path,
                }
            })
            .collect()
    }
}

fn locate(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(
            "Configured {name} path {} does not exist; searching PATH",
            path.display()
        );
    }
    which::which(name).ok()
}

fn version_line(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}
