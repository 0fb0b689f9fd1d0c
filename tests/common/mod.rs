//! Shared fakes for integration tests.
//!
//! [`LineageTool`] stands in for ffmpeg: every output file records which
//! operation produced it from which inputs, so the final artifact spells out
//! its own history. [`KeywordSource`] serves stock media for queries that
//! contain a known keyword.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use cf_av::{Invocation, MediaTool, Workspace};
use cf_pipeline::{ContentRequest, ContentSource};

/// Writes `<step>(<input contents joined by +>)`; concat joins its inputs
/// with `|`.
#[derive(Default)]
pub struct LineageTool {
    pub calls: Mutex<Vec<Invocation>>,
}

impl LineageTool {
    pub fn steps(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.step.clone()).collect()
    }
}

#[async_trait]
impl MediaTool for LineageTool {
    fn name(&self) -> &str {
        "lineage"
    }

    async fn run(&self, inv: &Invocation) -> cf_core::Result<()> {
        self.calls.lock().unwrap().push(inv.clone());
        let parts: Vec<String> = inv
            .inputs
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap_or_default())
            .collect();
        let body = if inv.step == "concat" {
            parts.join("|")
        } else {
            format!("{}({})", inv.step, parts.join("+"))
        };
        std::fs::write(&inv.output, body)?;
        Ok(())
    }
}

/// Finds media only for queries containing `keyword`.
pub struct KeywordSource {
    pub keyword: &'static str,
}

#[async_trait]
impl ContentSource for KeywordSource {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn fetch(
        &self,
        request: &ContentRequest,
        workspace: &Workspace,
    ) -> cf_core::Result<Option<PathBuf>> {
        if !request.query.contains(self.keyword) {
            return Ok(None);
        }
        let path = workspace.transient_path("stock", "mp4");
        std::fs::write(&path, format!("stock[{}]", request.query))?;
        Ok(Some(path))
    }
}

/// Temp dir holding `input.mp4` (contents `src`) and a scratch directory.
pub struct Scene {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub workspace: Workspace,
}

impl Scene {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, "src").unwrap();
        let workspace = Workspace::in_dir(&dir.path().join("scratch")).unwrap();
        Self {
            dir,
            input,
            workspace,
        }
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("final.mp4")
    }

    pub fn scratch_is_empty(&self) -> bool {
        dir_is_empty(self.workspace.dir())
    }
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}
