//! Task graph executor: runs a validated plan against an artifact registry
//! and persists one final artifact.
//!
//! Tasks run strictly in order. Each recognized transformation resolves its
//! inputs by name (or takes the current chain artifact), writes a fresh
//! transient file through the [`MediaTool`], and publishes it. Fetch tasks
//! ask the [`ContentSource`] instead and only register their result by name.
//! Every transient file is removed when the run ends, whether it succeeded
//! or not.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use cf_av::actions::default_font;
use cf_av::{MediaTool, Workspace};
use cf_core::{Error, Result};
use cf_plan::{Operation, OperationKind, Task};

use crate::registry::ArtifactRegistry;
use crate::source::{fetch_with_fallback, ContentRequest, ContentSource, MediaKind, NoContent};
use crate::steps::{self, Prepared, StepFiles};

/// A task that was passed over without failing the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTask {
    /// 1-based plan position.
    pub index: usize,
    pub step: String,
    pub reason: String,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Where the final artifact was persisted.
    pub output: PathBuf,
    /// Number of tasks that produced an artifact, fetches included.
    pub steps: usize,
    /// Names published to the registry, in first-publication order.
    pub produced: Vec<String>,
    pub skipped: Vec<SkippedTask>,
    /// Transient files removed at the end of the run.
    pub cleaned: usize,
}

enum StepOutcome {
    Done,
    Skipped(String),
}

/// Runs plans with one media tool and one content source.
pub struct TaskGraphExecutor {
    tool: Arc<dyn MediaTool>,
    content: Arc<dyn ContentSource>,
    font: PathBuf,
}

impl TaskGraphExecutor {
    /// Create an executor with no content source; every fetch misses.
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self {
            tool,
            content: Arc::new(NoContent),
            font: default_font(),
        }
    }

    /// Builder: set the source used by fetch tasks.
    pub fn with_content_source(mut self, content: Arc<dyn ContentSource>) -> Self {
        self.content = content;
        self
    }

    /// Builder: set the font used by text overlays.
    pub fn with_font(mut self, font: PathBuf) -> Self {
        self.font = font;
        self
    }

    /// Execute `tasks` on `source` and persist the final artifact at `output`.
    ///
    /// # Errors
    ///
    /// The first unresolved reference, blocked input or tool failure aborts
    /// the run. Transient files are removed in every case.
    pub async fn run(
        &self,
        tasks: &[Task],
        source: &Path,
        output: &Path,
        workspace: &Workspace,
    ) -> Result<RunReport> {
        if !source.is_file() {
            return Err(Error::Validation(format!(
                "input {} does not exist",
                source.display()
            )));
        }

        let declared = tasks.iter().filter_map(|t| t.output_id.clone());
        let mut registry = ArtifactRegistry::new(source, declared);
        let mut report = RunReport::default();
        let started = Instant::now();

        tracing::info!(
            "Running {} task(s) on {} with {}",
            tasks.len(),
            source.display(),
            self.tool.name()
        );

        let result = match self
            .execute_tasks(tasks, &mut registry, workspace, &mut report)
            .await
        {
            Ok(()) => self.persist(&mut registry, workspace, output),
            Err(e) => Err(e),
        };

        report.cleaned = registry.cleanup(workspace);

        match result {
            Ok(path) => {
                tracing::info!(
                    "[100%] Wrote {} in {:.1}s ({} step(s), {} skipped)",
                    path.display(),
                    started.elapsed().as_secs_f64(),
                    report.steps,
                    report.skipped.len()
                );
                report.output = path;
                report.produced = registry.produced_names().to_vec();
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Plan failed: {e}");
                Err(e)
            }
        }
    }

    async fn execute_tasks(
        &self,
        tasks: &[Task],
        registry: &mut ArtifactRegistry,
        workspace: &Workspace,
        report: &mut RunReport,
    ) -> Result<()> {
        let total = tasks.len();

        for (i, task) in tasks.iter().enumerate() {
            let index = i + 1;
            let step = task.op.type_name().to_string();

            let Some(kind) = task.kind() else {
                tracing::warn!("Skipping task #{index}: unknown operation '{step}'");
                report.skipped.push(SkippedTask {
                    index,
                    step,
                    reason: "unknown operation type".into(),
                });
                continue;
            };

            tracing::info!("Starting #{index}/{total}: {task}");
            let started = Instant::now();

            let outcome = if kind.is_fetch() {
                self.fetch(task, kind, registry, workspace).await
            } else {
                self.transform(task, kind, index, registry, workspace).await?
            };

            match outcome {
                StepOutcome::Done => {
                    report.steps += 1;
                    tracing::info!(
                        "[{:.0}%] Completed: {} ({:.1}s)",
                        index as f64 / total as f64 * 100.0,
                        task,
                        started.elapsed().as_secs_f64()
                    );
                }
                StepOutcome::Skipped(reason) => {
                    tracing::warn!("Skipping task #{index} ({step}): {reason}");
                    report.skipped.push(SkippedTask {
                        index,
                        step,
                        reason,
                    });
                }
            }
        }

        Ok(())
    }

    /// Ask the content source for media. A miss blocks the task's name.
    async fn fetch(
        &self,
        task: &Task,
        kind: OperationKind,
        registry: &mut ArtifactRegistry,
        workspace: &Workspace,
    ) -> StepOutcome {
        let (template, alternatives) = match &task.op {
            Operation::FetchStockVideo(p) => (
                ContentRequest {
                    query: p.query.clone(),
                    kind: MediaKind::Video,
                    max_duration: Some(p.duration_max),
                    orientation: p.orientation.clone(),
                },
                p.alternative_queries.as_slice(),
            ),
            Operation::FetchStockImage(p) => (
                ContentRequest {
                    query: p.query.clone(),
                    kind: MediaKind::Image,
                    max_duration: None,
                    orientation: p.orientation.clone(),
                },
                p.alternative_queries.as_slice(),
            ),
            _ => return StepOutcome::Skipped("not a fetch".into()),
        };

        let Some(name) = task.output_id.as_deref() else {
            return StepOutcome::Skipped("fetch result has no output_id".into());
        };

        match fetch_with_fallback(self.content.as_ref(), &template, alternatives, workspace).await {
            Some(path) => {
                if path.starts_with(workspace.dir()) {
                    registry.track(path.clone());
                }
                registry.publish(Some(name), &path, kind.chain_effect());
                StepOutcome::Done
            }
            None => {
                registry.block(name);
                StepOutcome::Skipped(format!("no content found, '{name}' is blocked"))
            }
        }
    }

    async fn transform(
        &self,
        task: &Task,
        kind: OperationKind,
        index: usize,
        registry: &mut ArtifactRegistry,
        workspace: &Workspace,
    ) -> Result<StepOutcome> {
        let step = task.op.type_name();

        if kind.is_optional_insert() {
            if let Some(name) = task
                .referenced_names()
                .into_iter()
                .find(|n| registry.is_blocked(n))
            {
                return Ok(StepOutcome::Skipped(format!("'{name}' was never fetched")));
            }
        }

        let inputs: Vec<PathBuf> = match (&task.op, &task.inputs) {
            (_, Some(names)) => names
                .iter()
                .map(|n| resolve(registry, n, step, index))
                .collect::<Result<_>>()?,
            (Operation::Concat(p), None) => p
                .clip_paths
                .iter()
                .filter(|clip| {
                    let exists = clip.is_file();
                    if !exists {
                        tracing::warn!("Concat clip {} does not exist", clip.display());
                    }
                    exists
                })
                .cloned()
                .collect(),
            (_, None) => vec![registry.current().to_path_buf()],
        };

        let attachment = match &task.op {
            Operation::OverlayVideo(p) => Some(resolve(registry, &p.clip, step, index)?),
            Operation::AddImageOverlay(p) => match registry.resolve(&p.image) {
                Some(path) => Some(path.to_path_buf()),
                None if registry.is_declared(&p.image) => {
                    return Err(unresolved(registry, &p.image, step, index))
                }
                None => Some(PathBuf::from(&p.image)).filter(|path| path.is_file()),
            },
            _ => None,
        };

        let output = workspace.transient_path(kind.wire_name(), "mp4");
        registry.track(output.clone());

        let files = StepFiles {
            inputs: &inputs,
            attachment: attachment.as_deref(),
            output: &output,
        };
        let invocation = match steps::prepare(&task.op, files, &self.font, workspace, registry)
            .map_err(|e| Error::execution(step, index, e.to_string()))?
        {
            Prepared::Run(invocation) => invocation,
            Prepared::Skip(reason) => return Ok(StepOutcome::Skipped(reason)),
        };

        self.tool
            .run(&invocation)
            .await
            .map_err(|e| Error::execution(step, index, e.to_string()))?;

        registry.publish(task.output_id.as_deref(), &output, kind.chain_effect());
        Ok(StepOutcome::Done)
    }

    /// Copy the current artifact out and mark it as kept.
    fn persist(
        &self,
        registry: &mut ArtifactRegistry,
        workspace: &Workspace,
        output: &Path,
    ) -> Result<PathBuf> {
        let last = registry.current().to_path_buf();
        let dest = workspace.finalize(&last, output)?;
        registry.persist(&dest);
        Ok(dest)
    }
}

fn resolve(registry: &ArtifactRegistry, name: &str, step: &str, index: usize) -> Result<PathBuf> {
    match registry.resolve(name) {
        Some(path) => Ok(path.to_path_buf()),
        None if registry.is_blocked(name) => Err(Error::Blocked {
            step: step.to_string(),
            index,
            name: name.to_string(),
        }),
        None => Err(unresolved(registry, name, step, index)),
    }
}

fn unresolved(registry: &ArtifactRegistry, name: &str, step: &str, index: usize) -> Error {
    Error::UnresolvedReference {
        step: step.to_string(),
        index,
        name: name.to_string(),
        available: registry.available(),
    }
}
