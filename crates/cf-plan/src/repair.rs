//! Structural repair of canonical plans.
//!
//! [`PlanRepairer`] never rejects a plan. It fixes what it can and reports
//! every change as a [`Correction`]:
//!
//! 1. fetch tasks without an `output_id` get a fresh `stock_N` name;
//! 2. a trim+concat assembly over the source is rewritten as overlays on
//!    the source, or its concat inputs are interleaved when no gaps exist;
//! 3. video overlay windows are clamped to the allowed duration;
//! 4. overlays beyond `max_inserts` are dropped together with the fetches
//!    only they used.
//!
//! Running the repairer on its own output changes nothing.

use std::collections::HashSet;
use std::fmt;

use cf_core::config::InsertRules;
use cf_core::{ceil_tenth, floor_tenth, round_tenth};

use crate::slots::Slot;
use crate::task::{FetchVideoParams, Operation, OperationKind, Task, TrimParams, VideoOverlayParams};

/// Name of the original input in the artifact registry.
pub const SOURCE: &str = "source";

/// One change made by the repairer.
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    AssignedOutputId { index: usize, name: String },
    ClampedDuration { clip: String, start: f64, from: Option<f64>, to: f64 },
    TruncatedInserts { kept: usize, removed: usize },
    RemovedOrphanFetch { name: String },
    DroppedReference { name: String },
    RewroteAssembly { overlays: usize },
    ReorderedConcat { inputs: Vec<String> },
    SynthesizedInserts { count: usize },
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssignedOutputId { index, name } => {
                write!(f, "task #{} named '{name}'", index + 1)
            }
            Self::ClampedDuration { clip, start, from, to } => match from {
                Some(from) => write!(f, "overlay of '{clip}' at {start}s: end {from}s -> {to}s"),
                None => write!(f, "overlay of '{clip}' at {start}s: end set to {to}s"),
            },
            Self::TruncatedInserts { kept, removed } => {
                write!(f, "kept {kept} insert(s), removed {removed}")
            }
            Self::RemovedOrphanFetch { name } => write!(f, "removed unused fetch '{name}'"),
            Self::DroppedReference { name } => {
                write!(f, "dropped reference to removed output '{name}'")
            }
            Self::RewroteAssembly { overlays } => write!(
                f,
                "rewrote trim+concat assembly as {overlays} overlay(s) on the source"
            ),
            Self::ReorderedConcat { inputs } => {
                write!(f, "concat inputs set to [{}]", inputs.join(", "))
            }
            Self::SynthesizedInserts { count } => {
                write!(f, "added {count} fetch+overlay pair(s) from slots")
            }
        }
    }
}

/// Everything the repairer changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairReport {
    pub corrections: Vec<Correction>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty()
    }
}

/// Enforces insertion rules and structural invariants on a plan.
#[derive(Debug, Clone)]
pub struct PlanRepairer {
    rules: InsertRules,
}

impl PlanRepairer {
    pub fn new(rules: InsertRules) -> Self {
        Self { rules }
    }

    /// Repair `tasks`, returning the corrected plan and what changed.
    pub fn repair(&self, mut tasks: Vec<Task>) -> (Vec<Task>, RepairReport) {
        let mut report = RepairReport::default();

        assign_output_ids(&mut tasks, &mut report);
        repair_assembly(&mut tasks, &mut report);
        self.clamp_durations(&mut tasks, &mut report);
        self.truncate_inserts(&mut tasks, &mut report);

        for correction in &report.corrections {
            tracing::warn!("Plan corrected: {correction}");
        }
        tracing::info!(
            "Plan has {} task(s), {} overlay insert(s)",
            tasks.len(),
            count_kind(&tasks, OperationKind::OverlayVideo)
        );

        (tasks, report)
    }

    /// Append one fetch+overlay pair per slot when the plan has no overlay
    /// inserts at all, then repair the result.
    pub fn repair_with_slots(&self, mut tasks: Vec<Task>, slots: &[Slot]) -> (Vec<Task>, RepairReport) {
        if slots.is_empty() || count_kind(&tasks, OperationKind::OverlayVideo) > 0 {
            return self.repair(tasks);
        }

        tracing::info!("Plan has no inserts; adding {} from slots", slots.len());
        let mut used = declared_names(&tasks);
        let mut counter = 0;
        for slot in slots {
            let name = next_stock_name(&mut used, &mut counter);
            let query = if slot.query.trim().is_empty() {
                slot.context_text.chars().take(80).collect()
            } else {
                slot.query.clone()
            };
            tasks.push(
                Task::new(Operation::FetchStockVideo(FetchVideoParams {
                    query,
                    alternative_queries: slot.alternative_queries.clone(),
                    duration_max: 30.0,
                    orientation: "landscape".into(),
                }))
                .with_output(name.clone()),
            );
            tasks.push(Task::new(Operation::OverlayVideo(VideoOverlayParams {
                start_time: slot.start,
                end_time: Some(slot.end),
                clip: name,
            })));
        }

        let (tasks, mut report) = self.repair(tasks);
        report.corrections.insert(
            0,
            Correction::SynthesizedInserts {
                count: slots.len(),
            },
        );
        (tasks, report)
    }

    fn clamp_durations(&self, tasks: &mut [Task], report: &mut RepairReport) {
        for task in tasks.iter_mut() {
            let Operation::OverlayVideo(p) = &mut task.op else {
                continue;
            };

            let start = p.start_time;
            let clamped = match p.end_time {
                Some(end) if self.rules.clamp_duration(end - start) == end - start => end,
                Some(end) => self.end_within_rules(start, end),
                None => self.end_within_rules(start, start),
            };

            if p.end_time != Some(clamped) {
                report.corrections.push(Correction::ClampedDuration {
                    clip: p.clip.clone(),
                    start,
                    from: p.end_time,
                    to: clamped,
                });
                p.end_time = Some(clamped);
            }
        }
    }

    /// Nearest end on the tenth grid that puts `end - start` inside the
    /// duration rules. Off-grid when the rules are narrower than a tenth.
    fn end_within_rules(&self, start: f64, end: f64) -> f64 {
        let rules = &self.rules;
        let lo = ceil_tenth(start + rules.min_duration);
        let hi = floor_tenth(start + rules.max_duration);
        if lo > hi {
            start + rules.clamp_duration(end - start)
        } else if end - start < rules.min_duration {
            lo
        } else {
            hi
        }
    }

    fn truncate_inserts(&self, tasks: &mut Vec<Task>, report: &mut RepairReport) {
        let overlays: Vec<usize> = positions(tasks, OperationKind::OverlayVideo);
        if overlays.len() <= self.rules.max_inserts {
            return;
        }

        let removed: HashSet<usize> = overlays[self.rules.max_inserts..].iter().copied().collect();
        let mut removed_clips = HashSet::new();
        let mut removed_outputs = HashSet::new();
        for &i in &removed {
            if let Operation::OverlayVideo(p) = &tasks[i].op {
                removed_clips.insert(p.clip.clone());
            }
            if let Some(id) = &tasks[i].output_id {
                removed_outputs.insert(id.clone());
            }
        }

        let mut kept: Vec<Task> = std::mem::take(tasks)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, t)| t)
            .collect();
        report.corrections.push(Correction::TruncatedInserts {
            kept: self.rules.max_inserts,
            removed: removed.len(),
        });

        let still_referenced: HashSet<String> = kept
            .iter()
            .flat_map(|t| t.referenced_names())
            .map(str::to_string)
            .collect();
        kept.retain(|t| {
            let orphan = t.kind().is_some_and(OperationKind::is_fetch)
                && t.output_id.as_ref().is_some_and(|id| {
                    removed_clips.contains(id) && !still_referenced.contains(id)
                });
            if orphan {
                report.corrections.push(Correction::RemovedOrphanFetch {
                    name: t.output_id.clone().unwrap_or_default(),
                });
            }
            !orphan
        });

        for task in &mut kept {
            let Some(inputs) = &mut task.inputs else {
                continue;
            };
            inputs.retain(|name| {
                let dangling = removed_outputs.contains(name);
                if dangling {
                    report.corrections.push(Correction::DroppedReference { name: name.clone() });
                }
                !dangling
            });
            if inputs.is_empty() {
                task.inputs = None;
            }
        }

        *tasks = kept;
    }
}

fn count_kind(tasks: &[Task], kind: OperationKind) -> usize {
    tasks.iter().filter(|t| t.is_kind(kind)).count()
}

fn positions(tasks: &[Task], kind: OperationKind) -> Vec<usize> {
    tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_kind(kind))
        .map(|(i, _)| i)
        .collect()
}

fn declared_names(tasks: &[Task]) -> HashSet<String> {
    tasks
        .iter()
        .filter_map(|t| t.output_id.clone())
        .chain([SOURCE.to_string()])
        .collect()
}

fn next_stock_name(used: &mut HashSet<String>, counter: &mut usize) -> String {
    loop {
        *counter += 1;
        let name = format!("stock_{counter}");
        if used.insert(name.clone()) {
            return name;
        }
    }
}

fn assign_output_ids(tasks: &mut [Task], report: &mut RepairReport) {
    let mut used = declared_names(tasks);
    let mut counter = 0;
    for (index, task) in tasks.iter_mut().enumerate() {
        if task.kind().is_some_and(OperationKind::is_fetch) && task.output_id.is_none() {
            let name = next_stock_name(&mut used, &mut counter);
            report.corrections.push(Correction::AssignedOutputId {
                index,
                name: name.clone(),
            });
            task.output_id = Some(name);
        }
    }
}

/// A trim of the source named for later assembly.
struct SourceTrim {
    index: usize,
    name: String,
    start: f64,
    end: Option<f64>,
}

fn repair_assembly(tasks: &mut Vec<Task>, report: &mut RepairReport) {
    if count_kind(tasks, OperationKind::OverlayVideo) > 0 {
        return;
    }
    let Some(concat_idx) = tasks
        .iter()
        .position(|t| t.is_kind(OperationKind::Concat) && t.inputs.is_some())
    else {
        return;
    };

    let fetches: Vec<String> = tasks[..concat_idx]
        .iter()
        .filter(|t| t.is_kind(OperationKind::FetchStockVideo))
        .filter_map(|t| t.output_id.clone())
        .collect();

    let trims: Vec<SourceTrim> = tasks[..concat_idx]
        .iter()
        .enumerate()
        .filter_map(|(index, t)| match (&t.op, &t.output_id, &t.inputs) {
            (Operation::Trim(p), Some(name), Some(inputs)) if inputs.len() == 1 && inputs[0] == SOURCE => {
                Some(SourceTrim {
                    index,
                    name: name.clone(),
                    start: p.start,
                    end: p.end,
                })
            }
            _ => None,
        })
        .collect();

    if fetches.is_empty() || trims.is_empty() {
        return;
    }

    let concat_inputs = tasks[concat_idx].inputs.clone().unwrap_or_default();
    let trim_names: HashSet<&str> = trims.iter().map(|t| t.name.as_str()).collect();
    let fetch_names: HashSet<&str> = fetches.iter().map(String::as_str).collect();
    if let Some(foreign) = concat_inputs
        .iter()
        .find(|n| !trim_names.contains(n.as_str()) && !fetch_names.contains(n.as_str()))
    {
        tracing::debug!("Concat input '{foreign}' is not a source trim or fetch; assembly left as is");
        return;
    }

    let trims_used_elsewhere = tasks
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != concat_idx)
        .flat_map(|(_, t)| t.referenced_names())
        .any(|n| trim_names.contains(n));

    // Every gap needs a clip; an unfilled gap would put cut footage back.
    let gaps = source_gaps(&trims);
    if !gaps.is_empty() && gaps.len() <= fetches.len() && !trims_used_elsewhere {
        rewrite_as_overlays(tasks, concat_idx, &trims, &gaps, &fetches, &concat_inputs, report);
    } else {
        interleave_concat(tasks, concat_idx, &trims, &fetches, &concat_inputs, report);
    }
}

/// Positive gaps between consecutive source trims, in time order. Empty if
/// any trim has an open end.
fn source_gaps(trims: &[SourceTrim]) -> Vec<(f64, f64)> {
    let mut windows: Vec<(f64, f64)> = Vec::with_capacity(trims.len());
    for t in trims {
        match t.end {
            Some(end) => windows.push((t.start, end)),
            None => return Vec::new(),
        }
    }
    windows.sort_by(|a, b| a.0.total_cmp(&b.0));
    windows
        .windows(2)
        .filter(|w| w[1].0 > w[0].1)
        .map(|w| (w[0].1, w[1].0))
        .collect()
}

fn rewrite_as_overlays(
    tasks: &mut Vec<Task>,
    concat_idx: usize,
    trims: &[SourceTrim],
    gaps: &[(f64, f64)],
    fetches: &[String],
    concat_inputs: &[String],
    report: &mut RepairReport,
) {
    let first_start = trims.iter().map(|t| t.start).fold(f64::INFINITY, f64::min);
    let last_end = trims
        .iter()
        .filter_map(|t| t.end)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut replacement: Vec<Task> = gaps
        .iter()
        .zip(fetches)
        .enumerate()
        .map(|(i, (&(start, end), clip))| {
            let task = Task::new(Operation::OverlayVideo(VideoOverlayParams {
                start_time: round_tenth(start),
                end_time: Some(round_tenth(end)),
                clip: clip.clone(),
            }));
            if i == 0 {
                task.with_inputs([SOURCE])
            } else {
                task
            }
        })
        .collect();
    let overlays = replacement.len();
    let used_clips: HashSet<String> = fetches.iter().take(overlays).cloned().collect();

    let mut bounding = Task::new(Operation::Trim(TrimParams {
        start: first_start,
        end: Some(last_end),
    }));
    bounding.output_id = tasks[concat_idx].output_id.clone();
    replacement.push(bounding);

    let trim_indices: HashSet<usize> = trims.iter().map(|t| t.index).collect();
    let mut rebuilt = Vec::with_capacity(tasks.len());
    for (i, task) in std::mem::take(tasks).into_iter().enumerate() {
        if i == concat_idx {
            rebuilt.append(&mut replacement);
        } else if !trim_indices.contains(&i) {
            rebuilt.push(task);
        }
    }

    let referenced: HashSet<String> = rebuilt
        .iter()
        .flat_map(|t| t.referenced_names())
        .map(str::to_string)
        .collect();
    let mut dropped = Vec::new();
    rebuilt.retain(|t| match &t.output_id {
        Some(id)
            if t.is_kind(OperationKind::FetchStockVideo)
                && concat_inputs.contains(id)
                && !used_clips.contains(id)
                && !referenced.contains(id) =>
        {
            dropped.push(id.clone());
            false
        }
        _ => true,
    });

    report.corrections.push(Correction::RewroteAssembly { overlays });
    report
        .corrections
        .extend(dropped.into_iter().map(|name| Correction::RemovedOrphanFetch { name }));
    *tasks = rebuilt;
}

fn interleave_concat(
    tasks: &mut [Task],
    concat_idx: usize,
    trims: &[SourceTrim],
    fetches: &[String],
    concat_inputs: &[String],
    report: &mut RepairReport,
) {
    let mut interleaved = Vec::with_capacity(trims.len() + fetches.len());
    for i in 0..trims.len().max(fetches.len()) {
        if let Some(t) = trims.get(i) {
            interleaved.push(t.name.clone());
        }
        if let Some(f) = fetches.get(i) {
            interleaved.push(f.clone());
        }
    }

    if interleaved.as_slice() != concat_inputs {
        report.corrections.push(Correction::ReorderedConcat {
            inputs: interleaved.clone(),
        });
        tasks[concat_idx].inputs = Some(interleaved);
    }
}
