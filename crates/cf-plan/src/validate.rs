//! Static checks on a canonical plan.
//!
//! These mirror what the executor enforces at run time, so that problems
//! can be reported before any media is touched. Nothing here is fatal.

use std::collections::HashMap;
use std::fmt;

use crate::repair::SOURCE;
use crate::task::{Operation, Task};

/// A structural problem found in a plan. Indices are zero-based.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanIssue {
    /// Two tasks publish the same name; later references see the later one.
    DuplicateOutputId { index: usize, name: String, first: usize },
    /// A name is read before the task that declares it.
    ForwardReference { index: usize, name: String, declared_at: usize },
    /// A name is read that no task declares.
    UnknownReference { index: usize, name: String },
    /// The operation type is not known and will be skipped.
    UnrecognizedType { index: usize, kind: String },
}

impl fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateOutputId { index, name, first } => write!(
                f,
                "task #{} reuses output '{name}' first declared by task #{}",
                index + 1,
                first + 1
            ),
            Self::ForwardReference {
                index,
                name,
                declared_at,
            } => write!(
                f,
                "task #{} reads '{name}' before task #{} produces it",
                index + 1,
                declared_at + 1
            ),
            Self::UnknownReference { index, name } => {
                write!(f, "task #{} reads '{name}', which nothing produces", index + 1)
            }
            Self::UnrecognizedType { index, kind } => {
                write!(f, "task #{} has unknown type '{kind}' and will be skipped", index + 1)
            }
        }
    }
}

/// Check declaration order and uniqueness of names across `tasks`.
///
/// The image of an image overlay may be a filesystem path, so it is only
/// checked when it names a declared output.
pub fn validate_plan(tasks: &[Task]) -> Vec<PlanIssue> {
    let mut declared_at: HashMap<&str, usize> = HashMap::new();
    for (index, task) in tasks.iter().enumerate() {
        if let Some(name) = task.output_id.as_deref() {
            declared_at.entry(name).or_insert(index);
        }
    }

    let mut issues = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (index, task) in tasks.iter().enumerate() {
        if let Operation::Unrecognized { kind, .. } = &task.op {
            issues.push(PlanIssue::UnrecognizedType {
                index,
                kind: kind.clone(),
            });
        }

        let mut reads: Vec<&str> = task.inputs.iter().flatten().map(String::as_str).collect();
        match &task.op {
            Operation::OverlayVideo(p) => reads.push(&p.clip),
            Operation::AddImageOverlay(p) if declared_at.contains_key(p.image.as_str()) => {
                reads.push(&p.image)
            }
            _ => {}
        }

        for name in reads {
            if name == SOURCE || seen.contains_key(name) {
                continue;
            }
            let issue = match declared_at.get(name) {
                Some(&at) => PlanIssue::ForwardReference {
                    index,
                    name: name.to_string(),
                    declared_at: at,
                },
                None => PlanIssue::UnknownReference {
                    index,
                    name: name.to_string(),
                },
            };
            issues.push(issue);
        }

        if let Some(name) = task.output_id.as_deref() {
            if let Some(&first) = seen.get(name) {
                issues.push(PlanIssue::DuplicateOutputId {
                    index,
                    name: name.to_string(),
                    first,
                });
            } else {
                seen.insert(name, index);
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_plan;
    use serde_json::json;

    fn tasks(doc: serde_json::Value) -> Vec<Task> {
        normalize_plan(&doc).unwrap().tasks
    }

    #[test]
    fn clean_plan_has_no_issues() {
        let plan = tasks(json!([
            {"type": "trim", "params": {"start": 0, "end": 15}, "output_id": "clip_a", "inputs": ["source"]},
            {"type": "fetch_stock_video", "params": {"query": "sea"}, "output_id": "broll_1"},
            {"type": "trim", "params": {"start": 15, "end": 30}, "output_id": "clip_b", "inputs": ["source"]},
            {"type": "concat", "inputs": ["clip_a", "broll_1", "clip_b"]},
            {"type": "add_image_overlay", "params": {"image": "/tmp/logo.png"}}
        ]));
        assert!(validate_plan(&plan).is_empty());
    }

    #[test]
    fn reports_ordering_and_naming_problems() {
        let plan = tasks(json!([
            {"type": "concat", "inputs": ["later", "ghost"]},
            {"type": "resize", "output_id": "later"},
            {"type": "zoompan", "output_id": "later"},
            {"type": "sharpen"}
        ]));
        let issues = validate_plan(&plan);
        assert_eq!(
            issues,
            vec![
                PlanIssue::ForwardReference { index: 0, name: "later".into(), declared_at: 1 },
                PlanIssue::UnknownReference { index: 0, name: "ghost".into() },
                PlanIssue::DuplicateOutputId { index: 2, name: "later".into(), first: 1 },
                PlanIssue::UnrecognizedType { index: 3, kind: "sharpen".into() },
            ]
        );
        assert_eq!(
            issues[1].to_string(),
            "task #1 reads 'ghost', which nothing produces"
        );
    }
}
