//! Coercion of raw plan documents into canonical [`Task`]s.
//!
//! Plan authors spell the same field several ways. Every alternative is
//! resolved here, once, through the alias tables below; timestamps are parsed
//! into seconds at the same time. Records that cannot be coerced are dropped
//! with a warning rather than failing the plan.

use serde_json::{Map, Value};

use cf_core::parse_timestamp;

use crate::task::{Operation, OperationKind, Task};

/// Keys naming the operation type, in priority order.
pub const TYPE_KEYS: &[&str] = &["type", "task_type", "action", "step", "operation"];
/// Keys naming the output artifact.
pub const ID_KEYS: &[&str] = &["output_id", "id"];
/// Keys holding the parameter object.
pub const PARAMS_KEYS: &[&str] = &["params", "parameters", "config"];
/// Keys holding the task list in a plan document.
pub const TASK_LIST_KEYS: &[&str] = &["tasks", "task_list", "steps"];
/// Keys naming the clip a video overlay shows.
pub const CLIP_KEYS: &[&str] = &["clip", "stock_id", "clip_id"];
/// Parameter keys that hold timestamps.
pub const TIME_KEYS: &[&str] = &["start_time", "end_time", "start", "end"];

/// A raw record that could not be turned into a task.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRecord {
    /// Zero-based position in the raw task list.
    pub position: usize,
    pub reason: String,
}

/// Result of normalizing a plan document.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub tasks: Vec<Task>,
    pub dropped: Vec<DroppedRecord>,
}

/// Normalize a plan given as JSON text.
pub fn normalize_plan_str(json: &str) -> cf_core::Result<Normalized> {
    let doc: Value = serde_json::from_str(json)
        .map_err(|e| cf_core::Error::Plan(format!("plan is not valid JSON: {e}")))?;
    normalize_plan(&doc)
}

/// Normalize a plan document: either a bare task array or an object holding
/// one under any of [`TASK_LIST_KEYS`].
pub fn normalize_plan(doc: &Value) -> cf_core::Result<Normalized> {
    let records = match doc {
        Value::Array(items) => items,
        Value::Object(obj) => first_of(obj, TASK_LIST_KEYS)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                cf_core::Error::Plan(format!(
                    "plan object has no task list (looked for {})",
                    TASK_LIST_KEYS.join(", ")
                ))
            })?,
        _ => {
            return Err(cf_core::Error::Plan(
                "plan must be a JSON array or object".into(),
            ))
        }
    };

    let mut out = Normalized::default();
    for (position, raw) in records.iter().enumerate() {
        match normalize_record(raw) {
            Ok(task) => out.tasks.push(task),
            Err(reason) => {
                tracing::warn!("Dropping plan record #{}: {reason}", position + 1);
                out.dropped.push(DroppedRecord { position, reason });
            }
        }
    }

    tracing::debug!(
        "Normalized {} task(s), dropped {}",
        out.tasks.len(),
        out.dropped.len()
    );
    Ok(out)
}

/// Coerce one raw record into a task, or explain why it cannot be.
pub fn normalize_record(raw: &Value) -> Result<Task, String> {
    let obj = raw.as_object().ok_or("record is not an object")?;

    let type_name = first_of(obj, TYPE_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("record has no operation type")?;

    let output_id = first_of(obj, ID_KEYS).and_then(name_value);

    let inputs = match obj.get("inputs") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(vec![s.clone()]),
        Some(Value::Array(items)) => {
            let names: Vec<String> = items.iter().filter_map(name_value).collect();
            if names.len() != items.len() {
                return Err("inputs must be a list of names".into());
            }
            Some(names).filter(|n| !n.is_empty())
        }
        Some(_) => return Err("inputs must be a list of names".into()),
    };

    let mut params = match first_of(obj, PARAMS_KEYS) {
        Some(Value::Object(p)) => p.clone(),
        _ => Map::new(),
    };

    if OperationKind::parse(type_name) == Some(OperationKind::OverlayVideo) {
        resolve_clip_alias(&mut params);
    }
    normalize_times(&mut params);
    if let Some(Value::Array(cues)) = params.get_mut("segments") {
        for cue in cues.iter_mut().filter_map(Value::as_object_mut) {
            normalize_times(cue);
        }
    }

    let op = Operation::from_parts(type_name, Value::Object(params))
        .map_err(|e| format!("{type_name}: {e}"))?;

    Ok(Task {
        op,
        output_id,
        inputs,
    })
}

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

/// A registry name: a non-empty string, or a number written without quotes.
fn name_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn resolve_clip_alias(params: &mut Map<String, Value>) {
    let clip = CLIP_KEYS
        .iter()
        .find_map(|k| params.get(*k).and_then(name_value));
    for key in CLIP_KEYS {
        params.remove(*key);
    }
    if let Some(clip) = clip {
        params.insert("clip".into(), Value::String(clip));
    }
}

/// Replace timestamp-shaped values with seconds. Values that do not parse
/// are left for the typed parameters to reject.
fn normalize_times(params: &mut Map<String, Value>) {
    for key in TIME_KEYS {
        if let Some(value) = params.get_mut(*key) {
            if let Some(secs) = parse_timestamp(value) {
                if let Some(n) = serde_json::Number::from_f64(secs) {
                    *value = Value::Number(n);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TrimParams, VideoOverlayParams};
    use serde_json::json;

    #[test]
    fn alternate_keys_are_resolved() {
        let task = normalize_record(&json!({
            "action": "trim",
            "id": "intro",
            "parameters": {"start": "00:05", "end": "1:00"},
            "inputs": "source"
        }))
        .unwrap();

        assert_eq!(
            task.op,
            Operation::Trim(TrimParams {
                start: 5.0,
                end: Some(60.0)
            })
        );
        assert_eq!(task.output_id.as_deref(), Some("intro"));
        assert_eq!(task.inputs, Some(vec!["source".to_string()]));
    }

    #[test]
    fn clip_aliases_and_hms() {
        let task = normalize_record(&json!({
            "type": "overlay_video",
            "params": {"start_time": "00:01:02.5", "end_time": 67, "stock_id": "stock_2"}
        }))
        .unwrap();
        assert_eq!(
            task.op,
            Operation::OverlayVideo(VideoOverlayParams {
                start_time: 62.5,
                end_time: Some(67.0),
                clip: "stock_2".into()
            })
        );
    }

    #[test]
    fn subtitle_cue_times_are_parsed() {
        let task = normalize_record(&json!({
            "type": "add_subtitles",
            "params": {"segments": [{"start": "0:01", "end": "0:02.5", "text": "hi"}]}
        }))
        .unwrap();
        let Operation::AddSubtitles(p) = task.op else {
            panic!("wrong variant");
        };
        assert_eq!(p.segments[0].start, 1.0);
        assert_eq!(p.segments[0].end, Some(2.5));
    }

    #[test]
    fn malformed_records_are_dropped() {
        let doc = json!({"steps": [
            {"type": "resize", "params": {"width": 640}},
            "not a record",
            {"params": {"width": 640}},
            {"type": "trim", "params": {"start": "soon"}},
            {"type": "concat", "inputs": [1, {"x": 1}]},
            {"type": "zoompan"}
        ]});
        let out = normalize_plan(&doc).unwrap();
        assert_eq!(out.tasks.len(), 2);
        let dropped: Vec<usize> = out.dropped.iter().map(|d| d.position).collect();
        assert_eq!(dropped, vec![1, 2, 3, 4]);
    }

    #[test]
    fn unknown_types_survive() {
        let out = normalize_plan(&json!([{"type": "sharpen", "params": {"amount": 1}}])).unwrap();
        assert_eq!(out.tasks.len(), 1);
        assert_eq!(out.tasks[0].kind(), None);
    }

    #[test]
    fn empty_inputs_mean_current() {
        let task = normalize_record(&json!({"type": "resize", "inputs": []})).unwrap();
        assert_eq!(task.inputs, None);
    }

    #[test]
    fn document_errors() {
        assert!(normalize_plan(&json!({"name": "x"})).is_err());
        assert!(normalize_plan(&json!(42)).is_err());
        assert!(normalize_plan_str("{oops").is_err());
        assert!(normalize_plan_str("[]").unwrap().tasks.is_empty());
    }
}
