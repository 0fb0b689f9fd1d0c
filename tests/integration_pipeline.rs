//! Pipeline integration tests
//!
//! Raw plan documents go through normalization, repair and execution with a
//! lineage-recording tool in place of ffmpeg.

mod common;

use std::sync::Arc;

use cf_core::config::InsertRules;
use cf_core::Error;
use cf_pipeline::TaskGraphExecutor;
use cf_plan::{normalize_plan, validate_plan, OperationKind, PlanRepairer, SlotPlanner, Transcript};
use common::{KeywordSource, LineageTool, Scene};
use serde_json::json;

fn prepare(doc: serde_json::Value) -> Vec<cf_plan::Task> {
    let normalized = normalize_plan(&doc).unwrap();
    let (tasks, _) = PlanRepairer::new(InsertRules::default()).repair(normalized.tasks);
    assert!(validate_plan(&tasks).is_empty(), "{:?}", validate_plan(&tasks));
    tasks
}

/// A trim+concat assembly with no gaps keeps its shape and yields the three
/// segments in order.
#[tokio::test]
async fn test_contiguous_assembly_concatenates_in_order() {
    let scene = Scene::new();
    let tasks = prepare(json!({"tasks": [
        {"type": "trim", "params": {"start": "0:00", "end": "0:15"}, "output_id": "clip_a", "inputs": ["source"]},
        {"action": "fetch_stock_video", "parameters": {"query": "ocean waves"}, "id": "broll_1"},
        {"type": "trim", "params": {"start": 15, "end": 30}, "output_id": "clip_b", "inputs": ["source"]},
        {"type": "concat", "inputs": ["clip_a", "broll_1", "clip_b"]}
    ]}));

    let tool = Arc::new(LineageTool::default());
    let executor = TaskGraphExecutor::new(tool.clone())
        .with_content_source(Arc::new(KeywordSource { keyword: "ocean" }));
    let report = executor
        .run(&tasks, &scene.input, &scene.output(), &scene.workspace)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(scene.output()).unwrap(),
        "trim(src)|stock[ocean waves]|trim(src)"
    );
    assert_eq!(report.produced, ["clip_a", "broll_1", "clip_b"]);
    assert_eq!(tool.steps(), ["trim", "trim", "concat"]);
    assert!(scene.scratch_is_empty());
}

/// Gapped source trims around a fetched clip become one overlay on the
/// source followed by a bounding trim.
#[tokio::test]
async fn test_gapped_assembly_is_rewritten_as_overlay() {
    let scene = Scene::new();
    let tasks = prepare(json!([
        {"type": "trim", "params": {"start": 0, "end": 10}, "output_id": "a", "inputs": ["source"]},
        {"type": "fetch_stock_video", "params": {"query": "city skyline"}},
        {"type": "trim", "params": {"start": 15, "end": 30}, "output_id": "b", "inputs": ["source"]},
        {"type": "concat", "inputs": ["a", "stock_1", "b"]}
    ]));

    let kinds: Vec<_> = tasks.iter().filter_map(|t| t.kind()).collect();
    assert_eq!(
        kinds,
        [OperationKind::FetchStockVideo, OperationKind::OverlayVideo, OperationKind::Trim]
    );

    let tool = Arc::new(LineageTool::default());
    let executor = TaskGraphExecutor::new(tool.clone())
        .with_content_source(Arc::new(KeywordSource { keyword: "city" }));
    executor
        .run(&tasks, &scene.input, &scene.output(), &scene.workspace)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(scene.output()).unwrap(),
        "trim(overlay_video(src+stock[city skyline]))"
    );
    assert!(scene.scratch_is_empty());
}

/// Five inserts under the default limit of three; misses are skipped and
/// the rest of the plan still runs.
#[tokio::test]
async fn test_truncated_inserts_with_missing_stock() {
    let scene = Scene::new();
    let mut raw = Vec::new();
    for i in 0..5 {
        let query = if i % 2 == 0 { "forest trail" } else { "empty query result" };
        raw.push(json!({"type": "fetch_stock_video", "params": {"query": query}, "output_id": format!("b{i}")}));
        raw.push(json!({"type": "overlay_video", "params": {"start_time": 10 + i * 12, "end_time": 15 + i * 12, "clip": format!("b{i}")}}));
    }
    raw.push(json!({"type": "add_text_overlay", "params": {"text": "The End", "start_time": 60}}));
    let tasks = prepare(serde_json::Value::Array(raw));

    let overlays = tasks.iter().filter(|t| t.is_kind(OperationKind::OverlayVideo)).count();
    let fetches = tasks.iter().filter(|t| t.is_kind(OperationKind::FetchStockVideo)).count();
    assert_eq!((overlays, fetches), (3, 3));

    let tool = Arc::new(LineageTool::default());
    let executor = TaskGraphExecutor::new(tool.clone())
        .with_content_source(Arc::new(KeywordSource { keyword: "forest" }));
    let report = executor
        .run(&tasks, &scene.input, &scene.output(), &scene.workspace)
        .await
        .unwrap();

    // b0 and b2 are found, b1 is not.
    assert_eq!(tool.steps(), ["overlay_video", "overlay_video", "add_text_overlay"]);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(
        std::fs::read_to_string(scene.output()).unwrap(),
        "add_text_overlay(overlay_video(overlay_video(src+stock[forest trail])+stock[forest trail]))"
    );
    assert!(scene.scratch_is_empty());
}

/// A dangling name aborts the run without touching the tool for that task.
#[tokio::test]
async fn test_unresolved_reference_aborts_and_cleans_up() {
    let scene = Scene::new();
    let tasks = normalize_plan(&json!([
        {"type": "resize", "params": {"width": 640}},
        {"type": "zoompan", "inputs": ["missing"]},
        {"type": "trim"}
    ]))
    .unwrap()
    .tasks;

    let tool = Arc::new(LineageTool::default());
    let err = TaskGraphExecutor::new(tool.clone())
        .run(&tasks, &scene.input, &scene.output(), &scene.workspace)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnresolvedReference { index: 2, .. }));
    assert!(err.to_string().contains("available: source"));
    assert_eq!(tool.steps(), ["resize"]);
    assert!(scene.scratch_is_empty());
    assert!(!scene.output().exists());
}

/// Slots computed from a transcript are turned into a runnable plan.
#[tokio::test]
async fn test_slots_feed_repair_and_execution() {
    let scene = Scene::new();
    let transcript = Transcript::from_json(
        r#"{"segments": [
            {"start": 0, "end": 10, "text": "Welcome to the harbour tour."},
            {"start": 10, "end": 18, "text": "Boats leave every hour."},
            {"start": 18, "end": 25, "text": "The harbour is busy at dawn."},
            {"start": 25, "end": 40, "text": "Fishermen unload their catch."}
        ]}"#,
    )
    .unwrap();

    let rules = InsertRules {
        max_inserts: 2,
        min_duration: 4.0,
        max_duration: 5.0,
        avoid_first: 6.0,
        avoid_last: 8.0,
        min_gap: 10.0,
        ..InsertRules::default()
    };
    let slots = SlotPlanner::new(rules.clone()).plan(&transcript, 60.0);
    assert_eq!(slots.len(), 2);

    let base = normalize_plan(&json!([{"type": "resize", "params": {"width": 720}}]))
        .unwrap()
        .tasks;
    let (tasks, report) = PlanRepairer::new(rules).repair_with_slots(base, &slots);
    assert!(!report.is_clean());
    assert_eq!(
        tasks.iter().filter(|t| t.is_kind(OperationKind::OverlayVideo)).count(),
        2
    );

    let tool = Arc::new(LineageTool::default());
    let report = TaskGraphExecutor::new(tool.clone())
        .with_content_source(Arc::new(KeywordSource { keyword: "" }))
        .run(&tasks, &scene.input, &scene.output(), &scene.workspace)
        .await
        .unwrap();
    assert_eq!(report.skipped.len(), 0);
    assert_eq!(tool.steps(), ["resize", "overlay_video", "overlay_video"]);
}
