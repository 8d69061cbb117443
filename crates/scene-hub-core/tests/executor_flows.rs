// crates/scene-hub-core/tests/executor_flows.rs
// ============================================================================
// Module: Command Executor Flow Tests
// Description: Single and batch command flows with locks and rollback.
// ============================================================================
//! ## Overview
//! Validates the end-to-end command scenarios: create under lock with name
//! uniquing, the base-revision guard, transactional rollback, idempotent
//! retries, and validation boundaries.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use serde_json::json;

use scene_hub_core::BatchPayload;
use scene_hub_core::CommandExecutor;
use scene_hub_core::CommandPayload;
use scene_hub_core::IdempotencyCache;
use scene_hub_core::InstanceId;
use scene_hub_core::LockManager;
use scene_hub_core::LockOwner;
use scene_hub_core::SceneGraph;
use scene_hub_core::ScenePath;
use scene_hub_core::Timestamp;
use scene_hub_core::WireInstance;
use scene_hub_core::graph::DerivedCache;
use scene_hub_core::interfaces::LiveFrame;
use scene_hub_core::interfaces::LiveUpdateSink;
use scene_hub_core::interfaces::NoopProjectionSink;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Live sink that records every frame for assertions.
#[derive(Debug, Default)]
struct RecordingSink {
    /// Captured frames in commit order.
    frames: Mutex<Vec<LiveFrame>>,
}

impl LiveUpdateSink for RecordingSink {
    fn frame_committed(&self, frame: &LiveFrame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}

/// Builds an executor over the standard two-service baseline tree.
fn executor() -> (CommandExecutor, Arc<RwLock<SceneGraph>>, Arc<RecordingSink>) {
    let mut graph = SceneGraph::new();
    graph
        .replace_full(vec![
            WireInstance {
                id: InstanceId::new("ws"),
                class_name: "Workspace".to_string(),
                name: "Workspace".to_string(),
                parent_id: None,
                children: None,
                properties: BTreeMap::new(),
            },
            WireInstance {
                id: InstanceId::new("rs"),
                class_name: "ReplicatedStorage".to_string(),
                name: "ReplicatedStorage".to_string(),
                parent_id: None,
                children: None,
                properties: BTreeMap::new(),
            },
        ])
        .unwrap();
    let graph = Arc::new(RwLock::new(graph));
    let sink = Arc::new(RecordingSink::default());
    let executor = CommandExecutor::new(
        Arc::clone(&graph),
        Arc::new(DerivedCache::new()),
        Arc::new(LockManager::new()),
        Arc::new(IdempotencyCache::new()),
        Arc::clone(&sink) as Arc<dyn LiveUpdateSink>,
        Arc::new(NoopProjectionSink),
    );
    (executor, graph, sink)
}

/// Parses a JSON literal into a command payload.
fn payload(body: serde_json::Value) -> CommandPayload {
    serde_json::from_value(body).unwrap()
}

/// Shorthand timestamp.
fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: Single Create
// ============================================================================

/// Creating a folder resolves the path, bumps the revision, and later
/// same-name creates take the `_2` suffix.
#[test]
fn test_create_resolves_path_and_uniques_names() {
    let (executor, graph, _) = executor();
    let before = graph.read().unwrap().revision();

    let outcome = executor.execute(
        &payload(json!({
            "op": "create",
            "parentPath": ["ReplicatedStorage"],
            "className": "Folder",
            "name": "Gameplay",
        })),
        None,
        at(0),
    );
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.body["revision"], json!(before + 1));
    assert_eq!(outcome.body["resolvedPath"], json!(["ReplicatedStorage", "Gameplay"]));

    let second = executor.execute(
        &payload(json!({
            "op": "create",
            "parentPath": ["ReplicatedStorage"],
            "className": "Folder",
            "name": "Gameplay",
        })),
        None,
        at(1),
    );
    assert_eq!(second.status, 200);
    assert_eq!(second.body["resolvedPath"], json!(["ReplicatedStorage", "Gameplay_2"]));
}

/// A foreign lock on the parent denies the create with lock metadata.
#[test]
fn test_foreign_lock_denies_create() {
    let (executor, _, _) = executor();
    let locks = executor.locks();
    locks
        .acquire(
            &[ScenePath::from(["ReplicatedStorage"].as_slice())],
            &LockOwner::new("editor-session"),
            at(0),
        )
        .unwrap();

    let outcome = executor.execute(
        &payload(json!({
            "op": "create",
            "parentPath": ["ReplicatedStorage"],
            "className": "Folder",
            "name": "Gameplay",
        })),
        None,
        at(1),
    );
    assert_eq!(outcome.status, 423);
    assert_eq!(outcome.body["conflict"]["reason"], json!("locked"));
    assert_eq!(
        outcome.body["conflict"]["actual"]["blockingOwner"],
        json!("editor-session")
    );
}

// ============================================================================
// SECTION: Revision Guard
// ============================================================================

/// A stale base revision is rejected with the exact conflict shape.
#[test]
fn test_stale_base_revision_is_rejected() {
    let (executor, graph, _) = executor();
    let current = graph.read().unwrap().revision();

    let outcome = executor.execute_batch(
        &BatchPayload {
            commands: vec![payload(json!({
                "op": "create",
                "parentPath": ["ReplicatedStorage"],
                "className": "Folder",
                "name": "Gameplay",
            }))],
            base_revision: Some(current - 1),
            ..BatchPayload::default()
        },
        None,
        at(0),
    );
    assert_eq!(outcome.status, 409);
    assert_eq!(outcome.body["conflict"]["reason"], json!("revision_mismatch"));
    assert_eq!(
        outcome.body["conflict"]["expected"]["baseRevision"],
        json!(current - 1)
    );
    assert_eq!(
        outcome.body["conflict"]["actual"]["currentRevision"],
        json!(current)
    );
}

// ============================================================================
// SECTION: Transactional Rollback
// ============================================================================

/// A failing third command rolls the whole batch back to the entry state.
#[test]
fn test_transactional_batch_rolls_back() {
    let (executor, graph, _) = executor();
    let before = graph.read().unwrap().revision();

    let outcome = executor.execute_batch(
        &BatchPayload {
            commands: vec![
                payload(json!({
                    "op": "create",
                    "parentPath": ["ReplicatedStorage"],
                    "className": "Folder",
                    "name": "A",
                })),
                payload(json!({
                    "op": "create",
                    "parentPath": ["ReplicatedStorage", "A"],
                    "className": "Folder",
                    "name": "B",
                })),
                payload(json!({
                    "op": "update",
                    "targetPath": ["ReplicatedStorage", "A", "B"],
                    "property": "NonexistentProp",
                    "value": 1,
                })),
            ],
            transactional: true,
            ..BatchPayload::default()
        },
        None,
        at(0),
    );

    assert_eq!(outcome.status, 409);
    assert_eq!(outcome.body["rolledBack"], json!(true));
    assert_eq!(outcome.body["revision"], json!(before));
    let graph = graph.read().unwrap();
    assert!(graph.get_by_path(&ScenePath::from(["ReplicatedStorage", "A"].as_slice())).is_none());
}

/// A transactional batch commits as one revision bump and one full_sync.
#[test]
fn test_transactional_batch_commits_once() {
    let (executor, graph, sink) = executor();
    let before = graph.read().unwrap().revision();

    let outcome = executor.execute_batch(
        &BatchPayload {
            commands: vec![
                payload(json!({
                    "op": "create",
                    "parentPath": ["ReplicatedStorage"],
                    "className": "Folder",
                    "name": "A",
                })),
                payload(json!({
                    "op": "create",
                    "parentPath": ["ReplicatedStorage", "A"],
                    "className": "Folder",
                    "name": "B",
                })),
            ],
            transactional: true,
            ..BatchPayload::default()
        },
        None,
        at(0),
    );

    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.body["revision"], json!(before + 1));
    let frames = sink.frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert!(matches!(frames[0], LiveFrame::FullSync { .. }));
}

// ============================================================================
// SECTION: Idempotency
// ============================================================================

/// The same key returns the identical body without re-execution.
#[test]
fn test_idempotent_retry_returns_identical_outcome() {
    let (executor, graph, _) = executor();
    let request = payload(json!({
        "op": "create",
        "parentPath": ["ReplicatedStorage"],
        "className": "Folder",
        "name": "Gameplay",
    }));

    let first = executor.execute(&request, Some("key-1"), at(0));
    let second = executor.execute(&request, Some("key-1"), at(1));
    assert_eq!(first.status, second.status);
    assert_eq!(first.body, second.body);

    // Only one instance was created despite two requests.
    let graph = graph.read().unwrap();
    assert!(graph.get_by_path(&ScenePath::from(["ReplicatedStorage", "Gameplay"].as_slice())).is_some());
    assert!(graph.get_by_path(&ScenePath::from(["ReplicatedStorage", "Gameplay_2"].as_slice())).is_none());
}

// ============================================================================
// SECTION: Validation Boundaries
// ============================================================================

/// Transparency honors its strict unit bounds end to end.
#[test]
fn test_transparency_bounds_reject_out_of_range_updates() {
    let (executor, _, _) = executor();
    executor.execute(
        &payload(json!({
            "op": "create",
            "parentPath": ["Workspace"],
            "className": "Part",
            "name": "Door",
        })),
        None,
        at(0),
    );

    for (value, ok) in [(-0.01, false), (0.0, true), (1.0, true), (1.01, false)] {
        let outcome = executor.execute(
            &payload(json!({
                "op": "update",
                "targetPath": ["Workspace", "Door"],
                "property": "Transparency",
                "value": value,
            })),
            None,
            at(1),
        );
        if ok {
            assert_eq!(outcome.status, 200, "value {value} should pass");
        } else {
            assert_eq!(outcome.status, 400, "value {value} should fail");
            assert_eq!(outcome.body["conflict"]["reason"], json!("validation_failed"));
        }
    }
}

/// Updating Name routes through rename and keeps dotted names out.
#[test]
fn test_name_update_renames_and_rejects_dots() {
    let (executor, graph, _) = executor();
    executor.execute(
        &payload(json!({
            "op": "create",
            "parentPath": ["Workspace"],
            "className": "Part",
            "name": "Door",
        })),
        None,
        at(0),
    );

    let renamed = executor.execute(
        &payload(json!({
            "op": "update",
            "targetPath": ["Workspace", "Door"],
            "property": "Name",
            "value": "Gate",
        })),
        None,
        at(1),
    );
    assert_eq!(renamed.status, 200);
    assert_eq!(renamed.body["resolvedPath"], json!(["Workspace", "Gate"]));
    assert!(
        graph
            .read()
            .unwrap()
            .get_by_path(&ScenePath::from(["Workspace", "Gate"].as_slice()))
            .is_some()
    );

    let dotted = executor.execute(
        &payload(json!({
            "op": "update",
            "targetPath": ["Workspace", "Gate"],
            "property": "Name",
            "value": "Gate.Handle",
        })),
        None,
        at(2),
    );
    assert_eq!(dotted.status, 400);
}

/// Unknown targets produce not_found with the supplied refs echoed back.
#[test]
fn test_missing_target_reports_not_found() {
    let (executor, _, _) = executor();
    let outcome = executor.execute(
        &payload(json!({
            "op": "delete",
            "targetPath": ["Workspace", "Ghost"],
        })),
        None,
        at(0),
    );
    assert_eq!(outcome.status, 404);
    assert_eq!(outcome.body["conflict"]["reason"], json!("not_found"));
    assert_eq!(
        outcome.body["conflict"]["expected"]["target"]["path"],
        json!(["Workspace", "Ghost"])
    );
}

/// Non-transactional batches report mixed results with 207.
#[test]
fn test_mixed_batch_returns_207() {
    let (executor, _, _) = executor();
    let outcome = executor.execute_batch(
        &BatchPayload {
            commands: vec![
                payload(json!({
                    "op": "create",
                    "parentPath": ["ReplicatedStorage"],
                    "className": "Folder",
                    "name": "A",
                })),
                payload(json!({
                    "op": "update",
                    "targetPath": ["ReplicatedStorage", "A"],
                    "property": "NonexistentProp",
                    "value": 1,
                })),
            ],
            continue_on_error: true,
            ..BatchPayload::default()
        },
        None,
        at(0),
    );
    assert_eq!(outcome.status, 207);
    assert_eq!(outcome.body["counts"]["succeeded"], json!(1));
    assert_eq!(outcome.body["counts"]["failed"], json!(1));
}
