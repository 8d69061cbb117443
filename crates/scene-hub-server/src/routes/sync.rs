// crates/scene-hub-server/src/routes/sync.rs
// ============================================================================
// Module: Editor Sync Routes
// Description: Full pushes, delta batches, pending changes, and the stream.
// Purpose: Keep the editor plugin and extension clients converged.
// Dependencies: axum, futures-util, scene-hub-core, crate::state
// ============================================================================

//! ## Overview
//! The editor pushes state in (`/sync`, `/sync/delta`, inbound stream
//! frames) and pulls agent-committed changes back out (`/changes`,
//! `/changes/confirm`). A failed delta record never touches the
//! pending-change ledger: pending changes leave only through explicit
//! confirmation plus the grace-window collector.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use futures_util::SinkExt;
use futures_util::StreamExt;
use scene_hub_core::ChangeId;
use scene_hub_core::MutationRecord;
use scene_hub_core::Timestamp;
use scene_hub_core::WireInstance;
use scene_hub_core::interfaces::LiveFrame;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Full tree push from the editor plugin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncRequest {
    /// Complete flat tree.
    pub instances: Vec<WireInstance>,
    /// Whether this is the first push of a session.
    pub is_initial: bool,
}

/// Delta batch from the editor plugin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeltaRequest {
    /// Ordered mutation records.
    pub changes: Vec<MutationRecord>,
}

/// Acknowledgement of pending changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmRequest {
    /// Change ids to confirm.
    pub ids: Vec<String>,
}

// ============================================================================
// SECTION: Full Push
// ============================================================================

/// Accepts a complete tree, diffs it against current state, and broadcasts
/// the new state to stream clients.
pub async fn sync_full(
    State(state): State<AppState>,
    Json(body): Json<SyncRequest>,
) -> Response {
    let replaced = {
        let mut graph = state.write_graph();
        graph.replace_full(body.instances)
    };
    match replaced {
        Ok(changes) => {
            broadcast_full_sync(&state);
            let revision = state.read_graph().revision();
            Json(json!({
                "success": true,
                "changesApplied": changes.len(),
                "isInitial": body.is_initial,
                "revision": revision,
            }))
            .into_response()
        }
        Err(error) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": error.to_string()})),
        )
            .into_response(),
    }
}

// ============================================================================
// SECTION: Delta Push
// ============================================================================

/// Applies an ordered delta batch; failures are reported per record and do
/// not disturb the pending-change ledger.
pub async fn sync_delta(
    State(state): State<AppState>,
    Json(body): Json<DeltaRequest>,
) -> Json<JsonValue> {
    Json(apply_delta_records(&state, &body.changes))
}

/// Shared delta application for the HTTP endpoint and inbound stream frames.
fn apply_delta_records(state: &AppState, records: &[MutationRecord]) -> JsonValue {
    let (results, revision, applied_records) = {
        let mut graph = state.write_graph();
        let outcomes = graph.apply_delta(records);
        let revision = graph.revision();
        let mut results = Vec::with_capacity(outcomes.len());
        let mut applied_records = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(applied) => {
                    results.push(json!({"index": index, "success": true, "path": applied.path}));
                    applied_records.push(applied.record);
                }
                Err(error) => {
                    results.push(json!({
                        "index": index,
                        "success": false,
                        "error": error.to_string(),
                    }));
                }
            }
        }
        (results, revision, applied_records)
    };

    for record in &applied_records {
        state.stream.send_frame(&LiveFrame::Mutation {
            revision,
            record: record.clone(),
        });
    }

    let applied = applied_records.len();
    let failed = records.len() - applied;
    json!({
        "success": failed == 0,
        "applied": applied,
        "failed": failed,
        "revision": revision,
        "results": results,
    })
}

// ============================================================================
// SECTION: Pending Changes
// ============================================================================

/// Unconfirmed (and in-grace confirmed) changes for the editor plugin.
pub async fn pending_changes(State(state): State<AppState>) -> Json<JsonValue> {
    let changes = state.write_graph().pending_changes(Timestamp::now());
    Json(json!({"changes": changes}))
}

/// Marks changes confirmed by the plugin.
pub async fn confirm_changes(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> Json<JsonValue> {
    let ids: Vec<ChangeId> = body.ids.iter().map(|id| ChangeId::new(id.clone())).collect();
    let confirmed = state.write_graph().confirm_changes(&ids, Timestamp::now());
    Json(json!({"success": true, "confirmed": confirmed}))
}

// ============================================================================
// SECTION: Live Stream
// ============================================================================

/// Upgrades to the bidirectional live-stream channel.
pub async fn stream_socket(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| drive_stream(socket, state))
}

/// Pushes one full_sync on connect, then forwards committed frames and
/// applies inbound delta frames.
async fn drive_stream(socket: WebSocket, state: AppState) {
    let (mut outbound, mut inbound) = socket.split();

    let hello = {
        let graph = state.read_graph();
        LiveFrame::FullSync {
            revision: graph.revision(),
            instances: state.cache.listing(&graph).as_ref().clone(),
        }
    };
    let Ok(hello_text) = serde_json::to_string(&hello) else {
        return;
    };
    if outbound.send(Message::Text(hello_text.into())).await.is_err() {
        return;
    }

    let mut frames = state.stream.subscribe();
    loop {
        tokio::select! {
            committed = frames.recv() => match committed {
                Ok(text) => {
                    if outbound.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    // Dropped frames; resend full state so the client converges.
                    let resync = {
                        let graph = state.read_graph();
                        LiveFrame::FullSync {
                            revision: graph.revision(),
                            instances: state.cache.listing(&graph).as_ref().clone(),
                        }
                    };
                    let Ok(text) = serde_json::to_string(&resync) else { continue };
                    if outbound.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            received = inbound.next() => match received {
                Some(Ok(Message::Text(text))) => {
                    handle_inbound_frame(&state, text.as_str());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Inbound frames carry the same mutation records as the delta endpoint.
fn handle_inbound_frame(state: &AppState, text: &str) {
    let Ok(body) = serde_json::from_str::<DeltaRequest>(text) else {
        return;
    };
    if !body.changes.is_empty() {
        let _ = apply_delta_records(state, &body.changes);
    }
}

/// Broadcasts the complete current state to every stream client.
pub fn broadcast_full_sync(state: &AppState) {
    let frame = {
        let graph = state.read_graph();
        LiveFrame::FullSync {
            revision: graph.revision(),
            instances: state.cache.listing(&graph).as_ref().clone(),
        }
    };
    state.stream.send_frame(&frame);
}
