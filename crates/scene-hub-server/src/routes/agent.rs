// crates/scene-hub-server/src/routes/agent.rs
// ============================================================================
// Module: Agent Routes
// Description: Bootstrap, capabilities, snapshots, schemas, commands, locks.
// Purpose: Serve the control-plane surface agents drive the hub with.
// Dependencies: axum, scene-hub-core, crate::state
// ============================================================================

//! ## Overview
//! Read endpoints are served from the derived cache so repeated reads at one
//! revision cost one computation. Command endpoints delegate to the executor
//! and translate its outcome verbatim: the body the executor finalized is
//! the body the client sees, which is what makes idempotent retries
//! byte-identical.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use scene_hub_core::BatchPayload;
use scene_hub_core::CommandOutcome;
use scene_hub_core::CommandPayload;
use scene_hub_core::Timestamp;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_json::json;

use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Bootstrap query flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootstrapQuery {
    /// Embed the indexed snapshot.
    pub include_snapshot: bool,
    /// Embed the inferred schema.
    pub include_schema: bool,
    /// Restrict the embedded schema to one class.
    pub class_name: Option<String>,
}

/// Schema query flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaQuery {
    /// Restrict to one class.
    pub class_name: Option<String>,
}

/// Lock listing query flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocksQuery {
    /// Contention records to return.
    pub limit: usize,
    /// Include the active lock set.
    pub include_locks: bool,
}

impl Default for LocksQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            include_locks: true,
        }
    }
}

// ============================================================================
// SECTION: Bootstrap and Capabilities
// ============================================================================

/// One-shot health, capabilities, and optional snapshot and schema.
pub async fn bootstrap(
    State(state): State<AppState>,
    Query(query): Query<BootstrapQuery>,
) -> Json<JsonValue> {
    let graph = state.read_graph();
    let mut body = json!({
        "health": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "revision": graph.revision(),
            "instanceCount": graph.instance_count(),
        },
        "capabilities": capability_manifest(),
    });
    if query.include_snapshot {
        body["snapshot"] = json!(state.cache.snapshot(&graph).as_ref());
    }
    if query.include_schema {
        let schemas = state.cache.schemas(&graph, query.class_name.as_deref());
        body["schema"] = json!({"classes": schemas.as_ref()});
    }
    Json(body)
}

/// Compact capability manifest.
pub async fn capabilities(State(_state): State<AppState>) -> Json<JsonValue> {
    Json(capability_manifest())
}

/// The manifest shared by bootstrap and the capabilities endpoint.
fn capability_manifest() -> JsonValue {
    json!({
        "commands": {
            "ops": ["create", "update", "rename", "delete", "reparent"],
            "refs": ["targetId", "targetPath", "parentId", "parentPath"],
            "batch": {"transactional": true, "continueOnError": true},
            "idempotencyHeader": IDEMPOTENCY_HEADER,
            "baseRevisionGuard": true,
        },
        "valueKinds": ["primitive", "struct", "enum", "reference", "readonly"],
        "structShapes": [
            "Vector2", "Vector3", "CFrame", "Color3", "UDim", "UDim2",
            "BrickColor", "NumberRange", "Rect",
        ],
        "tests": {
            "runtimes": ["none", "run", "play"],
            "baselineModes": ["assert", "record", "assert_or_record"],
            "eventIngress": "/agent/tests/events",
        },
        "limits": {
            "lockTtlMs": scene_hub_core::control::DEFAULT_LOCK_TTL_MS,
            "idempotencyTtlMs": scene_hub_core::control::DEFAULT_IDEMPOTENCY_TTL_MS,
            "idempotencyCap": scene_hub_core::control::DEFAULT_IDEMPOTENCY_CAP,
            "dispatchTimeoutMs": scene_hub_testlab::DISPATCH_TIMEOUT_MS,
        },
    })
}

// ============================================================================
// SECTION: Snapshot and Schema
// ============================================================================

/// Indexed snapshot at the current revision.
pub async fn snapshot(State(state): State<AppState>) -> Json<JsonValue> {
    let graph = state.read_graph();
    Json(json!(state.cache.snapshot(&graph).as_ref()))
}

/// Inferred property schema, optionally restricted to one class.
pub async fn schema_properties(
    State(state): State<AppState>,
    Query(query): Query<SchemaQuery>,
) -> Json<JsonValue> {
    let graph = state.read_graph();
    let schemas = state.cache.schemas(&graph, query.class_name.as_deref());
    Json(json!({
        "revision": graph.revision(),
        "classes": schemas.as_ref(),
    }))
}

/// Canonical command payload schema.
pub async fn schema_commands(State(_state): State<AppState>) -> Json<JsonValue> {
    Json(json!({
        "ops": {
            "create": {
                "required": ["op", "parentId|parentPath", "className", "name"],
                "optional": ["properties", "baseRevision", "idempotencyKey"],
            },
            "update": {
                "required": ["op", "targetId|targetPath", "property+value|properties"],
                "optional": ["baseRevision", "idempotencyKey"],
            },
            "rename": {
                "required": ["op", "targetId|targetPath", "name"],
                "optional": ["baseRevision", "idempotencyKey"],
            },
            "delete": {
                "required": ["op", "targetId|targetPath"],
                "optional": ["baseRevision", "idempotencyKey"],
            },
            "reparent": {
                "required": ["op", "targetId|targetPath", "parentId|parentPath"],
                "optional": ["baseRevision", "idempotencyKey"],
            },
        },
        "conflicts": ["not_found", "locked", "revision_mismatch", "validation_failed"],
    }))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes one command.
pub async fn command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CommandPayload>,
) -> Response {
    let key = header_key(&headers);
    let outcome = state
        .executor
        .execute(&payload, key.as_deref(), Timestamp::now());
    outcome_response(outcome)
}

/// Executes a command batch.
pub async fn commands(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BatchPayload>,
) -> Response {
    let key = header_key(&headers);
    let outcome = state
        .executor
        .execute_batch(&payload, key.as_deref(), Timestamp::now());
    outcome_response(outcome)
}

/// Extracts the idempotency key header.
fn header_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// Maps an executor outcome onto an HTTP response verbatim.
fn outcome_response(outcome: CommandOutcome) -> Response {
    let status =
        StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.body)).into_response()
}

// ============================================================================
// SECTION: Locks
// ============================================================================

/// Active locks and recent contention.
pub async fn locks(
    State(state): State<AppState>,
    Query(query): Query<LocksQuery>,
) -> Json<JsonValue> {
    let manager = state.executor.locks();
    let mut body = json!({
        "contention": manager.contention(query.limit),
    });
    if query.include_locks {
        body["locks"] = json!(manager.active(Timestamp::now()));
    }
    Json(body)
}
