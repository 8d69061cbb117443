// crates/scene-hub-server/src/routes/mod.rs
// ============================================================================
// Module: HTTP Routes
// Description: Router assembly, request tracking, and the health endpoint.
// Purpose: Bind every Scene Hub endpoint onto the shared state.
// Dependencies: axum, crate::{state, telemetry}
// ============================================================================

//! ## Overview
//! All request and response bodies are JSON. The tracking layer records one
//! metric and one audit event per request; handlers stay free of
//! observability plumbing.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod agent;
pub mod debug;
pub mod sync;
pub mod tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use scene_hub_core::Timestamp;
use serde_json::Value as JsonValue;
use serde_json::json;

use crate::state::AppState;
use crate::telemetry::AuditEvent;
use crate::telemetry::RequestEvent;
use crate::telemetry::RequestOutcome;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full router over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sync", post(sync::sync_full))
        .route("/sync/delta", post(sync::sync_delta))
        .route("/changes", get(sync::pending_changes))
        .route("/changes/confirm", post(sync::confirm_changes))
        .route("/stream", get(sync::stream_socket))
        .route("/agent/bootstrap", get(agent::bootstrap))
        .route("/agent/capabilities", get(agent::capabilities))
        .route("/agent/snapshot", get(agent::snapshot))
        .route("/agent/schema/properties", get(agent::schema_properties))
        .route("/agent/schema/commands", get(agent::schema_commands))
        .route("/agent/command", post(agent::command))
        .route("/agent/commands", post(agent::commands))
        .route("/agent/locks", get(agent::locks))
        .route("/agent/tests/run", post(tests::enqueue))
        .route("/agent/tests", get(tests::list))
        .route("/agent/tests/metrics", get(tests::metrics))
        .route("/agent/tests/events", post(tests::events))
        .route("/agent/tests/{id}", get(tests::get_run))
        .route("/agent/tests/{id}/abort", post(tests::abort))
        .route("/agent/tests/{id}/report", get(tests::report))
        .route("/agent/tests/{id}/artifacts", get(tests::artifacts))
        .route("/agent/debug/export", post(debug::export))
        .route("/agent/debug/profile", get(debug::profile))
        .layer(middleware::from_fn_with_state(state.clone(), track_request))
        .with_state(state)
}

// ============================================================================
// SECTION: Request Tracking
// ============================================================================

/// Records one metric and one audit event per finished request.
async fn track_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16();
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let event = RequestEvent {
        method,
        route,
        status,
        outcome: RequestOutcome::from_status(status),
        latency_ms,
    };
    state.metrics.record_request(&event);
    state.audit.emit(&AuditEvent::new(
        "http_request",
        Timestamp::now().as_unix_millis(),
        json!({
            "method": event.method,
            "route": event.route,
            "status": event.status,
            "latencyMs": event.latency_ms,
        }),
    ));
    response
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Status, version, instance count, and discovery pointers.
pub async fn health(State(state): State<AppState>) -> Json<JsonValue> {
    let (revision, instance_count) = {
        let graph = state.read_graph();
        (graph.revision(), graph.instance_count())
    };
    let now = Timestamp::now();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "revision": revision,
        "instanceCount": instance_count,
        "uptimeMs": now.millis_since(state.started_at),
        "streamClients": state.stream.subscriber_count(),
        "agent": {
            "bootstrap": "/agent/bootstrap",
            "capabilities": "/agent/capabilities",
            "command": "/agent/command",
            "tests": "/agent/tests",
        },
    }))
}
