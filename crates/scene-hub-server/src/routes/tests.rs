// crates/scene-hub-server/src/routes/tests.rs
// ============================================================================
// Module: Test Orchestration Routes
// Description: Run enqueue, listing, events, reports, artifacts, metrics.
// Purpose: Expose the testlab manager over the agent HTTP surface.
// Dependencies: axum, scene-hub-testlab, crate::state
// ============================================================================

//! ## Overview
//! The event ingress is where the attempt-stamp hardening meets HTTP: stale
//! attempts answer 202 with a diagnostic, attempts from the future answer
//! 409, and replays of terminal events answer 200 with the unchanged final
//! state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use scene_hub_core::Timestamp;
use scene_hub_testlab::EventOutcome;
use scene_hub_testlab::EventPayload;
use scene_hub_testlab::ScenarioPayload;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_json::json;

use crate::state::AppState;

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Listing limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitQuery {
    /// Maximum entries to return.
    pub limit: usize,
}

impl Default for LimitQuery {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

// ============================================================================
// SECTION: Run Lifecycle
// ============================================================================

/// Validates and enqueues a scenario.
pub async fn enqueue(
    State(state): State<AppState>,
    Json(payload): Json<ScenarioPayload>,
) -> Response {
    match state.tests.enqueue(&payload, Timestamp::now()) {
        Ok(run) => Json(json!({"success": true, "run": run})).into_response(),
        Err(error) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": error.to_string()})),
        )
            .into_response(),
    }
}

/// Lists runs, newest first. `items` is a compatibility alias of `runs`.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<JsonValue> {
    let runs = json!(state.tests.list(query.limit));
    Json(json!({"runs": runs.clone(), "items": runs}))
}

/// Fetches one run.
pub async fn get_run(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.tests.get(&id) {
        Some(run) => Json(json!({
            "id": run.id,
            "status": run.status,
            "run": run,
        }))
        .into_response(),
        None => run_not_found(&id),
    }
}

/// Aborts a queued or active run.
pub async fn abort(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.tests.abort(&id, Timestamp::now()) {
        Some(run) => Json(json!({"success": true, "status": run.status, "run": run}))
            .into_response(),
        None => run_not_found(&id),
    }
}

/// Returns the persisted report snapshot.
pub async fn report(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.tests.artifacts().read_report(&id) {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => run_not_found(&id),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": error.to_string()})),
        )
            .into_response(),
    }
}

/// Lists artifact files for one run.
pub async fn artifacts(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.tests.artifacts().list_artifacts(&id) {
        Ok(entries) => Json(json!({"artifacts": entries})).into_response(),
        Err(error) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": error.to_string()})),
        )
            .into_response(),
    }
}

/// Queue, retry, and latency summary.
pub async fn metrics(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<JsonValue> {
    Json(json!(state.tests.metrics(query.limit)))
}

// ============================================================================
// SECTION: Event Ingress
// ============================================================================

/// Ingests one editor event against the current attempt stamp.
pub async fn events(
    State(state): State<AppState>,
    Json(payload): Json<EventPayload>,
) -> Response {
    match state.tests.ingest_event(&payload, Timestamp::now()) {
        EventOutcome::Applied { run, baseline } => {
            let mut body = json!({"accepted": true, "status": run.status});
            if let Some(comparison) = baseline {
                body["baseline"] = json!(comparison);
            }
            Json(body).into_response()
        }
        EventOutcome::Finalized { run, baseline } => {
            let mut body = json!({
                "accepted": true,
                "finalized": true,
                "status": run.status,
                "attempt": run.attempt,
            });
            if let Some(comparison) = baseline {
                body["baseline"] = json!(comparison);
            }
            Json(body).into_response()
        }
        EventOutcome::Retried { run } => Json(json!({
            "accepted": true,
            "retried": true,
            "attempt": run.attempt,
            "nextDispatchAt": run.next_dispatch_at,
        }))
        .into_response(),
        EventOutcome::Stale { current_attempt } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "ignored": true,
                "reason": "stale_attempt_event",
                "currentAttempt": current_attempt,
            })),
        )
            .into_response(),
        EventOutcome::Ahead { current_attempt } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "event attempt is ahead of the current attempt",
                "currentAttempt": current_attempt,
            })),
        )
            .into_response(),
        EventOutcome::AlreadyFinal { run } => Json(json!({
            "accepted": true,
            "alreadyFinal": true,
            "status": run.status,
            "run": run,
        }))
        .into_response(),
        EventOutcome::UnknownRun => run_not_found(&payload.run_id),
    }
}

/// Uniform 404 body for unknown runs.
fn run_not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("run not found: {id}")})),
    )
        .into_response()
}
