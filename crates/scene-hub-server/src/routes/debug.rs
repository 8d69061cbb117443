// crates/scene-hub-server/src/routes/debug.rs
// ============================================================================
// Module: Debug Routes
// Description: Reproducible state bundles and derived-view profiling.
// Purpose: Give agents a one-shot capture of everything the hub knows.
// Dependencies: axum, scene-hub-core, crate::state
// ============================================================================

//! ## Overview
//! The export bundle captures snapshot, schemas, locks, contention, and run
//! state into one timestamped file under `.uxr-debug/`. The profile
//! endpoint rebuilds each derived product against fresh caches and reports
//! wall times, which is enough to spot a pathological scene without a
//! profiler attached.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use scene_hub_core::Timestamp;
use scene_hub_core::graph::DerivedCache;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_json::json;

use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory under the workspace root holding debug bundles.
pub const DEBUG_DIR_NAME: &str = ".uxr-debug";

/// Rebuild iterations per profiled product.
const PROFILE_ITERATIONS: u32 = 3;

// ============================================================================
// SECTION: Export
// ============================================================================

/// Export request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportRequest {
    /// Optional label appended to the bundle file name.
    pub label: Option<String>,
}

/// Writes a reproducible debug bundle and returns its path. The body is an
/// empty object when no label is wanted.
pub async fn export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Response {
    let now = Timestamp::now();
    let bundle = {
        let graph = state.read_graph();
        let locks = state.executor.locks();
        json!({
            "generatedAt": now,
            "config": {
                "host": state.config.host,
                "port": state.config.port,
                "workspace": state.config.workspace.display().to_string(),
            },
            "revision": graph.revision(),
            "snapshot": state.cache.snapshot(&graph).as_ref(),
            "schema": state.cache.schemas(&graph, None).as_ref(),
            "locks": locks.active(now),
            "contention": locks.contention(100),
            "runs": state.tests.list(100),
            "testMetrics": state.tests.metrics(25),
        })
    };

    let dir = state.config.workspace.join(DEBUG_DIR_NAME);
    let file_name = request.label.as_deref().map_or_else(
        || format!("agent-state-{}.json", now.as_unix_millis()),
        |label| {
            let safe: String = label
                .chars()
                .map(|character| {
                    if character.is_ascii_alphanumeric() || character == '-' || character == '_' {
                        character
                    } else {
                        '-'
                    }
                })
                .collect();
            format!("agent-state-{}-{safe}.json", now.as_unix_millis())
        },
    );
    let path = dir.join(file_name);
    let written = fs::create_dir_all(&dir)
        .and_then(|()| fs::write(&path, serde_json::to_vec_pretty(&bundle).unwrap_or_default()));
    match written {
        Ok(()) => Json(json!({
            "success": true,
            "path": path.display().to_string(),
        }))
        .into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": error.to_string()})),
        )
            .into_response(),
    }
}

// ============================================================================
// SECTION: Profile
// ============================================================================

/// Rebuilds each derived product against a fresh cache and reports timings.
pub async fn profile(State(state): State<AppState>) -> Json<JsonValue> {
    let graph = state.read_graph();
    let mut products: Vec<JsonValue> = Vec::new();

    for product in ["listing", "snapshot", "schema"] {
        let mut total_ms = 0.0_f64;
        for _ in 0..PROFILE_ITERATIONS {
            let fresh = DerivedCache::new();
            let start = Instant::now();
            match product {
                "listing" => {
                    let _ = fresh.listing(&graph);
                }
                "snapshot" => {
                    let _ = fresh.snapshot(&graph);
                }
                _ => {
                    let _ = fresh.schemas(&graph, None);
                }
            }
            total_ms += start.elapsed().as_secs_f64() * 1_000.0;
        }
        products.push(json!({
            "product": product,
            "iterations": PROFILE_ITERATIONS,
            "averageMs": total_ms / f64::from(PROFILE_ITERATIONS),
        }));
    }

    Json(json!({
        "revision": graph.revision(),
        "instanceCount": graph.instance_count(),
        "products": products,
    }))
}
