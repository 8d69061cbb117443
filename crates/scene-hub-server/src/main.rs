// crates/scene-hub-server/src/main.rs
// ============================================================================
// Module: Scene Hub Server Entry Point
// Description: Startup, background tick loop, and graceful shutdown.
// Purpose: Run the synchronization hub as a long-lived process.
// Dependencies: axum, scene-hub-core, scene-hub-testlab, tokio
// ============================================================================

//! ## Overview
//! Startup order: read and validate configuration, prepare the workspace,
//! build the shared state, spawn the test-manager tick loop, then serve.
//! Any startup failure exits non-zero after an audit record; once serving,
//! shutdown waits for ctrl-c.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use scene_hub_core::Timestamp;
use scene_hub_server::AppState;
use scene_hub_server::AuditEvent;
use scene_hub_server::AuditSink;
use scene_hub_server::ServerConfig;
use scene_hub_server::StderrAuditSink;
use scene_hub_server::build_router;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Cadence of the test-manager tick loop.
const TICK_INTERVAL_MS: u64 = 250;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let audit = StderrAuditSink;

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            emit_startup_failure(&audit, "config", &error.to_string());
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = fs::create_dir_all(&config.workspace) {
        emit_startup_failure(&audit, "workspace", &error.to_string());
        return ExitCode::FAILURE;
    }

    let bind_addr = config.bind_addr();
    let state = AppState::build(config);

    spawn_tick_loop(&state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            emit_startup_failure(&audit, "bind", &error.to_string());
            return ExitCode::FAILURE;
        }
    };
    state.audit.emit(&AuditEvent::new(
        "server_started",
        Timestamp::now().as_unix_millis(),
        json!({"addr": bind_addr}),
    ));

    let router = build_router(state.clone());
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            emit_startup_failure(&audit, "serve", &error.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Drives the test manager's timeouts and queue on a fixed cadence.
fn spawn_tick_loop(state: &AppState) {
    let tests = Arc::clone(&state.tests);
    drop(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
        loop {
            interval.tick().await;
            tests.tick(Timestamp::now());
        }
    }));
}

/// Resolves when ctrl-c arrives.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Emits one structured startup failure record.
fn emit_startup_failure(audit: &StderrAuditSink, stage: &str, message: &str) {
    audit.emit(&AuditEvent::new(
        "startup_failed",
        Timestamp::now().as_unix_millis(),
        json!({"stage": stage, "error": message}),
    ));
}
