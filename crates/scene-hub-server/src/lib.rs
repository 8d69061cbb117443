// crates/scene-hub-server/src/lib.rs
// ============================================================================
// Module: Scene Hub Server Library
// Description: HTTP and WebSocket surface over the Scene Hub core.
// Purpose: Expose configuration, state wiring, routes, and telemetry.
// Dependencies: axum, scene-hub-core, scene-hub-testlab, tokio
// ============================================================================

//! ## Overview
//! The server binds the canonical scene graph, the agent control plane, and
//! the test orchestrator onto one axum router plus a WebSocket live-stream
//! channel. All engine logic lives in the core crates; this crate is
//! transport, configuration, and observability.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod routes;
pub mod state;
pub mod stream;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::DEFAULT_HOST;
pub use config::DEFAULT_PORT;
pub use config::ServerConfig;
pub use routes::build_router;
pub use state::AppState;
pub use stream::StreamHub;
pub use telemetry::AuditEvent;
pub use telemetry::AuditSink;
pub use telemetry::FileAuditSink;
pub use telemetry::NoopAuditSink;
pub use telemetry::NoopMetrics;
pub use telemetry::RequestEvent;
pub use telemetry::RequestOutcome;
pub use telemetry::ServerMetrics;
pub use telemetry::StderrAuditSink;
