// crates/scene-hub-server/src/telemetry.rs
// ============================================================================
// Module: Server Telemetry
// Description: Request metrics and structured audit events without hard deps.
// Purpose: Emit observable events through thin traits deployments can replace.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for request counters and a
//! structured audit sink writing one JSON record per line. It is
//! intentionally dependency-light so downstream deployments can plug in
//! their preferred pipeline without redesign. Audit payloads must never
//! carry raw scene content, only identifiers and sizes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value as JsonValue;

// ============================================================================
// SECTION: Request Metrics
// ============================================================================

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// 2xx and 3xx responses.
    Ok,
    /// 4xx responses.
    ClientError,
    /// 5xx responses.
    ServerError,
}

impl RequestOutcome {
    /// Classifies an HTTP status.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            200..=399 => Self::Ok,
            400..=499 => Self::ClientError,
            _ => Self::ServerError,
        }
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
        }
    }
}

/// One request metric event.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    /// HTTP method.
    pub method: String,
    /// Matched route path.
    pub route: String,
    /// Response status.
    pub status: u16,
    /// Outcome classification.
    pub outcome: RequestOutcome,
    /// Handler latency in milliseconds.
    pub latency_ms: u64,
}

/// Metrics sink for request events.
pub trait ServerMetrics: Send + Sync {
    /// Records one finished request.
    fn record_request(&self, event: &RequestEvent);
}

/// Metrics sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl ServerMetrics for NoopMetrics {
    fn record_request(&self, _event: &RequestEvent) {}
}

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// One structured audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Identifier-only detail payload.
    pub detail: JsonValue,
}

impl AuditEvent {
    /// Builds an audit event stamped with the caller-supplied time.
    #[must_use]
    pub const fn new(event: &'static str, timestamp_ms: i64, detail: JsonValue) -> Self {
        Self {
            event,
            timestamp_ms,
            detail,
        }
    }
}

/// Audit sink for structured events.
pub trait AuditSink: Send + Sync {
    /// Emits one event.
    fn emit(&self, event: &AuditEvent);
}

/// Audit sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: &AuditEvent) {}
}

/// Audit sink writing one JSON line per event to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn emit(&self, event: &AuditEvent) {
        if let Ok(mut line) = serde_json::to_string(event) {
            line.push('\n');
            let _ = io::stderr().write_all(line.as_bytes());
        }
    }
}

/// Audit sink appending one JSON line per event to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    /// Append handle guarded for concurrent emitters.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens (or creates) the audit file in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn emit(&self, event: &AuditEvent) {
        let Ok(mut line) = serde_json::to_string(event) else {
            return;
        };
        line.push('\n');
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use serde_json::json;

    use super::AuditEvent;
    use super::AuditSink;
    use super::FileAuditSink;
    use super::RequestOutcome;

    #[test]
    fn outcome_classification_follows_status_classes() {
        assert_eq!(RequestOutcome::from_status(200), RequestOutcome::Ok);
        assert_eq!(RequestOutcome::from_status(404), RequestOutcome::ClientError);
        assert_eq!(RequestOutcome::from_status(500), RequestOutcome::ServerError);
    }

    #[test]
    fn file_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::open(&path).unwrap();
        sink.emit(&AuditEvent::new("request", 1, json!({"route": "/health"})));
        sink.emit(&AuditEvent::new("request", 2, json!({"route": "/sync"})));
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
