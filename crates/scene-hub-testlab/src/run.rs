// crates/scene-hub-testlab/src/run.rs
// ============================================================================
// Module: Test Run Records
// Description: Run lifecycle state, logs, results, and report summaries.
// Purpose: Capture the full evolution of one scenario run for replay.
// Dependencies: crate::scenario, scene-hub-core, serde
// ============================================================================

//! ## Overview
//! A run is in exactly one status at a time. Only queued, dispatching, and
//! running transition further; passed, failed, aborted, and error are
//! terminal. Every mutation stamps `updated_at` with caller-supplied time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use scene_hub_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::scenario::Scenario;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - Variants are stable wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting in the queue for its dispatch time.
    Queued,
    /// Sent to the editor, awaiting the started acknowledgement.
    Dispatching,
    /// Executing in the editor.
    Running,
    /// Finished with every assertion passing.
    Passed,
    /// Finished with assertion failures.
    Failed,
    /// Stopped by an abort request.
    Aborted,
    /// Finished abnormally (timeout, dispatch failure, editor error).
    Error,
}

impl RunStatus {
    /// Returns true for passed, failed, aborted, and error.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Aborted | Self::Error)
    }

    /// Returns the stable status label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatching => "dispatching",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Logs and Results
// ============================================================================

/// One appended log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    /// When the line was appended.
    pub at: Timestamp,
    /// Severity label from the editor (`info` when absent).
    pub level: String,
    /// Log message.
    pub message: String,
}

/// Terminal result reported by the editor or synthesized by the
/// orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunResult {
    /// Failure reason label, when not passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Assertions that passed.
    pub assertions_passed: u32,
    /// Assertions that failed.
    pub assertions_failed: u32,
    /// 0-based index of the failing step, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_step: Option<u32>,
    /// Editor-provided detail payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

// ============================================================================
// SECTION: Run Record
// ============================================================================

/// Full state of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Run identifier, `[A-Za-z0-9_-]+`.
    pub id: String,
    /// Current status.
    pub status: RunStatus,
    /// Normalized scenario.
    pub scenario: Scenario,
    /// 1-based dispatch attempt, incremented on each retry.
    pub attempt: u32,
    /// Retry budget from the scenario safety limits.
    pub max_retries: u32,
    /// Enqueue time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// First `started` acknowledgement time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// Finalization time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Earliest time the queue may dispatch this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_dispatch_at: Option<Timestamp>,
    /// Backoff applied to the most recent retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<i64>,
    /// Deadline for the editor to acknowledge a dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_deadline: Option<Timestamp>,
    /// Deadline for the running scenario to finish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_deadline: Option<Timestamp>,
    /// Appended log lines.
    pub logs: Vec<RunLogEntry>,
    /// Terminal result, once finalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
}

impl RunRecord {
    /// Creates a queued run for a normalized scenario.
    #[must_use]
    pub fn queued(id: String, scenario: Scenario, now: Timestamp) -> Self {
        let max_retries = scenario.safety.max_retries;
        Self {
            id,
            status: RunStatus::Queued,
            scenario,
            attempt: 1,
            max_retries,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            next_dispatch_at: Some(now),
            retry_backoff_ms: None,
            dispatch_deadline: None,
            execution_deadline: None,
            logs: Vec::new(),
            result: None,
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Derived summary embedded in the persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Attempts consumed.
    pub attempts_used: u32,
    /// Wall time from start to finish, when both are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Assertions that passed.
    pub assertions_passed: u32,
    /// Assertions that failed.
    pub assertions_failed: u32,
    /// 0-based index of the failing step, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_step: Option<u32>,
}

/// Persisted latest-report snapshot for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Full run state at report time.
    pub run: RunRecord,
    /// Derived summary.
    pub summary: RunSummary,
}

impl RunReport {
    /// Builds the report for a run's current state.
    #[must_use]
    pub fn for_run(run: &RunRecord) -> Self {
        let result = run.result.clone().unwrap_or_default();
        let duration_ms = match (run.started_at, run.finished_at) {
            (Some(started), Some(finished)) => Some(finished.millis_since(started)),
            _ => None,
        };
        Self {
            run: run.clone(),
            summary: RunSummary {
                attempts_used: run.attempt,
                duration_ms,
                assertions_passed: result.assertions_passed,
                assertions_failed: result.assertions_failed,
                failure_step: result.failure_step,
            },
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
