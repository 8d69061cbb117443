// crates/scene-hub-testlab/src/manager.rs
// ============================================================================
// Module: Test Manager
// Description: Run queue, dispatch slot, retry backoff, and event ingestion.
// Purpose: Drive scenario runs through their lifecycle against the editor.
// Dependencies: crate::{scenario, run, artifacts, baseline, metrics},
// scene-hub-core, base64, serde
// ============================================================================

//! ## Overview
//! The manager owns every run record and a FIFO queue where each entry has
//! its own earliest dispatch time. Exactly one run is dispatching or running
//! at any moment. Hosts drive the manager with [`TestManager::tick`],
//! supplying the current time; the manager never sleeps and never samples
//! the clock, which keeps every timeout and backoff branch testable.
//!
//! Attempt stamping is the race hardening: every dispatch carries a 1-based
//! attempt and every editor event must echo it. Events from earlier attempts
//! are ignored, events from future attempts are rejected, and terminal
//! events are idempotent after finalization.
//!
//! Bridge calls and filesystem writes happen outside the state mutex;
//! persistence failures are logged onto the run and never abort the
//! in-memory lifecycle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use scene_hub_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::json;

use crate::artifacts::ArtifactStore;
use crate::baseline::BaselineComparison;
use crate::baseline::BaselineRequest;
use crate::baseline::VisualBaselineStore;
use crate::metrics::TestMetrics;
use crate::metrics::compute_metrics;
use crate::run::RunLogEntry;
use crate::run::RunRecord;
use crate::run::RunReport;
use crate::run::RunResult;
use crate::run::RunStatus;
use crate::scenario::Scenario;
use crate::scenario::ScenarioError;
use crate::scenario::ScenarioPayload;
use crate::scenario::normalize_scenario;
use crate::scenario::retry_delay_ms;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Window for the editor to acknowledge a dispatch with `started`.
pub const DISPATCH_TIMEOUT_MS: i64 = 30_000;

// ============================================================================
// SECTION: Editor Bridge
// ============================================================================

/// Dispatch order sent to the editor for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOrder {
    /// Run identifier.
    pub run_id: String,
    /// 1-based attempt being dispatched.
    pub attempt: u32,
    /// Normalized scenario to execute.
    pub scenario: Scenario,
}

/// Transport seam to the editor-side test harness.
pub trait EditorBridge: Send + Sync {
    /// Sends one dispatch order.
    fn dispatch(&self, order: &DispatchOrder);

    /// Asks the editor to abort the given attempt.
    fn abort(&self, run_id: &str, attempt: u32);
}

/// Bridge that drops every order (tests and headless runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBridge;

impl EditorBridge for NoopBridge {
    fn dispatch(&self, _order: &DispatchOrder) {}

    fn abort(&self, _run_id: &str, _attempt: u32) {}
}

// ============================================================================
// SECTION: Event Wire Types
// ============================================================================

/// One editor-side event posted to the event ingress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Target run id.
    pub run_id: String,
    /// Attempt the event belongs to.
    pub attempt: u32,
    /// Event label: `started`, `log`, `artifact`, `passed`, `failed`,
    /// `aborted`, or `error`.
    pub event: String,
    /// Log or failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Log severity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Attached artifact for `artifact` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactPayload>,
    /// Terminal result details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
}

/// Artifact attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPayload {
    /// Artifact label, used in the stored file name.
    pub label: String,
    /// Base64 binary payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
    /// JSON payload, stored pretty-printed when no binary is supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<JsonValue>,
    /// File extension override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Visual baseline check to run against the binary payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineRequest>,
}

/// Disposition of one ingested event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Non-terminal event applied.
    Applied {
        /// Run state after the event.
        run: RunRecord,
        /// Baseline comparison, when the event carried one.
        baseline: Option<BaselineComparison>,
    },
    /// Terminal event finalized the run.
    Finalized {
        /// Run state after finalization.
        run: RunRecord,
        /// Baseline comparison, when the finalization came from one.
        baseline: Option<BaselineComparison>,
    },
    /// Failure event consumed a retry; the run is queued again.
    Retried {
        /// Run state after re-queueing.
        run: RunRecord,
    },
    /// Event attempt below current; ignored.
    Stale {
        /// The run's current attempt.
        current_attempt: u32,
    },
    /// Event attempt above current; rejected.
    Ahead {
        /// The run's current attempt.
        current_attempt: u32,
    },
    /// Terminal event after finalization; state unchanged.
    AlreadyFinal {
        /// The finalized run state.
        run: RunRecord,
    },
    /// Run id is unknown.
    UnknownRun,
}

// ============================================================================
// SECTION: Manager State
// ============================================================================

/// Guarded manager state.
#[derive(Debug, Default)]
struct ManagerState {
    /// All runs by id.
    runs: BTreeMap<String, RunRecord>,
    /// Queued run ids in FIFO order.
    queue: VecDeque<String>,
    /// Run currently dispatching or running.
    active: Option<String>,
    /// Run id sequence.
    seq: u64,
    /// Total retries consumed across all runs.
    retries_total: u64,
}

/// Deferred side effects computed under the state lock.
#[derive(Debug, Default)]
struct TickEffects {
    /// Orders to send to the editor.
    dispatches: Vec<DispatchOrder>,
    /// Aborts to send to the editor: `(run_id, attempt)`.
    aborts: Vec<(String, u32)>,
    /// Runs whose report snapshot must be rewritten.
    reports: Vec<RunRecord>,
}

/// Queue, dispatch slot, and event ingestion for scenario runs.
pub struct TestManager {
    /// Guarded run state.
    state: Mutex<ManagerState>,
    /// Editor transport.
    bridge: Arc<dyn EditorBridge>,
    /// Run evidence store.
    artifacts: ArtifactStore,
    /// Visual baseline store.
    baselines: VisualBaselineStore,
}

impl TestManager {
    /// Creates a manager persisting under the workspace directory.
    #[must_use]
    pub fn new(bridge: Arc<dyn EditorBridge>, workspace: &Path) -> Self {
        let artifacts = ArtifactStore::new(workspace);
        let baselines = VisualBaselineStore::new(artifacts.baselines_dir());
        Self {
            state: Mutex::new(ManagerState::default()),
            bridge,
            artifacts,
            baselines,
        }
    }

    /// Returns the artifact store (report and artifact listing endpoints).
    #[must_use]
    pub const fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    // ------------------------------------------------------------------
    // Enqueue and lookup
    // ------------------------------------------------------------------

    /// Validates, normalizes, and enqueues a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] when the scenario fails normalization.
    pub fn enqueue(
        &self,
        payload: &ScenarioPayload,
        now: Timestamp,
    ) -> Result<RunRecord, ScenarioError> {
        let scenario = normalize_scenario(payload)?;
        let run = {
            let mut state = self.lock_state();
            state.seq += 1;
            let id = format!("run_{:06}", state.seq);
            let run = RunRecord::queued(id.clone(), scenario, now);
            state.runs.insert(id.clone(), run.clone());
            state.queue.push_back(id);
            run
        };
        self.persist_report(&run);
        Ok(run)
    }

    /// Returns one run by id.
    #[must_use]
    pub fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.lock_state().runs.get(run_id).cloned()
    }

    /// Lists runs, newest first.
    #[must_use]
    pub fn list(&self, limit: usize) -> Vec<RunRecord> {
        let state = self.lock_state();
        let mut runs: Vec<RunRecord> = state.runs.values().cloned().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        runs.truncate(limit);
        runs
    }

    /// Computes queue, retry, and latency metrics.
    #[must_use]
    pub fn metrics(&self, limit: usize) -> TestMetrics {
        let state = self.lock_state();
        compute_metrics(
            &state.runs,
            state.queue.len(),
            state.active.clone(),
            state.retries_total,
            limit,
        )
    }

    // ------------------------------------------------------------------
    // Tick: timeouts and dispatch
    // ------------------------------------------------------------------

    /// Advances the lifecycle: enforces dispatch and execution timeouts,
    /// then fills the single active slot from the queue. Bridge calls and
    /// report writes happen after the state lock drops.
    pub fn tick(&self, now: Timestamp) {
        let mut effects = TickEffects::default();
        {
            let mut state = self.lock_state();
            self.enforce_timeouts(&mut state, now, &mut effects);
            Self::fill_active_slot(&mut state, now, &mut effects);
        }
        for (run_id, attempt) in &effects.aborts {
            self.bridge.abort(run_id, *attempt);
        }
        for order in &effects.dispatches {
            self.bridge.dispatch(order);
        }
        for run in &effects.reports {
            self.persist_report(run);
        }
    }

    /// Finalizes runs whose dispatch or execution deadline passed.
    fn enforce_timeouts(&self, state: &mut ManagerState, now: Timestamp, effects: &mut TickEffects) {
        let Some(active_id) = state.active.clone() else {
            return;
        };
        let Some(run) = state.runs.get_mut(&active_id) else {
            state.active = None;
            return;
        };
        let timed_out = match run.status {
            RunStatus::Dispatching => run
                .dispatch_deadline
                .is_some_and(|deadline| now > deadline)
                .then_some("dispatch_timeout"),
            RunStatus::Running => run
                .execution_deadline
                .is_some_and(|deadline| now > deadline)
                .then_some("timeout"),
            _ => None,
        };
        if let Some(reason) = timed_out {
            if reason == "timeout" {
                effects.aborts.push((run.id.clone(), run.attempt));
            }
            finalize(run, RunStatus::Error, Some(reason.to_string()), None, now);
            effects.reports.push(run.clone());
            state.active = None;
        }
    }

    /// Dispatches the first due queued run when the slot is free.
    fn fill_active_slot(state: &mut ManagerState, now: Timestamp, effects: &mut TickEffects) {
        if state.active.is_some() {
            return;
        }
        let due_position = state.queue.iter().position(|id| {
            state
                .runs
                .get(id)
                .is_some_and(|run| {
                    run.status == RunStatus::Queued
                        && run.next_dispatch_at.is_none_or(|at| at <= now)
                })
        });
        let Some(position) = due_position else {
            return;
        };
        let Some(run_id) = state.queue.remove(position) else {
            return;
        };
        if let Some(run) = state.runs.get_mut(&run_id) {
            run.status = RunStatus::Dispatching;
            run.dispatch_deadline = Some(now.plus_millis(DISPATCH_TIMEOUT_MS));
            run.next_dispatch_at = None;
            run.updated_at = now;
            state.active = Some(run_id.clone());
            effects.dispatches.push(DispatchOrder {
                run_id,
                attempt: run.attempt,
                scenario: run.scenario.clone(),
            });
            effects.reports.push(run.clone());
        }
    }

    // ------------------------------------------------------------------
    // Event ingestion
    // ------------------------------------------------------------------

    /// Ingests one editor event against the current attempt stamp.
    pub fn ingest_event(&self, payload: &EventPayload, now: Timestamp) -> EventOutcome {
        // Phase one: attempt/status checks under the lock.
        {
            let state = self.lock_state();
            let Some(run) = state.runs.get(&payload.run_id) else {
                return EventOutcome::UnknownRun;
            };
            if payload.attempt < run.attempt {
                return EventOutcome::Stale {
                    current_attempt: run.attempt,
                };
            }
            if payload.attempt > run.attempt {
                return EventOutcome::Ahead {
                    current_attempt: run.attempt,
                };
            }
            if run.status.is_terminal() {
                if is_terminal_event(&payload.event) {
                    return EventOutcome::AlreadyFinal { run: run.clone() };
                }
                return EventOutcome::Stale {
                    current_attempt: run.attempt,
                };
            }
        }

        // Phase two: artifact persistence and baseline checks, lock-free.
        let mut baseline_outcome: Option<BaselineComparison> = None;
        let mut persist_warning: Option<String> = None;
        if payload.event == "artifact" {
            if let Some(artifact) = &payload.artifact {
                match self.persist_artifact(&payload.run_id, artifact, now) {
                    Ok(comparison) => baseline_outcome = comparison,
                    Err(message) => persist_warning = Some(message),
                }
            }
        }
        self.append_event_log(payload, now);

        // Phase three: state transition under the lock.
        let (outcome, report) = {
            let mut state = self.lock_state();
            let Some(run) = state.runs.get_mut(&payload.run_id) else {
                return EventOutcome::UnknownRun;
            };
            if payload.attempt != run.attempt || run.status.is_terminal() {
                // Raced with a retry or timeout between phases; treat as stale.
                return EventOutcome::Stale {
                    current_attempt: run.attempt,
                };
            }
            if let Some(warning) = persist_warning {
                run.logs.push(RunLogEntry {
                    at: now,
                    level: "warn".to_string(),
                    message: warning,
                });
            }
            let result = apply_event(run, payload, baseline_outcome.as_ref(), now);
            let (retried, report_run) = match &result {
                EventOutcome::Retried { run } => (true, run.clone()),
                EventOutcome::Applied { run, .. } | EventOutcome::Finalized { run, .. } => {
                    (false, run.clone())
                }
                _ => (false, run.clone()),
            };
            if retried {
                state.retries_total += 1;
                let id = report_run.id.clone();
                state.queue.push_back(id);
            }
            let finished = matches!(result, EventOutcome::Finalized { .. });
            if retried || finished {
                if state.active.as_deref() == Some(payload.run_id.as_str()) {
                    state.active = None;
                }
            }
            (result, report_run)
        };
        self.persist_report(&report);
        outcome
    }

    /// Aborts a run from any non-terminal state.
    #[must_use]
    pub fn abort(&self, run_id: &str, now: Timestamp) -> Option<RunRecord> {
        let (run, notify) = {
            let mut state = self.lock_state();
            let run = state.runs.get_mut(run_id)?;
            if run.status.is_terminal() {
                return Some(run.clone());
            }
            let notify = matches!(run.status, RunStatus::Dispatching | RunStatus::Running)
                .then(|| (run.id.clone(), run.attempt));
            finalize(run, RunStatus::Aborted, Some("aborted_by_request".to_string()), None, now);
            let snapshot = run.clone();
            state.queue.retain(|queued| queued.as_str() != run_id);
            if state.active.as_deref() == Some(run_id) {
                state.active = None;
            }
            (snapshot, notify)
        };
        if let Some((id, attempt)) = notify {
            self.bridge.abort(&id, attempt);
        }
        self.persist_report(&run);
        Some(run)
    }

    // ------------------------------------------------------------------
    // Persistence helpers
    // ------------------------------------------------------------------

    /// Persists one artifact and runs its baseline check, when requested.
    /// Returns a user-facing warning message on persistence failure.
    fn persist_artifact(
        &self,
        run_id: &str,
        artifact: &ArtifactPayload,
        now: Timestamp,
    ) -> Result<Option<BaselineComparison>, String> {
        let (bytes, extension) = match (&artifact.content_base64, &artifact.json) {
            (Some(encoded), _) => {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|error| format!("artifact base64 decode failed: {error}"))?;
                (bytes, artifact.extension.clone().unwrap_or_else(|| "bin".to_string()))
            }
            (None, Some(body)) => {
                let bytes = serde_json::to_vec_pretty(body)
                    .map_err(|error| format!("artifact encode failed: {error}"))?;
                (bytes, artifact.extension.clone().unwrap_or_else(|| "json".to_string()))
            }
            (None, None) => return Ok(None),
        };
        self.artifacts
            .write_artifact(run_id, &artifact.label, &extension, &bytes, now)
            .map_err(|error| format!("artifact persist failed: {error}"))?;

        match &artifact.baseline {
            Some(request) => self
                .baselines
                .check(request, &bytes)
                .map(Some)
                .map_err(|error| format!("baseline check failed: {error}")),
            None => Ok(None),
        }
    }

    /// Appends the accepted event to the run's event log.
    fn append_event_log(&self, payload: &EventPayload, now: Timestamp) {
        let mut record = json!({
            "at": now,
            "attempt": payload.attempt,
            "event": payload.event,
        });
        if let Some(message) = &payload.message {
            record["message"] = json!(message);
        }
        if let Some(artifact) = &payload.artifact {
            record["artifact"] = json!({"label": artifact.label});
        }
        // Persistence failures surface in the report; the lifecycle goes on.
        let _ = self.artifacts.append_event(&payload.run_id, &record);
    }

    /// Rewrites the run's report snapshot.
    fn persist_report(&self, run: &RunRecord) {
        let report = RunReport::for_run(run);
        if let Err(error) = self.artifacts.write_report(&run.id, &report) {
            let mut state = self.lock_state();
            if let Some(stored) = state.runs.get_mut(&run.id) {
                stored.logs.push(RunLogEntry {
                    at: run.updated_at,
                    level: "warn".to_string(),
                    message: format!("report persist failed: {error}"),
                });
            }
        }
    }

    /// Locks manager state, recovering from poisoning.
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Transition Helpers
// ============================================================================

/// Returns true for terminal event labels.
fn is_terminal_event(event: &str) -> bool {
    matches!(event, "passed" | "failed" | "aborted" | "error")
}

/// Applies one attempt-validated event to a non-terminal run.
fn apply_event(
    run: &mut RunRecord,
    payload: &EventPayload,
    baseline: Option<&BaselineComparison>,
    now: Timestamp,
) -> EventOutcome {
    match payload.event.as_str() {
        "started" => {
            if run.status == RunStatus::Dispatching {
                run.status = RunStatus::Running;
                run.started_at = Some(now);
                run.dispatch_deadline = None;
                run.execution_deadline =
                    Some(now.plus_millis(run.scenario.safety.execution_timeout_ms));
                run.updated_at = now;
            }
            EventOutcome::Applied {
                run: run.clone(),
                baseline: None,
            }
        }
        "log" => {
            run.logs.push(RunLogEntry {
                at: now,
                level: payload.level.clone().unwrap_or_else(|| "info".to_string()),
                message: payload.message.clone().unwrap_or_default(),
            });
            run.updated_at = now;
            EventOutcome::Applied {
                run: run.clone(),
                baseline: None,
            }
        }
        "artifact" => {
            run.updated_at = now;
            // A failing assert-mode baseline turns into a test failure.
            if let Some(comparison) = baseline {
                if !comparison.matched {
                    finalize(
                        run,
                        RunStatus::Failed,
                        Some("visual_baseline_assertion".to_string()),
                        payload.result.clone(),
                        now,
                    );
                    return EventOutcome::Finalized {
                        run: run.clone(),
                        baseline: Some(comparison.clone()),
                    };
                }
            }
            EventOutcome::Applied {
                run: run.clone(),
                baseline: baseline.cloned(),
            }
        }
        "passed" => {
            finalize(run, RunStatus::Passed, None, payload.result.clone(), now);
            EventOutcome::Finalized {
                run: run.clone(),
                baseline: None,
            }
        }
        "aborted" => {
            finalize(run, RunStatus::Aborted, Some("aborted_by_editor".to_string()), payload.result.clone(), now);
            EventOutcome::Finalized {
                run: run.clone(),
                baseline: None,
            }
        }
        "failed" | "error" => {
            if run.attempt <= run.max_retries {
                let delay = retry_delay_ms(&run.scenario.safety, run.attempt);
                run.attempt += 1;
                run.status = RunStatus::Queued;
                run.next_dispatch_at = Some(now.plus_millis(delay));
                run.retry_backoff_ms = Some(delay);
                run.dispatch_deadline = None;
                run.execution_deadline = None;
                run.updated_at = now;
                EventOutcome::Retried { run: run.clone() }
            } else {
                let status = if payload.event == "failed" {
                    RunStatus::Failed
                } else {
                    RunStatus::Error
                };
                let reason = payload
                    .result
                    .as_ref()
                    .and_then(|result| result.reason.clone())
                    .or_else(|| payload.message.clone())
                    .unwrap_or_else(|| payload.event.clone());
                finalize(run, status, Some(reason), payload.result.clone(), now);
                EventOutcome::Finalized {
                    run: run.clone(),
                    baseline: None,
                }
            }
        }
        _ => {
            run.logs.push(RunLogEntry {
                at: now,
                level: "warn".to_string(),
                message: format!("unknown event ignored: {}", payload.event),
            });
            run.updated_at = now;
            EventOutcome::Applied {
                run: run.clone(),
                baseline: None,
            }
        }
    }
}

/// Moves a run into a terminal status.
fn finalize(
    run: &mut RunRecord,
    status: RunStatus,
    reason: Option<String>,
    result: Option<RunResult>,
    now: Timestamp,
) {
    run.status = status;
    run.finished_at = Some(now);
    run.updated_at = now;
    run.dispatch_deadline = None;
    run.execution_deadline = None;
    run.next_dispatch_at = None;
    let mut merged = result.unwrap_or_default();
    if merged.reason.is_none() {
        merged.reason = reason;
    }
    run.result = Some(merged);
}
