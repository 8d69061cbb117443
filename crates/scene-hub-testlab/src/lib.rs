// crates/scene-hub-testlab/src/lib.rs
// ============================================================================
// Module: Scene Hub Testlab Library
// Description: Public API surface for the autonomous test orchestrator.
// Purpose: Expose scenarios, runs, the manager, artifacts, and baselines.
// Dependencies: crate::{scenario, run, manager, artifacts, baseline, metrics}
// ============================================================================

//! ## Overview
//! The testlab drives scenario runs against the editor through an explicit
//! state machine with attempt-stamped events, a single active slot, and
//! retry backoff. Hosts supply time on every call; the crate never sleeps
//! and never samples the clock, so every timing branch is testable.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod artifacts;
pub mod baseline;
pub mod manager;
pub mod metrics;
pub mod run;
pub mod scenario;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use artifacts::ArtifactEntry;
pub use artifacts::ArtifactError;
pub use artifacts::ArtifactStore;
pub use artifacts::BASELINES_DIR_NAME;
pub use artifacts::TESTS_DIR_NAME;
pub use baseline::BASELINE_EXTENSIONS;
pub use baseline::BaselineComparison;
pub use baseline::BaselineMode;
pub use baseline::BaselineRequest;
pub use baseline::VisualBaselineStore;
pub use manager::ArtifactPayload;
pub use manager::DISPATCH_TIMEOUT_MS;
pub use manager::DispatchOrder;
pub use manager::EditorBridge;
pub use manager::EventOutcome;
pub use manager::EventPayload;
pub use manager::NoopBridge;
pub use manager::TestManager;
pub use metrics::RunDigest;
pub use metrics::TestMetrics;
pub use run::RunLogEntry;
pub use run::RunRecord;
pub use run::RunReport;
pub use run::RunResult;
pub use run::RunStatus;
pub use run::RunSummary;
pub use scenario::RuntimeMode;
pub use scenario::SafetyLimits;
pub use scenario::Scenario;
pub use scenario::ScenarioError;
pub use scenario::ScenarioPayload;
pub use scenario::ScenarioStep;
pub use scenario::normalize_scenario;
pub use scenario::retry_delay_ms;
