// crates/scene-hub-testlab/src/scenario.rs
// ============================================================================
// Module: Scenario Normalization
// Description: Validation and clamping of inbound test scenarios.
// Purpose: Reject malformed scenarios before they enter the queue.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Scenarios arrive as untrusted JSON. Normalization enforces the step
//! budget, clamps every safety numeric into its allowed range, resolves the
//! runtime mode (legacy `server` becomes `run`), and gates destructive step
//! types behind an explicit safety flag. The normalized form is what gets
//! stored on the run and dispatched to the editor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default step budget.
pub const DEFAULT_MAX_STEPS: usize = 200;

/// Hard ceiling of the step budget.
pub const MAX_STEPS_CAP: usize = 1_000;

/// Default retry base delay.
pub const DEFAULT_RETRY_DELAY_MS: i64 = 1_500;

/// Default retry backoff factor.
pub const DEFAULT_RETRY_BACKOFF_FACTOR: f64 = 2.0;

/// Default retry delay cap.
pub const DEFAULT_MAX_RETRY_DELAY_MS: i64 = 30_000;

/// Absolute ceiling of any retry delay.
pub const RETRY_DELAY_CEILING_MS: i64 = 3_600_000;

/// Default execution timeout.
pub const DEFAULT_EXECUTION_TIMEOUT_MS: i64 = 120_000;

/// Execution timeout floor.
pub const MIN_EXECUTION_TIMEOUT_MS: i64 = 5_000;

/// Execution timeout ceiling.
pub const MAX_EXECUTION_TIMEOUT_MS: i64 = 900_000;

/// Step types that mutate or destroy editor state; gated behind
/// `safety.allowDestructiveActions`.
pub const DESTRUCTIVE_STEP_TYPES: &[&str] = &["delete_instance", "clear_children", "run_script"];

// ============================================================================
// SECTION: Wire Payloads
// ============================================================================

/// Untrusted scenario payload as posted to the run endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioPayload {
    /// Display name.
    pub name: Option<String>,
    /// Steps in execution order.
    pub steps: Vec<ScenarioStep>,
    /// Safety knobs.
    pub safety: SafetyPayload,
    /// Runtime selection.
    pub runtime: RuntimePayload,
    /// Isolation selection.
    pub isolation: IsolationPayload,
}

/// One scenario step; parameters are opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    /// Step type label.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Step parameters, passed through to the editor.
    #[serde(flatten)]
    pub params: BTreeMap<String, JsonValue>,
}

/// Untrusted safety knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafetyPayload {
    /// Step budget.
    pub max_steps: Option<usize>,
    /// Retry budget.
    pub max_retries: Option<u32>,
    /// Retry base delay in milliseconds.
    pub retry_delay_ms: Option<i64>,
    /// Retry backoff factor.
    pub retry_backoff_factor: Option<f64>,
    /// Retry delay cap in milliseconds.
    pub max_retry_delay_ms: Option<i64>,
    /// Execution timeout in milliseconds.
    pub execution_timeout_ms: Option<i64>,
    /// Opt-in for destructive step types.
    pub allow_destructive_actions: Option<bool>,
}

/// Untrusted runtime selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimePayload {
    /// Requested mode string.
    pub mode: Option<String>,
}

/// Untrusted isolation selection. Opaque beyond the enabled flag; the editor
/// owns rollback semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IsolationPayload {
    /// Whether editor-side rollback is requested.
    pub enabled: Option<bool>,
}

// ============================================================================
// SECTION: Normalized Scenario
// ============================================================================

/// Editor runtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// No runtime; edit-time only.
    None,
    /// Server-style run session.
    Run,
    /// Interactive play session.
    Play,
}

impl RuntimeMode {
    /// Returns the stable mode label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Run => "run",
            Self::Play => "play",
        }
    }
}

/// Clamped, validated safety limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyLimits {
    /// Step budget after clamping.
    pub max_steps: usize,
    /// Retry budget.
    pub max_retries: u32,
    /// Retry base delay.
    pub retry_delay_ms: i64,
    /// Retry backoff factor.
    pub retry_backoff_factor: f64,
    /// Retry delay cap.
    pub max_retry_delay_ms: i64,
    /// Execution timeout.
    pub execution_timeout_ms: i64,
    /// Destructive step opt-in.
    pub allow_destructive_actions: bool,
}

/// A normalized scenario ready to enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Display name.
    pub name: String,
    /// Steps in execution order.
    pub steps: Vec<ScenarioStep>,
    /// Clamped safety limits.
    pub safety: SafetyLimits,
    /// Normalized runtime mode.
    pub runtime_mode: RuntimeMode,
    /// Whether editor-side rollback is requested.
    pub isolation_enabled: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Scenario rejection reasons.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    /// Steps array was empty.
    #[error("scenario has no steps")]
    EmptySteps,
    /// Steps array exceeded the budget.
    #[error("scenario has {count} steps, budget is {budget}")]
    TooManySteps {
        /// Steps supplied.
        count: usize,
        /// Effective budget.
        budget: usize,
    },
    /// Runtime mode string is not recognized.
    #[error("unknown runtime mode: {0:?}")]
    UnknownRuntimeMode(String),
    /// A destructive step type was used without the safety opt-in.
    #[error("destructive step type {0:?} requires safety.allowDestructiveActions")]
    DestructiveStepsNotAllowed(String),
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Validates and normalizes an inbound scenario.
///
/// # Errors
///
/// Returns [`ScenarioError`] naming the first rejected field.
pub fn normalize_scenario(payload: &ScenarioPayload) -> Result<Scenario, ScenarioError> {
    let max_steps = payload
        .safety
        .max_steps
        .unwrap_or(DEFAULT_MAX_STEPS)
        .clamp(1, MAX_STEPS_CAP);
    if payload.steps.is_empty() {
        return Err(ScenarioError::EmptySteps);
    }
    if payload.steps.len() > max_steps {
        return Err(ScenarioError::TooManySteps {
            count: payload.steps.len(),
            budget: max_steps,
        });
    }

    let allow_destructive = payload.safety.allow_destructive_actions.unwrap_or(false);
    if !allow_destructive {
        if let Some(step) = payload
            .steps
            .iter()
            .find(|step| DESTRUCTIVE_STEP_TYPES.contains(&step.step_type.as_str()))
        {
            return Err(ScenarioError::DestructiveStepsNotAllowed(step.step_type.clone()));
        }
    }

    let runtime_mode = match payload.runtime.mode.as_deref() {
        None => RuntimeMode::Play,
        Some("none") => RuntimeMode::None,
        // Legacy mode string; semantics beyond the label are editor-side.
        Some("run" | "server") => RuntimeMode::Run,
        Some("play") => RuntimeMode::Play,
        Some(other) => return Err(ScenarioError::UnknownRuntimeMode(other.to_string())),
    };

    let safety = SafetyLimits {
        max_steps,
        max_retries: payload.safety.max_retries.unwrap_or(0),
        retry_delay_ms: payload
            .safety
            .retry_delay_ms
            .unwrap_or(DEFAULT_RETRY_DELAY_MS)
            .clamp(0, RETRY_DELAY_CEILING_MS),
        retry_backoff_factor: payload
            .safety
            .retry_backoff_factor
            .unwrap_or(DEFAULT_RETRY_BACKOFF_FACTOR)
            .clamp(1.0, 10.0),
        max_retry_delay_ms: payload
            .safety
            .max_retry_delay_ms
            .unwrap_or(DEFAULT_MAX_RETRY_DELAY_MS)
            .clamp(0, RETRY_DELAY_CEILING_MS),
        execution_timeout_ms: payload
            .safety
            .execution_timeout_ms
            .unwrap_or(DEFAULT_EXECUTION_TIMEOUT_MS)
            .clamp(MIN_EXECUTION_TIMEOUT_MS, MAX_EXECUTION_TIMEOUT_MS),
        allow_destructive_actions: allow_destructive,
    };

    Ok(Scenario {
        name: payload.name.clone().unwrap_or_else(|| "scenario".to_string()),
        steps: payload.steps.clone(),
        safety,
        runtime_mode,
        isolation_enabled: payload.isolation.enabled.unwrap_or(true),
    })
}

/// Computes the retry delay after a failed attempt:
/// `min(maxRetryDelayMs, retryDelayMs * factor^(attempt-1))`, clamped to the
/// absolute ceiling.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "Delays are bounded to [0, 1h] before the cast back to millis."
)]
pub fn retry_delay_ms(safety: &SafetyLimits, failed_attempt: u32) -> i64 {
    let exponent = failed_attempt.saturating_sub(1);
    let scaled = (safety.retry_delay_ms as f64)
        * safety.retry_backoff_factor.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
    let capped = scaled.min(safety.max_retry_delay_ms as f64);
    let bounded = capped.clamp(0.0, RETRY_DELAY_CEILING_MS as f64);
    bounded as i64
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

    use std::collections::BTreeMap;

    use super::DEFAULT_EXECUTION_TIMEOUT_MS;
    use super::RuntimeMode;
    use super::ScenarioError;
    use super::ScenarioPayload;
    use super::ScenarioStep;
    use super::normalize_scenario;
    use super::retry_delay_ms;

    /// Builds a payload with the given step types.
    fn payload(step_types: &[&str]) -> ScenarioPayload {
        ScenarioPayload {
            steps: step_types
                .iter()
                .map(|step_type| ScenarioStep {
                    step_type: (*step_type).to_string(),
                    params: BTreeMap::new(),
                })
                .collect(),
            ..ScenarioPayload::default()
        }
    }

    #[test]
    fn defaults_are_applied_and_clamped() {
        let scenario = normalize_scenario(&payload(&["click"])).unwrap();
        assert_eq!(scenario.safety.max_steps, 200);
        assert_eq!(scenario.safety.retry_delay_ms, 1_500);
        assert_eq!(scenario.safety.execution_timeout_ms, DEFAULT_EXECUTION_TIMEOUT_MS);
        assert_eq!(scenario.runtime_mode, RuntimeMode::Play);
        assert!(scenario.isolation_enabled);
    }

    #[test]
    fn empty_steps_are_rejected() {
        assert_eq!(normalize_scenario(&payload(&[])).unwrap_err(), ScenarioError::EmptySteps);
    }

    #[test]
    fn step_budget_is_enforced() {
        let mut wire = payload(&["click"]);
        wire.steps = (0..5)
            .map(|_| wire.steps[0].clone())
            .collect();
        wire.safety.max_steps = Some(3);
        let error = normalize_scenario(&wire).unwrap_err();
        assert_eq!(error, ScenarioError::TooManySteps { count: 5, budget: 3 });
    }

    #[test]
    fn legacy_server_mode_normalizes_to_run() {
        let mut wire = payload(&["click"]);
        wire.runtime.mode = Some("server".to_string());
        let scenario = normalize_scenario(&wire).unwrap();
        assert_eq!(scenario.runtime_mode, RuntimeMode::Run);
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let mut wire = payload(&["click"]);
        wire.runtime.mode = Some("debug".to_string());
        assert!(matches!(
            normalize_scenario(&wire),
            Err(ScenarioError::UnknownRuntimeMode(_))
        ));
    }

    #[test]
    fn destructive_steps_require_the_opt_in() {
        let wire = payload(&["click", "delete_instance"]);
        assert!(matches!(
            normalize_scenario(&wire),
            Err(ScenarioError::DestructiveStepsNotAllowed(_))
        ));

        let mut allowed = payload(&["click", "delete_instance"]);
        allowed.safety.allow_destructive_actions = Some(true);
        assert!(normalize_scenario(&allowed).is_ok());
    }

    #[test]
    fn execution_timeout_clamps_into_range() {
        let mut wire = payload(&["click"]);
        wire.safety.execution_timeout_ms = Some(1);
        assert_eq!(
            normalize_scenario(&wire).unwrap().safety.execution_timeout_ms,
            super::MIN_EXECUTION_TIMEOUT_MS
        );
        wire.safety.execution_timeout_ms = Some(10_000_000);
        assert_eq!(
            normalize_scenario(&wire).unwrap().safety.execution_timeout_ms,
            super::MAX_EXECUTION_TIMEOUT_MS
        );
    }

    #[test]
    fn retry_delay_grows_geometrically_under_the_cap() {
        let mut wire = payload(&["click"]);
        wire.safety.retry_delay_ms = Some(100);
        wire.safety.retry_backoff_factor = Some(2.0);
        wire.safety.max_retry_delay_ms = Some(350);
        let safety = normalize_scenario(&wire).unwrap().safety;
        assert_eq!(retry_delay_ms(&safety, 1), 100);
        assert_eq!(retry_delay_ms(&safety, 2), 200);
        assert_eq!(retry_delay_ms(&safety, 3), 350);
    }
}
