// crates/scene-hub-testlab/src/metrics.rs
// ============================================================================
// Module: Orchestration Metrics
// Description: Queue, retry, and latency aggregates over run records.
// Purpose: Back the metrics endpoint without a metrics framework dependency.
// Dependencies: crate::run, serde
// ============================================================================

//! ## Overview
//! Aggregates are computed on demand from the in-memory run table; nothing is
//! sampled or persisted. Labels are stable so downstream deployments can
//! forward them to their own metrics pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::run::RunRecord;
use crate::run::RunStatus;

// ============================================================================
// SECTION: Metric Types
// ============================================================================

/// Compact digest of one run for the metrics listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDigest {
    /// Run identifier.
    pub id: String,
    /// Current status label.
    pub status: RunStatus,
    /// Current attempt.
    pub attempt: u32,
    /// Wall time from start to finish, when both are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// Queue, retry, and latency summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetrics {
    /// Run counts by status label.
    pub totals: BTreeMap<String, usize>,
    /// Runs currently waiting in the queue.
    pub queue_depth: usize,
    /// Run occupying the single active slot, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_run: Option<String>,
    /// Total retries consumed across all runs.
    pub retries_total: u64,
    /// Mean queue latency (enqueue to first start) in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_queue_latency_ms: Option<i64>,
    /// Mean run duration (start to finish) in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_run_duration_ms: Option<i64>,
    /// Most recent runs, newest first.
    pub recent: Vec<RunDigest>,
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Computes the summary over the run table.
#[must_use]
pub fn compute_metrics(
    runs: &BTreeMap<String, RunRecord>,
    queue_depth: usize,
    active_run: Option<String>,
    retries_total: u64,
    limit: usize,
) -> TestMetrics {
    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    let mut queue_latencies: Vec<i64> = Vec::new();
    let mut durations: Vec<i64> = Vec::new();

    for run in runs.values() {
        *totals.entry(run.status.as_str().to_string()).or_default() += 1;
        if let Some(started) = run.started_at {
            queue_latencies.push(started.millis_since(run.created_at));
            if let Some(finished) = run.finished_at {
                durations.push(finished.millis_since(started));
            }
        }
    }

    let mut recent: Vec<&RunRecord> = runs.values().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let recent = recent
        .into_iter()
        .take(limit)
        .map(|run| RunDigest {
            id: run.id.clone(),
            status: run.status,
            attempt: run.attempt,
            duration_ms: match (run.started_at, run.finished_at) {
                (Some(started), Some(finished)) => Some(finished.millis_since(started)),
                _ => None,
            },
        })
        .collect();

    TestMetrics {
        totals,
        queue_depth,
        active_run,
        retries_total,
        average_queue_latency_ms: mean(&queue_latencies),
        average_run_duration_ms: mean(&durations),
        recent,
    }
}

/// Integer mean, `None` for an empty sample.
fn mean(samples: &[i64]) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }
    let total: i64 = samples.iter().sum();
    Some(total / i64::try_from(samples.len()).unwrap_or(1))
}
