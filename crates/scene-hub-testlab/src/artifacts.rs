// crates/scene-hub-testlab/src/artifacts.rs
// ============================================================================
// Module: Run Artifact Store
// Description: Per-run event logs, reports, and artifact files on disk.
// Purpose: Persist run evidence under the workspace test directory.
// Dependencies: crate::run, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each run owns a directory under `.uxr-tests/` named by its id: an
//! append-only `events.jsonl`, a `report.json` snapshot overwritten on every
//! state change, and timestamped artifact files. Run ids are restricted to
//! `[A-Za-z0-9_-]+` so a hostile id can never escape the store root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use scene_hub_core::Timestamp;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::run::RunReport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory under the workspace root holding all run artifacts.
pub const TESTS_DIR_NAME: &str = ".uxr-tests";

/// Baselines subdirectory name.
pub const BASELINES_DIR_NAME: &str = "baselines";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact persistence failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Run id contained characters outside `[A-Za-z0-9_-]`.
    #[error("invalid run id: {0:?}")]
    InvalidRunId(String),
    /// Filesystem failure.
    #[error("artifact io error: {0}")]
    Io(#[from] io::Error),
    /// Serialization failure.
    #[error("artifact encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// SECTION: Listings
// ============================================================================

/// One artifact file in a run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    /// File name within the run directory.
    pub file_name: String,
    /// File size in bytes.
    pub size_bytes: u64,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Filesystem store for run evidence.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Root directory, `<workspace>/.uxr-tests`.
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted under the workspace directory.
    #[must_use]
    pub fn new(workspace: &Path) -> Self {
        Self {
            root: workspace.join(TESTS_DIR_NAME),
        }
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the baselines directory.
    #[must_use]
    pub fn baselines_dir(&self) -> PathBuf {
        self.root.join(BASELINES_DIR_NAME)
    }

    /// Appends one event record to the run's `events.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] on an invalid id or filesystem failure.
    pub fn append_event(&self, run_id: &str, event: &JsonValue) -> Result<(), ArtifactError> {
        let dir = self.run_dir(run_id)?;
        fs::create_dir_all(&dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("events.jsonl"))?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Overwrites the run's `report.json` snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] on an invalid id or filesystem failure.
    pub fn write_report(&self, run_id: &str, report: &RunReport) -> Result<PathBuf, ArtifactError> {
        let dir = self.run_dir(run_id)?;
        fs::create_dir_all(&dir)?;
        let path = dir.join("report.json");
        fs::write(&path, serde_json::to_vec_pretty(report)?)?;
        Ok(path)
    }

    /// Reads the persisted report, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] on an invalid id or filesystem failure.
    pub fn read_report(&self, run_id: &str) -> Result<Option<JsonValue>, ArtifactError> {
        let path = self.run_dir(run_id)?.join("report.json");
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Writes one artifact file named `{timestamp}-{label}.{ext}`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] on an invalid id or filesystem failure.
    pub fn write_artifact(
        &self,
        run_id: &str,
        label: &str,
        extension: &str,
        bytes: &[u8],
        now: Timestamp,
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.run_dir(run_id)?;
        fs::create_dir_all(&dir)?;
        let file_name = format!(
            "{}-{}.{}",
            now.as_unix_millis(),
            sanitize_label(label),
            sanitize_label(extension),
        );
        let path = dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Lists artifact files in the run directory, excluding the event log
    /// and report.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] on an invalid id or filesystem failure.
    pub fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactEntry>, ArtifactError> {
        let dir = self.run_dir(run_id)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name == "events.jsonl" || file_name == "report.json" {
                continue;
            }
            entries.push(ArtifactEntry {
                file_name,
                size_bytes: entry.metadata()?.len(),
            });
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    /// Resolves a run directory, rejecting ids that could escape the root.
    fn run_dir(&self, run_id: &str) -> Result<PathBuf, ArtifactError> {
        if run_id.is_empty() || !run_id.chars().all(is_safe_id_char) {
            return Err(ArtifactError::InvalidRunId(run_id.to_string()));
        }
        Ok(self.root.join(run_id))
    }
}

/// Characters permitted in run ids and baseline keys.
#[must_use]
pub fn is_safe_id_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || character == '_' || character == '-'
}

/// Replaces unsafe label characters so artifact names stay flat.
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|character| if is_safe_id_char(character) { character } else { '-' })
        .collect();
    if cleaned.is_empty() { "artifact".to_string() } else { cleaned }
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

    use scene_hub_core::Timestamp;
    use serde_json::json;

    use super::ArtifactError;
    use super::ArtifactStore;

    #[test]
    fn traversal_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let error = store.append_event("../escape", &json!({})).unwrap_err();
        assert!(matches!(error, ArtifactError::InvalidRunId(_)));
    }

    #[test]
    fn events_append_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.append_event("run_1", &json!({"event": "started"})).unwrap();
        store.append_event("run_1", &json!({"event": "passed"})).unwrap();
        let log =
            std::fs::read_to_string(dir.path().join(".uxr-tests/run_1/events.jsonl")).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[test]
    fn artifacts_are_timestamp_labeled_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = store
            .write_artifact("run_1", "menu shot", "png", b"bytes", Timestamp::from_unix_millis(42))
            .unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("42-menu-shot"));

        let listed = store.list_artifacts("run_1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size_bytes, 5);
    }
}
