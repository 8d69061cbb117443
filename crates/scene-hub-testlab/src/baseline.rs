// crates/scene-hub-testlab/src/baseline.rs
// ============================================================================
// Module: Visual Baseline Store
// Description: Content-hash compare/record of image artifacts.
// Purpose: Turn pixel-identical screenshots into pass/fail test signals.
// Dependencies: base64, sha2, serde, thiserror
// ============================================================================

//! ## Overview
//! Baselines are stored as `{key}.{ext}` under the baselines directory and
//! compared by SHA-256 over raw bytes. Lookup probes a fixed extension list
//! in order so the store never needs an index. `assert` demands an existing
//! matching baseline, `record` overwrites unconditionally, and
//! `assert_or_record` records on first sight then asserts forever after.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::artifacts::is_safe_id_char;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Extension probe order for baseline lookup.
pub const BASELINE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bin"];

// ============================================================================
// SECTION: Request and Result Types
// ============================================================================

/// Comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    /// Baseline must exist and match.
    Assert,
    /// Overwrite the baseline with the incoming artifact.
    Record,
    /// Record when missing, assert otherwise.
    AssertOrRecord,
}

/// Baseline check attached to an incoming artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineRequest {
    /// Baseline key, `[A-Za-z0-9_-]+`.
    pub key: String,
    /// Comparison mode.
    pub mode: BaselineMode,
    /// Relaxes `assert` to pass when no baseline exists yet.
    #[serde(default)]
    pub allow_missing_baseline: bool,
    /// Extension used when recording (`png` when absent).
    #[serde(default)]
    pub extension: Option<String>,
}

/// Outcome of one baseline comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineComparison {
    /// Baseline key.
    pub key: String,
    /// Mode that was applied.
    pub mode: BaselineMode,
    /// Whether a stored baseline existed before this check.
    pub baseline_found: bool,
    /// Whether the check passes.
    pub matched: bool,
    /// Path of the stored baseline, when one exists after the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_path: Option<String>,
    /// SHA-256 of the incoming bytes, hex.
    pub incoming_hash: String,
    /// SHA-256 of the stored baseline, hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_hash: Option<String>,
    /// Whether this check wrote the baseline.
    pub updated_baseline: bool,
    /// Failure or relaxation reason, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Baseline store failures.
#[derive(Debug, Error)]
pub enum BaselineError {
    /// Key contained characters outside `[A-Za-z0-9_-]`.
    #[error("invalid baseline key: {0:?}")]
    InvalidKey(String),
    /// Filesystem failure.
    #[error("baseline io error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Content-hash baseline store.
#[derive(Debug, Clone)]
pub struct VisualBaselineStore {
    /// Baselines directory.
    dir: PathBuf,
}

impl VisualBaselineStore {
    /// Creates a store over the given directory.
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Compares (and depending on mode records) an incoming artifact.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError`] on an invalid key or filesystem failure.
    pub fn check(
        &self,
        request: &BaselineRequest,
        incoming: &[u8],
    ) -> Result<BaselineComparison, BaselineError> {
        if request.key.is_empty() || !request.key.chars().all(is_safe_id_char) {
            return Err(BaselineError::InvalidKey(request.key.clone()));
        }
        let incoming_hash = hash_hex(incoming);
        let existing = self.find_existing(&request.key)?;

        match request.mode {
            BaselineMode::Record => self.record(request, incoming, incoming_hash, existing),
            BaselineMode::Assert => {
                Ok(assert_against(request, incoming_hash, existing))
            }
            BaselineMode::AssertOrRecord => match existing {
                Some(_) => Ok(assert_against(request, incoming_hash, existing)),
                None => self.record(request, incoming, incoming_hash, None),
            },
        }
    }

    /// Writes the baseline file and reports an updated, matching outcome.
    fn record(
        &self,
        request: &BaselineRequest,
        incoming: &[u8],
        incoming_hash: String,
        existing: Option<(PathBuf, String)>,
    ) -> Result<BaselineComparison, BaselineError> {
        fs::create_dir_all(&self.dir)?;
        let extension = request
            .extension
            .as_deref()
            .filter(|ext| BASELINE_EXTENSIONS.contains(ext))
            .unwrap_or("png");
        let path = self.dir.join(format!("{}.{}", request.key, extension));
        // A re-recorded baseline under a new extension replaces the old file.
        if let Some((old_path, _)) = &existing {
            if old_path != &path {
                let _ = fs::remove_file(old_path);
            }
        }
        fs::write(&path, incoming)?;
        Ok(BaselineComparison {
            key: request.key.clone(),
            mode: request.mode,
            baseline_found: existing.is_some(),
            matched: true,
            baseline_path: Some(path.to_string_lossy().to_string()),
            incoming_hash: incoming_hash.clone(),
            baseline_hash: Some(incoming_hash),
            updated_baseline: true,
            reason: None,
        })
    }

    /// Probes the extension list for an existing baseline and hashes it.
    fn find_existing(&self, key: &str) -> Result<Option<(PathBuf, String)>, BaselineError> {
        for extension in BASELINE_EXTENSIONS {
            let path = self.dir.join(format!("{key}.{extension}"));
            if path.exists() {
                let bytes = fs::read(&path)?;
                return Ok(Some((path, hash_hex(&bytes))));
            }
        }
        Ok(None)
    }
}

/// Pure assert comparison against an optional stored baseline.
fn assert_against(
    request: &BaselineRequest,
    incoming_hash: String,
    existing: Option<(PathBuf, String)>,
) -> BaselineComparison {
    match existing {
        Some((path, baseline_hash)) => {
            let matched = baseline_hash == incoming_hash;
            BaselineComparison {
                key: request.key.clone(),
                mode: request.mode,
                baseline_found: true,
                matched,
                baseline_path: Some(path.to_string_lossy().to_string()),
                incoming_hash,
                baseline_hash: Some(baseline_hash),
                updated_baseline: false,
                reason: (!matched).then(|| "hash_mismatch".to_string()),
            }
        }
        None => BaselineComparison {
            key: request.key.clone(),
            mode: request.mode,
            baseline_found: false,
            matched: request.allow_missing_baseline,
            baseline_path: None,
            incoming_hash,
            baseline_hash: None,
            updated_baseline: false,
            reason: Some(if request.allow_missing_baseline {
                "baseline_missing_allowed".to_string()
            } else {
                "baseline_missing".to_string()
            }),
        },
    }
}

/// Hex-encoded SHA-256.
fn hash_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
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

    use super::BaselineMode;
    use super::BaselineRequest;
    use super::VisualBaselineStore;

    /// Builds a request with the given mode.
    fn request(mode: BaselineMode) -> BaselineRequest {
        BaselineRequest {
            key: "menu".to_string(),
            mode,
            allow_missing_baseline: false,
            extension: None,
        }
    }

    #[test]
    fn assert_or_record_records_then_asserts() {
        let dir = tempfile::tempdir().unwrap();
        let store = VisualBaselineStore::new(dir.path().to_path_buf());

        let first = store.check(&request(BaselineMode::AssertOrRecord), b"pixels").unwrap();
        assert!(first.updated_baseline);
        assert!(first.matched);
        assert!(!first.baseline_found);

        let second = store.check(&request(BaselineMode::Assert), b"pixels").unwrap();
        assert!(second.matched);
        assert!(!second.updated_baseline);

        let third = store.check(&request(BaselineMode::Assert), b"other-pixels").unwrap();
        assert!(!third.matched);
        assert_eq!(third.reason.as_deref(), Some("hash_mismatch"));
    }

    #[test]
    fn missing_baseline_fails_assert_unless_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = VisualBaselineStore::new(dir.path().to_path_buf());

        let strict = store.check(&request(BaselineMode::Assert), b"pixels").unwrap();
        assert!(!strict.matched);
        assert_eq!(strict.reason.as_deref(), Some("baseline_missing"));

        let mut relaxed = request(BaselineMode::Assert);
        relaxed.allow_missing_baseline = true;
        let outcome = store.check(&relaxed, b"pixels").unwrap();
        assert!(outcome.matched);
        assert_eq!(outcome.reason.as_deref(), Some("baseline_missing_allowed"));
    }

    #[test]
    fn record_overwrites_existing_baselines() {
        let dir = tempfile::tempdir().unwrap();
        let store = VisualBaselineStore::new(dir.path().to_path_buf());
        store.check(&request(BaselineMode::Record), b"v1").unwrap();
        let updated = store.check(&request(BaselineMode::Record), b"v2").unwrap();
        assert!(updated.updated_baseline);
        assert!(updated.baseline_found);

        let checked = store.check(&request(BaselineMode::Assert), b"v2").unwrap();
        assert!(checked.matched);
    }

    #[test]
    fn hostile_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = VisualBaselineStore::new(dir.path().to_path_buf());
        let mut bad = request(BaselineMode::Record);
        bad.key = "../escape".to_string();
        assert!(store.check(&bad, b"pixels").is_err());
    }
}
