// crates/scene-hub-core/src/control/conflict.rs
// ============================================================================
// Module: Conflict Taxonomy
// Description: Structured conflict bodies for rejected commands.
// Purpose: Name the reason, the refs the caller supplied, and the actual state.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every command rejection is one of four reasons. The `expected` block
//! echoes what the caller asked for (refs, base revision, property); the
//! `actual` block carries the diagnostic state that contradicted it
//! (current revision, blocking lock metadata, offending value).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::json;

// ============================================================================
// SECTION: Conflict Reasons
// ============================================================================

/// Why a command was rejected.
///
/// # Invariants
/// - Variants are stable wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Target or parent ref did not resolve.
    NotFound,
    /// Requested path overlaps a foreign active lock.
    Locked,
    /// Supplied base revision does not match current.
    RevisionMismatch,
    /// Malformed payload or constraint violation.
    ValidationFailed,
}

impl ConflictReason {
    /// Returns a stable label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Locked => "locked",
            Self::RevisionMismatch => "revision_mismatch",
            Self::ValidationFailed => "validation_failed",
        }
    }

    /// Returns the HTTP status for a single-command rejection.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Locked => 423,
            Self::RevisionMismatch => 409,
            Self::ValidationFailed => 400,
        }
    }
}

// ============================================================================
// SECTION: Conflict Body
// ============================================================================

/// Structured conflict carried in rejection bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Rejection reason.
    pub reason: ConflictReason,
    /// What the command supplied.
    pub expected: JsonValue,
    /// Diagnostic block describing actual state.
    pub actual: JsonValue,
}

impl Conflict {
    /// Builds a conflict from its parts.
    #[must_use]
    pub const fn new(reason: ConflictReason, expected: JsonValue, actual: JsonValue) -> Self {
        Self {
            reason,
            expected,
            actual,
        }
    }

    /// Renders the standard rejection body: an `error` string plus the
    /// conflict object.
    #[must_use]
    pub fn into_body(self, error: impl Into<String>) -> JsonValue {
        json!({
            "error": error.into(),
            "conflict": self,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::Conflict;
    use super::ConflictReason;

    #[test]
    fn reasons_serialize_snake_case() {
        let rendered = serde_json::to_value(ConflictReason::RevisionMismatch).unwrap();
        assert_eq!(rendered, json!("revision_mismatch"));
    }

    #[test]
    fn body_carries_error_and_conflict() {
        let body = Conflict::new(
            ConflictReason::RevisionMismatch,
            json!({"baseRevision": 4}),
            json!({"currentRevision": 5}),
        )
        .into_body("stale base revision");
        assert_eq!(body["error"], json!("stale base revision"));
        assert_eq!(body["conflict"]["reason"], json!("revision_mismatch"));
        assert_eq!(body["conflict"]["actual"]["currentRevision"], json!(5));
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ConflictReason::NotFound.http_status(), 404);
        assert_eq!(ConflictReason::Locked.http_status(), 423);
        assert_eq!(ConflictReason::RevisionMismatch.http_status(), 409);
        assert_eq!(ConflictReason::ValidationFailed.http_status(), 400);
    }
}
