// crates/scene-hub-core/src/core/time.rs
// ============================================================================
// Module: Scene Hub Time Model
// Description: Millisecond timestamps for revisions, locks, and run records.
// Purpose: Provide explicit caller-supplied time values across Scene Hub state.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Scene Hub components never read wall-clock time inside engine logic; hosts
//! supply timestamps at every mutation boundary so lock expiry, idempotency
//! TTLs, and run scheduling stay deterministic under test. The [`Timestamp::now`]
//! helper exists for the server edge only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix-epoch millisecond timestamp used across Scene Hub records.
///
/// # Invariants
/// - Values are explicitly provided by callers; engine code never samples the
///   clock itself.
/// - Monotonicity within a component is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Samples the system clock. Host edges only; engine code takes
    /// timestamps as parameters.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Self(millis)
    }

    /// Returns this timestamp advanced by the given number of milliseconds.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the signed difference `self - earlier` in milliseconds.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::Timestamp;

    #[test]
    fn arithmetic_round_trips() {
        let base = Timestamp::from_unix_millis(1_000);
        let later = base.plus_millis(500);
        assert_eq!(later.as_unix_millis(), 1_500);
        assert_eq!(later.millis_since(base), 500);
        assert_eq!(base.millis_since(later), -500);
    }

    #[test]
    fn ordering_follows_millis() {
        let earlier = Timestamp::from_unix_millis(10);
        let later = Timestamp::from_unix_millis(20);
        assert!(earlier < later);
    }
}
