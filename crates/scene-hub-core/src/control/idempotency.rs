// crates/scene-hub-core/src/control/idempotency.rs
// ============================================================================
// Module: Idempotency Cache
// Description: Keyed response memo with TTL and an age-ordered entry cap.
// Purpose: Make agent retries return byte-identical outcomes without re-execution.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Clients supply a key per retriable request; the cache maps it to the
//! finalized `(status, body)` outcome. Without a key nothing is memoized.
//! On insert, expired entries are evicted first, then oldest-by-creation
//! until the cache is under its cap. Returned bodies are deep clones so
//! callers can never mutate cached state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde_json::Value as JsonValue;

use crate::core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default entry lifetime.
pub const DEFAULT_IDEMPOTENCY_TTL_MS: i64 = 300_000;

/// Default maximum entry count.
pub const DEFAULT_IDEMPOTENCY_CAP: usize = 500;

// ============================================================================
// SECTION: Cached Outcomes
// ============================================================================

/// One memoized response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutcome {
    /// HTTP status of the finalized response.
    pub status: u16,
    /// Finalized response body.
    pub body: JsonValue,
    /// Insertion time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Keyed response memo with TTL and entry cap.
#[derive(Debug)]
pub struct IdempotencyCache {
    /// Guarded entry map.
    entries: Mutex<BTreeMap<String, CachedOutcome>>,
    /// Entry lifetime.
    ttl_ms: i64,
    /// Maximum entry count.
    cap: usize,
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyCache {
    /// Creates a cache with default TTL and cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_IDEMPOTENCY_TTL_MS, DEFAULT_IDEMPOTENCY_CAP)
    }

    /// Creates a cache with custom TTL and cap.
    #[must_use]
    pub fn with_limits(ttl_ms: i64, cap: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            ttl_ms,
            cap,
        }
    }

    /// Returns the memoized outcome for a key, if present and unexpired.
    /// The returned body is a deep clone.
    pub fn get(&self, key: &str, now: Timestamp) -> Option<CachedOutcome> {
        let entries = self.lock_entries();
        entries
            .get(key)
            .filter(|outcome| now.millis_since(outcome.created_at) <= self.ttl_ms)
            .cloned()
    }

    /// Memoizes a finalized outcome, evicting expired entries first and then
    /// oldest-by-creation entries until under the cap.
    pub fn set(&self, key: &str, status: u16, body: JsonValue, now: Timestamp) {
        let mut entries = self.lock_entries();
        let ttl = self.ttl_ms;
        entries.retain(|_, outcome| now.millis_since(outcome.created_at) <= ttl);
        while entries.len() >= self.cap {
            let oldest = entries
                .iter()
                .min_by_key(|(_, outcome)| outcome.created_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => entries.remove(&key),
                None => break,
            };
        }
        entries.insert(
            key.to_string(),
            CachedOutcome {
                status,
                body,
                created_at: now,
            },
        );
    }

    /// Returns the current entry count (diagnostics).
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Returns true when no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Locks internal state, recovering from poisoning.
    fn lock_entries(&self) -> MutexGuard<'_, BTreeMap<String, CachedOutcome>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use crate::core::Timestamp;

    use super::IdempotencyCache;

    #[test]
    fn hits_return_identical_status_and_body() {
        let cache = IdempotencyCache::new();
        let now = Timestamp::from_unix_millis(0);
        cache.set("key-1", 200, json!({"revision": 4}), now);
        let hit = cache.get("key-1", now).unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, json!({"revision": 4}));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = IdempotencyCache::with_limits(1_000, 10);
        let start = Timestamp::from_unix_millis(0);
        cache.set("key-1", 200, json!({}), start);
        assert!(cache.get("key-1", Timestamp::from_unix_millis(999)).is_some());
        assert!(cache.get("key-1", Timestamp::from_unix_millis(1_001)).is_none());
    }

    #[test]
    fn cap_evicts_oldest_entries_first() {
        let cache = IdempotencyCache::with_limits(60_000, 2);
        cache.set("a", 200, json!(1), Timestamp::from_unix_millis(0));
        cache.set("b", 200, json!(2), Timestamp::from_unix_millis(10));
        cache.set("c", 200, json!(3), Timestamp::from_unix_millis(20));
        let now = Timestamp::from_unix_millis(30);
        assert!(cache.get("a", now).is_none());
        assert!(cache.get("b", now).is_some());
        assert!(cache.get("c", now).is_some());
    }

    #[test]
    fn returned_bodies_are_clones() {
        let cache = IdempotencyCache::new();
        let now = Timestamp::from_unix_millis(0);
        cache.set("key-1", 200, json!({"nested": {"n": 1}}), now);
        let mut first = cache.get("key-1", now).unwrap();
        first.body["nested"]["n"] = json!(99);
        let second = cache.get("key-1", now).unwrap();
        assert_eq!(second.body["nested"]["n"], json!(1));
    }
}
