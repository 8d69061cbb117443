// crates/scene-hub-core/src/control/locks.rs
// ============================================================================
// Module: Path Lock Manager
// Description: TTL-bounded path-prefix exclusion locks with contention log.
// Purpose: Serialize agent commands touching overlapping subtrees.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Two locks conflict iff one path is a segment-prefix of (or equal to) the
//! other, so locking `Workspace` excludes the whole subtree. Acquisition is
//! non-blocking: denial returns the blocking lock immediately and callers
//! never sleep here. Expired locks are pruned before every overlap check,
//! independent of owner liveness.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Deserialize;
use serde::Serialize;

use crate::core::LockOwner;
use crate::core::ScenePath;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default lock lifetime.
pub const DEFAULT_LOCK_TTL_MS: i64 = 15_000;

/// Default bound of the contention ring buffer.
pub const DEFAULT_CONTENTION_LOG_CAP: usize = 500;

// ============================================================================
// SECTION: Lock Types
// ============================================================================

/// One held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockEntry {
    /// Locked path.
    path: ScenePath,
    /// Holding owner.
    owner: LockOwner,
    /// Expiry instant.
    expires_at: Timestamp,
}

/// Active-lock listing entry with remaining TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLock {
    /// Locked path.
    pub path: ScenePath,
    /// Holding owner.
    pub owner: LockOwner,
    /// Expiry instant.
    pub expires_at: Timestamp,
    /// Remaining lifetime in milliseconds.
    pub remaining_ms: i64,
}

/// A denied acquisition, naming the blocking lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConflict {
    /// Path the caller requested.
    pub requested_path: ScenePath,
    /// Path of the blocking lock.
    pub blocking_path: ScenePath,
    /// Owner of the blocking lock.
    pub blocking_owner: LockOwner,
    /// Expiry of the blocking lock.
    pub expires_at: Timestamp,
}

/// Contention-log record of one rejected acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentionRecord {
    /// Rejected requester.
    pub requested_owner: LockOwner,
    /// The denial that was returned.
    #[serde(flatten)]
    pub conflict: LockConflict,
    /// When the rejection happened.
    pub rejected_at: Timestamp,
}

// ============================================================================
// SECTION: Lock Manager
// ============================================================================

/// Guarded lock state.
#[derive(Debug, Default)]
struct LockState {
    /// Currently held locks.
    locks: Vec<LockEntry>,
    /// Recent rejected acquisitions, newest last.
    contention: VecDeque<ContentionRecord>,
}

/// Path-prefix lock manager.
#[derive(Debug)]
pub struct LockManager {
    /// Guarded state.
    state: Mutex<LockState>,
    /// Lock lifetime applied on acquisition.
    ttl_ms: i64,
    /// Contention ring bound.
    contention_cap: usize,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    /// Creates a manager with default TTL and contention bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_LOCK_TTL_MS)
    }

    /// Creates a manager with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl_ms: i64) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            ttl_ms,
            contention_cap: DEFAULT_CONTENTION_LOG_CAP,
        }
    }

    /// Acquires all requested paths atomically for one owner, or denies with
    /// the first blocking lock. Re-entrant for paths the owner already holds.
    ///
    /// # Errors
    ///
    /// Returns [`LockConflict`] naming the blocking path, owner, and expiry.
    pub fn acquire(
        &self,
        paths: &[ScenePath],
        owner: &LockOwner,
        now: Timestamp,
    ) -> Result<(), LockConflict> {
        let mut state = self.lock_state();
        prune_expired(&mut state, now);

        for requested in paths {
            let blocking = state
                .locks
                .iter()
                .find(|held| held.owner != *owner && held.path.overlaps(requested));
            if let Some(held) = blocking {
                let conflict = LockConflict {
                    requested_path: requested.clone(),
                    blocking_path: held.path.clone(),
                    blocking_owner: held.owner.clone(),
                    expires_at: held.expires_at,
                };
                state.contention.push_back(ContentionRecord {
                    requested_owner: owner.clone(),
                    conflict: conflict.clone(),
                    rejected_at: now,
                });
                while state.contention.len() > self.contention_cap {
                    state.contention.pop_front();
                }
                return Err(conflict);
            }
        }

        let expires_at = now.plus_millis(self.ttl_ms);
        for requested in paths {
            state.locks.push(LockEntry {
                path: requested.clone(),
                owner: owner.clone(),
                expires_at,
            });
        }
        Ok(())
    }

    /// Releases every lock held by an owner.
    pub fn release(&self, owner: &LockOwner) {
        let mut state = self.lock_state();
        state.locks.retain(|held| held.owner != *owner);
    }

    /// Lists active locks with remaining TTL, pruning expired entries first.
    pub fn active(&self, now: Timestamp) -> Vec<ActiveLock> {
        let mut state = self.lock_state();
        prune_expired(&mut state, now);
        state
            .locks
            .iter()
            .map(|held| ActiveLock {
                path: held.path.clone(),
                owner: held.owner.clone(),
                expires_at: held.expires_at,
                remaining_ms: held.expires_at.millis_since(now),
            })
            .collect()
    }

    /// Returns the most recent contention records, newest first.
    pub fn contention(&self, limit: usize) -> Vec<ContentionRecord> {
        let state = self.lock_state();
        state.contention.iter().rev().take(limit).cloned().collect()
    }

    /// Locks internal state, recovering from poisoning.
    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Drops every lock whose expiry passed.
fn prune_expired(state: &mut LockState, now: Timestamp) {
    state.locks.retain(|held| held.expires_at > now);
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use crate::core::LockOwner;
    use crate::core::ScenePath;
    use crate::core::Timestamp;

    use super::LockManager;

    /// Shorthand for a path from segment literals.
    fn path(segments: &[&str]) -> ScenePath {
        ScenePath::from(segments)
    }

    #[test]
    fn overlapping_owners_exclude_each_other() {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        let alice = LockOwner::new("alice");
        let bob = LockOwner::new("bob");
        manager.acquire(&[path(&["Workspace"])], &alice, now).unwrap();

        let denied = manager
            .acquire(&[path(&["Workspace", "Door"])], &bob, now)
            .unwrap_err();
        assert_eq!(denied.blocking_owner, alice);
        assert_eq!(denied.blocking_path, path(&["Workspace"]));
    }

    #[test]
    fn disjoint_paths_coexist() {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        manager
            .acquire(&[path(&["Workspace"])], &LockOwner::new("alice"), now)
            .unwrap();
        manager
            .acquire(&[path(&["Lighting"])], &LockOwner::new("bob"), now)
            .unwrap();
        assert_eq!(manager.active(now).len(), 2);
    }

    #[test]
    fn reacquisition_by_the_same_owner_is_allowed() {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        let alice = LockOwner::new("alice");
        manager.acquire(&[path(&["Workspace"])], &alice, now).unwrap();
        manager
            .acquire(&[path(&["Workspace", "Door"])], &alice, now)
            .unwrap();
    }

    #[test]
    fn expired_locks_are_pruned_before_checks() {
        let manager = LockManager::with_ttl(1_000);
        let start = Timestamp::from_unix_millis(0);
        let alice = LockOwner::new("alice");
        manager.acquire(&[path(&["Workspace"])], &alice, start).unwrap();

        let later = Timestamp::from_unix_millis(2_000);
        manager
            .acquire(&[path(&["Workspace"])], &LockOwner::new("bob"), later)
            .unwrap();
        assert_eq!(manager.active(later).len(), 1);
    }

    #[test]
    fn release_drops_every_lock_of_the_owner() {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        let alice = LockOwner::new("alice");
        manager
            .acquire(&[path(&["Workspace"]), path(&["Lighting"])], &alice, now)
            .unwrap();
        manager.release(&alice);
        assert!(manager.active(now).is_empty());
    }

    #[test]
    fn contention_log_records_denials_newest_first() {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        manager
            .acquire(&[path(&["Workspace"])], &LockOwner::new("alice"), now)
            .unwrap();
        let _ = manager.acquire(&[path(&["Workspace"])], &LockOwner::new("bob"), now);
        let _ = manager.acquire(&[path(&["Workspace"])], &LockOwner::new("carol"), now);

        let log = manager.contention(10);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].requested_owner, LockOwner::new("carol"));
    }

    #[test]
    fn atomic_acquisition_takes_all_or_nothing() {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        manager
            .acquire(&[path(&["Lighting"])], &LockOwner::new("alice"), now)
            .unwrap();
        let denied = manager.acquire(
            &[path(&["Workspace"]), path(&["Lighting"])],
            &LockOwner::new("bob"),
            now,
        );
        assert!(denied.is_err());
        // The non-conflicting first path must not have been taken.
        let active = manager.active(now);
        assert!(active.iter().all(|lock| lock.owner == LockOwner::new("alice")));
    }
}
