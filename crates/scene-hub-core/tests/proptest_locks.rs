// crates/scene-hub-core/tests/proptest_locks.rs
// ============================================================================
// Module: Lock Manager Property Tests
// Description: Randomized overlap and exclusion properties.
// ============================================================================
//! ## Overview
//! Property coverage for the prefix-overlap rule: overlapping requests from
//! distinct owners never both succeed, and disjoint requests never block
//! each other.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use proptest::prelude::*;
use scene_hub_core::LockManager;
use scene_hub_core::LockOwner;
use scene_hub_core::ScenePath;
use scene_hub_core::Timestamp;

// ============================================================================
// SECTION: Strategies
// ============================================================================

/// Strategy for short paths over a tiny segment alphabet, so overlaps are
/// common.
fn path_strategy() -> impl Strategy<Value = ScenePath> {
    prop::collection::vec(prop::sample::select(vec!["A", "B", "C"]), 1..4)
        .prop_map(|segments| ScenePath::new(segments.into_iter().map(String::from).collect()))
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    /// Of two overlapping requests from distinct owners, at most one wins.
    #[test]
    fn overlapping_requests_have_at_most_one_winner(
        first in path_strategy(),
        second in path_strategy(),
    ) {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        let alice = LockOwner::new("alice");
        let bob = LockOwner::new("bob");

        let first_won = manager.acquire(&[first.clone()], &alice, now).is_ok();
        let second_won = manager.acquire(&[second.clone()], &bob, now).is_ok();

        prop_assert!(first_won);
        if first.overlaps(&second) {
            prop_assert!(!second_won);
        } else {
            prop_assert!(second_won);
        }
    }

    /// Overlap is symmetric.
    #[test]
    fn overlap_is_symmetric(first in path_strategy(), second in path_strategy()) {
        prop_assert_eq!(first.overlaps(&second), second.overlaps(&first));
    }

    /// Release always frees the subtree for other owners.
    #[test]
    fn release_unblocks_other_owners(path in path_strategy()) {
        let manager = LockManager::new();
        let now = Timestamp::from_unix_millis(0);
        let alice = LockOwner::new("alice");
        let bob = LockOwner::new("bob");

        manager.acquire(&[path.clone()], &alice, now).unwrap();
        manager.release(&alice);
        prop_assert!(manager.acquire(&[path], &bob, now).is_ok());
    }
}
