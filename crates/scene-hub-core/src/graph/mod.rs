// crates/scene-hub-core/src/graph/mod.rs
// ============================================================================
// Module: Scene Hub Graph
// Description: Canonical tree, dual index, deltas, snapshots, derived cache.
// Purpose: Own every mutation of the shared scene-graph state.
// Dependencies: crate::core, crate::schema
// ============================================================================

//! ## Overview
//! The graph subsystem holds the canonical revision-tracked instance tree.
//! All writes flow through [`scene::SceneGraph`]; [`cache::DerivedCache`]
//! memoizes read projections per revision.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod delta;
pub mod index;
pub mod scene;
pub mod snapshot;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::DerivedCache;
pub use cache::InstanceView;
pub use cache::SnapshotPayload;
pub use delta::MutationRecord;
pub use delta::ObservedChange;
pub use delta::ObservedChangeKind;
pub use delta::diff_trees;
pub use index::PathIndex;
pub use scene::AppliedMutation;
pub use scene::MutationError;
pub use scene::PENDING_CONFIRM_GRACE_MS;
pub use scene::PendingChange;
pub use scene::SceneGraph;
pub use scene::TreeError;
pub use snapshot::GraphSnapshot;
