// crates/scene-hub-core/src/lib.rs
// ============================================================================
// Module: Scene Hub Core Library
// Description: Public API surface for the Scene Hub core.
// Purpose: Expose the scene graph, schema, control plane, and interfaces.
// Dependencies: crate::{core, graph, schema, control, interfaces}
// ============================================================================

//! ## Overview
//! Scene Hub core provides the canonical revision-tracked scene graph, the
//! derived-view cache, schema inference, and the agent control plane. It is
//! transport-agnostic and integrates with hosts through explicit interfaces
//! rather than embedding into a server framework.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod control;
pub mod core;
pub mod graph;
pub mod interfaces;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use control::ActiveLock;
pub use control::BatchPayload;
pub use control::CommandExecutor;
pub use control::CommandOutcome;
pub use control::CommandPayload;
pub use control::Conflict;
pub use control::ConflictReason;
pub use control::ContentionRecord;
pub use control::IdempotencyCache;
pub use control::InstanceRef;
pub use control::LockConflict;
pub use control::LockManager;
pub use graph::DerivedCache;
pub use graph::GraphSnapshot;
pub use graph::InstanceView;
pub use graph::MutationError;
pub use graph::MutationRecord;
pub use graph::ObservedChange;
pub use graph::ObservedChangeKind;
pub use graph::PendingChange;
pub use graph::SceneGraph;
pub use graph::SnapshotPayload;
pub use graph::TreeError;
pub use interfaces::LiveFrame;
pub use interfaces::LiveUpdateSink;
pub use interfaces::NoopLiveSink;
pub use interfaces::NoopProjectionSink;
pub use interfaces::ProjectionSink;
pub use schema::ClassSchema;
pub use schema::PropertySchema;
pub use schema::PropertyViolation;
pub use schema::infer_class_schemas;
pub use schema::validate_property_update;
