// crates/scene-hub-core/src/interfaces/mod.rs
// ============================================================================
// Module: Scene Hub Interfaces
// Description: Host-side seams for live streaming and filesystem projection.
// Purpose: Keep post-commit side effects out of the engine core.
// Dependencies: crate::core, crate::graph
// ============================================================================

//! ## Overview
//! The command path commits under the scene-graph write guard, then invokes
//! these interfaces after the guard and the path locks drop. Implementations
//! must tolerate being called from any thread and must not call back into
//! the executor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::graph::InstanceView;
use crate::graph::MutationRecord;

// ============================================================================
// SECTION: Live Frames
// ============================================================================

/// One frame on the live-stream channel.
///
/// # Invariants
/// - Frame order matches commit order for a single connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LiveFrame {
    /// Full-state frame: on connect and after transactional batches.
    FullSync {
        /// Revision the instances reflect.
        revision: u64,
        /// Complete indexed listing.
        instances: Vec<InstanceView>,
    },
    /// Single-mutation frame emitted after each non-batch commit.
    Mutation {
        /// Revision after the commit.
        revision: u64,
        /// The committed record.
        record: MutationRecord,
    },
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Receives frames after each commit, in commit order.
pub trait LiveUpdateSink: Send + Sync {
    /// Delivers one committed frame.
    fn frame_committed(&self, frame: &LiveFrame);
}

/// Receives committed mutation records for the filesystem projection.
pub trait ProjectionSink: Send + Sync {
    /// Delivers the records of one committed command or batch.
    fn project(&self, records: &[MutationRecord]);
}

/// Live sink that drops every frame (tests and headless runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLiveSink;

impl LiveUpdateSink for NoopLiveSink {
    fn frame_committed(&self, _frame: &LiveFrame) {}
}

/// Projection sink that drops every record (tests and headless runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProjectionSink;

impl ProjectionSink for NoopProjectionSink {
    fn project(&self, _records: &[MutationRecord]) {}
}
