// crates/scene-hub-core/src/control/mod.rs
// ============================================================================
// Module: Agent Control Plane
// Description: Locks, idempotency, command parsing, conflicts, and execution.
// Purpose: Own the optimistic-concurrency command path over the scene graph.
// Dependencies: crate::{core, graph, schema, interfaces}
// ============================================================================

//! ## Overview
//! The control plane turns untrusted agent JSON into validated, lock-guarded
//! scene-graph mutations with structured conflicts and idempotent retries.
//! [`executor::CommandExecutor`] is the single execution path; the other
//! modules are its collaborators.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod command;
pub mod conflict;
pub mod executor;
pub mod idempotency;
pub mod locks;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use command::BatchPayload;
pub use command::Command;
pub use command::CommandParseError;
pub use command::CommandPayload;
pub use command::InstanceRef;
pub use command::parse_command;
pub use conflict::Conflict;
pub use conflict::ConflictReason;
pub use executor::CommandExecutor;
pub use executor::CommandOutcome;
pub use idempotency::CachedOutcome;
pub use idempotency::DEFAULT_IDEMPOTENCY_CAP;
pub use idempotency::DEFAULT_IDEMPOTENCY_TTL_MS;
pub use idempotency::IdempotencyCache;
pub use locks::ActiveLock;
pub use locks::ContentionRecord;
pub use locks::DEFAULT_CONTENTION_LOG_CAP;
pub use locks::DEFAULT_LOCK_TTL_MS;
pub use locks::LockConflict;
pub use locks::LockManager;
