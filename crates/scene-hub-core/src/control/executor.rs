// crates/scene-hub-core/src/control/executor.rs
// ============================================================================
// Module: Command Executor
// Description: Parse, validate, lock, and mutate for single and batch flows.
// Purpose: Provide the one execution path for agent-issued mutations.
// Dependencies: crate::{core, graph, schema, control, interfaces}
// ============================================================================

//! ## Overview
//! Single flow: base-revision guard, idempotency lookup, parse, lock
//! acquisition over the computed path set, execution under the scene-graph
//! write guard, then post-commit side effects after the guard and locks
//! drop. Batches share one lock owner and execute in order; transactional
//! batches roll back to an entry snapshot and commit as a single revision
//! bump with one `full_sync` frame.
//!
//! Lock denials are never memoized: they are transient, and a retry with the
//! same idempotency key must be able to succeed once the blocking owner
//! releases. Every other finalized outcome is cached by key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde_json::Value as JsonValue;
use serde_json::json;

use crate::control::command::BatchPayload;
use crate::control::command::Command;
use crate::control::command::CommandPayload;
use crate::control::command::InstanceRef;
use crate::control::command::parse_command;
use crate::control::conflict::Conflict;
use crate::control::conflict::ConflictReason;
use crate::control::idempotency::IdempotencyCache;
use crate::control::locks::LockConflict;
use crate::control::locks::LockManager;
use crate::core::InstanceId;
use crate::core::LockOwner;
use crate::core::ScenePath;
use crate::core::Timestamp;
use crate::core::Value;
use crate::graph::DerivedCache;
use crate::graph::MutationError;
use crate::graph::MutationRecord;
use crate::graph::SceneGraph;
use crate::interfaces::LiveFrame;
use crate::interfaces::LiveUpdateSink;
use crate::interfaces::ProjectionSink;
use crate::schema::validate_property_update;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Finalized HTTP outcome of a command or batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// HTTP status.
    pub status: u16,
    /// Response body.
    pub body: JsonValue,
}

impl CommandOutcome {
    /// Builds an outcome from a conflict and an error string.
    fn conflict(reason: ConflictReason, expected: JsonValue, actual: JsonValue, error: &str) -> Self {
        Self {
            status: reason.http_status(),
            body: Conflict::new(reason, expected, actual).into_body(error),
        }
    }
}

/// One applied command, ready for side effects and response building.
struct ExecutedCommand {
    /// Affected (or created) instance id.
    id: InstanceId,
    /// Resolved path after the mutation.
    path: ScenePath,
    /// Records as actually applied, names uniqued.
    records: Vec<MutationRecord>,
    /// Revision after commit.
    revision: u64,
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// The agent control plane's one execution path.
pub struct CommandExecutor {
    /// Shared scene graph.
    graph: Arc<RwLock<SceneGraph>>,
    /// Revision-scoped derived views (schema lookups during validation).
    cache: Arc<DerivedCache>,
    /// Path lock manager.
    locks: Arc<LockManager>,
    /// Idempotent response memo.
    idempotency: Arc<IdempotencyCache>,
    /// Live-stream sink, invoked post-commit.
    live: Arc<dyn LiveUpdateSink>,
    /// Filesystem projection sink, invoked post-commit.
    projection: Arc<dyn ProjectionSink>,
    /// Sequence for per-request lock owners.
    owner_seq: AtomicU64,
}

impl CommandExecutor {
    /// Wires an executor over its collaborators.
    #[must_use]
    pub fn new(
        graph: Arc<RwLock<SceneGraph>>,
        cache: Arc<DerivedCache>,
        locks: Arc<LockManager>,
        idempotency: Arc<IdempotencyCache>,
        live: Arc<dyn LiveUpdateSink>,
        projection: Arc<dyn ProjectionSink>,
    ) -> Self {
        Self {
            graph,
            cache,
            locks,
            idempotency,
            live,
            projection,
            owner_seq: AtomicU64::new(0),
        }
    }

    /// Returns the shared scene graph handle.
    #[must_use]
    pub fn graph(&self) -> Arc<RwLock<SceneGraph>> {
        Arc::clone(&self.graph)
    }

    /// Returns the shared lock manager.
    #[must_use]
    pub fn locks(&self) -> Arc<LockManager> {
        Arc::clone(&self.locks)
    }

    // ------------------------------------------------------------------
    // Single-command flow
    // ------------------------------------------------------------------

    /// Executes one command.
    pub fn execute(
        &self,
        payload: &CommandPayload,
        header_key: Option<&str>,
        now: Timestamp,
    ) -> CommandOutcome {
        if let Some(base) = payload.base_revision {
            let current = self.read_graph().revision();
            if base != current {
                return revision_mismatch(base, current);
            }
        }

        let key = header_key
            .map(ToString::to_string)
            .or_else(|| payload.idempotency_key.clone());
        if let Some(key) = &key {
            if let Some(hit) = self.idempotency.get(key, now) {
                return CommandOutcome {
                    status: hit.status,
                    body: hit.body,
                };
            }
        }

        let command = match parse_command(payload) {
            Ok(command) => command,
            Err(error) => {
                let outcome = CommandOutcome::conflict(
                    ConflictReason::ValidationFailed,
                    json!({"op": payload.op}),
                    json!({"message": error.to_string()}),
                    "command failed validation",
                );
                return self.finalize(key, outcome, now);
            }
        };

        let lock_paths = {
            let graph = self.read_graph();
            match lock_paths_for(&graph, &command) {
                Ok(paths) => paths,
                Err(outcome) => return self.finalize(key, outcome, now),
            }
        };

        let owner = self.next_owner();
        if let Err(denied) = self.locks.acquire(&lock_paths, &owner, now) {
            // Transient; intentionally not memoized.
            return locked(&command, &denied);
        }

        let result = self.run_command(&command, now);
        self.locks.release(&owner);

        let outcome = match result {
            Ok(executed) => {
                self.notify_mutations(&executed.records, executed.revision);
                success_body(&command, &executed)
            }
            Err(outcome) => outcome,
        };
        self.finalize(key, outcome, now)
    }

    // ------------------------------------------------------------------
    // Batch flow
    // ------------------------------------------------------------------

    /// Executes a command batch, transactionally when requested.
    pub fn execute_batch(
        &self,
        payload: &BatchPayload,
        header_key: Option<&str>,
        now: Timestamp,
    ) -> CommandOutcome {
        if let Some(base) = payload.base_revision {
            let current = self.read_graph().revision();
            if base != current {
                return revision_mismatch(base, current);
            }
        }

        let key = header_key
            .map(ToString::to_string)
            .or_else(|| payload.idempotency_key.clone());
        if let Some(key) = &key {
            if let Some(hit) = self.idempotency.get(key, now) {
                return CommandOutcome {
                    status: hit.status,
                    body: hit.body,
                };
            }
        }

        let transactional = payload.transactional;
        let continue_on_error = payload.continue_on_error && !transactional;
        let owner = self.next_owner();

        let mut results: Vec<JsonValue> = Vec::with_capacity(payload.commands.len());
        let mut frames: Vec<(Vec<MutationRecord>, u64)> = Vec::new();
        let mut transactional_records: Vec<MutationRecord> = Vec::new();
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut any_locked = false;
        let mut any_not_found = false;
        let mut rolled_back = false;

        {
            let mut graph = self.write_graph();
            let mut entry_snapshot = transactional.then(|| graph.create_snapshot());

            for (index, wire) in payload.commands.iter().enumerate() {
                let failure = match self.run_batch_command(
                    &mut graph,
                    wire,
                    &owner,
                    transactional,
                    now,
                ) {
                    Ok(executed) => {
                        succeeded += 1;
                        results.push(json!({
                            "index": index,
                            "op": executed_op(wire),
                            "success": true,
                            "id": executed.id,
                            "resolvedPath": executed.path,
                            "revision": executed.revision,
                        }));
                        if transactional {
                            transactional_records.extend(executed.records);
                        } else {
                            frames.push((executed.records, executed.revision));
                        }
                        None
                    }
                    Err(outcome) => Some(outcome),
                };

                if let Some(outcome) = failure {
                    failed += 1;
                    any_locked |= outcome.status == 423;
                    any_not_found |= outcome.status == 404;
                    results.push(json!({
                        "index": index,
                        "op": executed_op(wire),
                        "success": false,
                        "conflict": outcome.body.get("conflict").cloned().unwrap_or(JsonValue::Null),
                        "error": outcome.body.get("error").cloned().unwrap_or(JsonValue::Null),
                    }));
                    if transactional {
                        if let Some(snapshot) = entry_snapshot.take() {
                            graph.restore_snapshot(snapshot);
                        }
                        rolled_back = true;
                        break;
                    }
                    if !continue_on_error {
                        break;
                    }
                }
            }

            if transactional && !rolled_back && !transactional_records.is_empty() {
                graph.bump_revision();
                for record in &transactional_records {
                    graph.record_pending(record.clone(), now);
                }
            }
        }
        self.locks.release(&owner);

        // Post-commit side effects, in commit order.
        if transactional {
            if !rolled_back && !transactional_records.is_empty() {
                self.notify_full_sync(&transactional_records);
            }
        } else {
            for (records, revision) in &frames {
                self.notify_mutations(records, *revision);
            }
        }

        let revision = self.read_graph().revision();
        let all_ok = failed == 0;
        let status = if transactional && rolled_back {
            409
        } else if any_locked {
            423
        } else if any_not_found {
            404
        } else if all_ok {
            200
        } else {
            207
        };
        let outcome = CommandOutcome {
            status,
            body: json!({
                "success": all_ok,
                "transactional": transactional,
                "rolledBack": rolled_back,
                "results": results,
                "counts": {
                    "total": payload.commands.len(),
                    "succeeded": succeeded,
                    "failed": failed,
                },
                "revision": revision,
            }),
        };
        if any_locked {
            // Lock denials are transient; do not memoize batches containing them.
            return outcome;
        }
        self.finalize(key, outcome, now)
    }

    // ------------------------------------------------------------------
    // Execution internals
    // ------------------------------------------------------------------

    /// Parses, locks, and applies one batch member under the held guard.
    fn run_batch_command(
        &self,
        graph: &mut SceneGraph,
        wire: &CommandPayload,
        owner: &LockOwner,
        transactional: bool,
        now: Timestamp,
    ) -> Result<ExecutedCommand, CommandOutcome> {
        let command = parse_command(wire).map_err(|error| {
            CommandOutcome::conflict(
                ConflictReason::ValidationFailed,
                json!({"op": wire.op}),
                json!({"message": error.to_string()}),
                "command failed validation",
            )
        })?;
        let lock_paths = lock_paths_for(graph, &command)?;
        self.locks
            .acquire(&lock_paths, owner, now)
            .map_err(|denied| locked(&command, &denied))?;
        self.apply_command_records(graph, &command, now, !transactional)
    }

    /// Applies one parsed command against the held write guard.
    fn run_command(&self, command: &Command, now: Timestamp) -> Result<ExecutedCommand, CommandOutcome> {
        let mut graph = self.write_graph();
        self.apply_command_records(&mut graph, command, now, true)
    }

    /// Resolves, validates, and applies the records of one command.
    ///
    /// With `bump` set, the command commits its own revision step and pending
    /// records; transactional batches pass `bump = false` and finalize once.
    fn apply_command_records(
        &self,
        graph: &mut SceneGraph,
        command: &Command,
        now: Timestamp,
        bump: bool,
    ) -> Result<ExecutedCommand, CommandOutcome> {
        let records = self.build_records(graph, command)?;

        let multi = records.len() > 1;
        let mut entry_snapshot = (bump && multi).then(|| graph.create_snapshot());
        let mut applied_records = Vec::with_capacity(records.len());
        let mut last: Option<(InstanceId, ScenePath)> = None;

        for record in records {
            match graph.apply_record(&record) {
                Ok(applied) => {
                    last = Some((applied.id.clone(), applied.path.clone()));
                    applied_records.push(applied.record);
                }
                Err(error) => {
                    if let Some(snapshot) = entry_snapshot.take() {
                        graph.restore_snapshot(snapshot);
                    }
                    return Err(mutation_failure(command, &error));
                }
            }
        }

        let revision = if bump {
            let revision = graph.bump_revision();
            for record in &applied_records {
                graph.record_pending(record.clone(), now);
            }
            revision
        } else {
            graph.revision()
        };

        let (id, last_path) = last.unwrap_or_else(|| (InstanceId::new(""), ScenePath::root()));
        let path = graph.path_of(&id).cloned().unwrap_or(last_path);
        Ok(ExecutedCommand {
            id,
            path,
            records: applied_records,
            revision,
        })
    }

    /// Resolves refs and validates properties, producing mutation records.
    fn build_records(
        &self,
        graph: &mut SceneGraph,
        command: &Command,
    ) -> Result<Vec<MutationRecord>, CommandOutcome> {
        match command {
            Command::Create {
                parent,
                class_name,
                name,
                properties,
            } => {
                let parent_id = resolve_id(graph, parent)
                    .ok_or_else(|| not_found(command, parent))?;
                for (property, value) in properties {
                    self.validate_initial_property(graph, class_name, property, value, command)?;
                }
                let id = graph.next_instance_id();
                Ok(vec![MutationRecord::Create {
                    id,
                    class_name: class_name.clone(),
                    name: name.clone(),
                    parent_id: Some(parent_id),
                    properties: properties.clone(),
                }])
            }
            Command::Update { target, updates } => {
                let target_id = resolve_id(graph, target)
                    .ok_or_else(|| not_found(command, target))?;
                let schemas = self.cache.schemas(graph, None);
                let mut records = Vec::with_capacity(updates.len());
                for (property, value) in updates {
                    let instance = graph
                        .get_by_id(&target_id)
                        .ok_or_else(|| not_found(command, target))?;
                    let class_schema = schemas.get(&instance.class_name);
                    if let Err(violation) =
                        validate_property_update(instance, class_schema, property, value)
                    {
                        return Err(CommandOutcome::conflict(
                            ConflictReason::ValidationFailed,
                            command.describe_refs(),
                            json!({
                                "property": violation.property,
                                "expected": violation.expected,
                                "value": violation.actual,
                            }),
                            "property update failed validation",
                        ));
                    }
                    if property == "Name" {
                        let name = value.as_str().unwrap_or_default().to_string();
                        records.push(MutationRecord::Rename {
                            id: target_id.clone(),
                            name,
                        });
                    } else {
                        records.push(MutationRecord::Update {
                            id: target_id.clone(),
                            property: property.clone(),
                            value: value.clone(),
                        });
                    }
                }
                Ok(records)
            }
            Command::Rename { target, name } => {
                let target_id = resolve_id(graph, target)
                    .ok_or_else(|| not_found(command, target))?;
                Ok(vec![MutationRecord::Rename {
                    id: target_id,
                    name: name.clone(),
                }])
            }
            Command::Delete { target } => {
                let target_id = resolve_id(graph, target)
                    .ok_or_else(|| not_found(command, target))?;
                Ok(vec![MutationRecord::Delete { id: target_id }])
            }
            Command::Reparent { target, new_parent } => {
                let target_id = resolve_id(graph, target)
                    .ok_or_else(|| not_found(command, target))?;
                let parent_id = resolve_id(graph, new_parent)
                    .ok_or_else(|| not_found(command, new_parent))?;
                Ok(vec![MutationRecord::Reparent {
                    id: target_id,
                    new_parent_id: parent_id,
                }])
            }
        }
    }

    /// Validates one initial property of a create command. The known-property
    /// rule does not apply here: creates define the instance's initial shape.
    fn validate_initial_property(
        &self,
        graph: &SceneGraph,
        class_name: &str,
        property: &str,
        value: &Value,
        command: &Command,
    ) -> Result<(), CommandOutcome> {
        let schemas = self.cache.schemas(graph, None);
        let scratch = crate::core::Instance {
            id: InstanceId::new(""),
            class_name: class_name.to_string(),
            name: "_".to_string(),
            parent_id: None,
            child_ids: Vec::new(),
            properties: [(property.to_string(), value.clone())].into_iter().collect(),
        };
        validate_property_update(&scratch, schemas.get(class_name), property, value).map_err(
            |violation| {
                CommandOutcome::conflict(
                    ConflictReason::ValidationFailed,
                    command.describe_refs(),
                    json!({
                        "property": violation.property,
                        "expected": violation.expected,
                        "value": violation.actual,
                    }),
                    "property update failed validation",
                )
            },
        )
    }

    // ------------------------------------------------------------------
    // Side effects and plumbing
    // ------------------------------------------------------------------

    /// Emits per-mutation frames and the projection callback post-commit.
    fn notify_mutations(&self, records: &[MutationRecord], revision: u64) {
        for record in records {
            self.live.frame_committed(&LiveFrame::Mutation {
                revision,
                record: record.clone(),
            });
        }
        if !records.is_empty() {
            self.projection.project(records);
        }
    }

    /// Emits one full-sync frame and the projection callback post-commit.
    fn notify_full_sync(&self, records: &[MutationRecord]) {
        let frame = {
            let graph = self.read_graph();
            LiveFrame::FullSync {
                revision: graph.revision(),
                instances: self.cache.listing(&graph).as_ref().clone(),
            }
        };
        self.live.frame_committed(&frame);
        self.projection.project(records);
    }

    /// Memoizes a finalized outcome under the request key, if any.
    fn finalize(&self, key: Option<String>, outcome: CommandOutcome, now: Timestamp) -> CommandOutcome {
        if let Some(key) = key {
            self.idempotency.set(&key, outcome.status, outcome.body.clone(), now);
        }
        outcome
    }

    /// Allocates a per-request lock owner.
    fn next_owner(&self) -> LockOwner {
        let seq = self.owner_seq.fetch_add(1, Ordering::Relaxed) + 1;
        LockOwner::new(format!("agent:{seq}"))
    }

    /// Read-locks the graph, recovering from poisoning.
    fn read_graph(&self) -> RwLockReadGuard<'_, SceneGraph> {
        match self.graph.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Write-locks the graph, recovering from poisoning.
    fn write_graph(&self) -> RwLockWriteGuard<'_, SceneGraph> {
        match self.graph.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Resolution and Lock Sets
// ============================================================================

/// Resolves a ref to an instance id under a graph guard.
fn resolve_id(graph: &SceneGraph, instance_ref: &InstanceRef) -> Option<InstanceId> {
    match instance_ref {
        InstanceRef::Id(id) => graph.get_by_id(id).map(|node| node.id.clone()),
        InstanceRef::Path(path) => graph.id_at(path).cloned(),
    }
}

/// Resolves a ref to its current path under a graph guard.
fn resolve_path(graph: &SceneGraph, instance_ref: &InstanceRef) -> Option<ScenePath> {
    match instance_ref {
        InstanceRef::Id(id) => graph.path_of(id).cloned(),
        InstanceRef::Path(path) => graph.id_at(path).map(|_| path.clone()),
    }
}

/// Computes the lock set of a command: the target path, the parent path for
/// create/reparent, and the prospective child path for name-creating ops.
fn lock_paths_for(graph: &SceneGraph, command: &Command) -> Result<Vec<ScenePath>, CommandOutcome> {
    match command {
        Command::Create { parent, name, .. } => {
            let parent_path =
                resolve_path(graph, parent).ok_or_else(|| not_found(command, parent))?;
            let prospective = parent_path.child(name);
            Ok(vec![parent_path, prospective])
        }
        Command::Update { target, .. } | Command::Delete { target } => {
            let path = resolve_path(graph, target).ok_or_else(|| not_found(command, target))?;
            Ok(vec![path])
        }
        Command::Rename { target, name } => {
            let path = resolve_path(graph, target).ok_or_else(|| not_found(command, target))?;
            let prospective = path
                .parent()
                .map_or_else(|| ScenePath::root().child(name), |parent| parent.child(name));
            Ok(vec![path, prospective])
        }
        Command::Reparent { target, new_parent } => {
            let target_path =
                resolve_path(graph, target).ok_or_else(|| not_found(command, target))?;
            let parent_path =
                resolve_path(graph, new_parent).ok_or_else(|| not_found(command, new_parent))?;
            let leaf = target_path.leaf().unwrap_or_default().to_string();
            let prospective = parent_path.child(&leaf);
            Ok(vec![target_path, parent_path, prospective])
        }
    }
}

// ============================================================================
// SECTION: Outcome Builders
// ============================================================================

/// Builds the stale-base-revision rejection.
fn revision_mismatch(base: u64, current: u64) -> CommandOutcome {
    CommandOutcome::conflict(
        ConflictReason::RevisionMismatch,
        json!({"baseRevision": base}),
        json!({"currentRevision": current}),
        "base revision does not match current revision",
    )
}

/// Builds the lock-denied rejection carrying the blocking lock metadata.
fn locked(command: &Command, denied: &LockConflict) -> CommandOutcome {
    CommandOutcome::conflict(
        ConflictReason::Locked,
        command.describe_refs(),
        json!({
            "blockingPath": denied.blocking_path,
            "blockingOwner": denied.blocking_owner,
            "expiresAt": denied.expires_at,
        }),
        "requested paths overlap an active lock",
    )
}

/// Builds the unresolved-ref rejection.
fn not_found(command: &Command, missing: &InstanceRef) -> CommandOutcome {
    CommandOutcome::conflict(
        ConflictReason::NotFound,
        command.describe_refs(),
        json!({"unresolved": missing.describe()}),
        "referenced instance was not found",
    )
}

/// Maps a structural mutation failure to its conflict outcome.
fn mutation_failure(command: &Command, error: &MutationError) -> CommandOutcome {
    match error {
        MutationError::MissingTarget(id) | MutationError::MissingParent(id) => {
            CommandOutcome::conflict(
                ConflictReason::NotFound,
                command.describe_refs(),
                json!({"missingId": id}),
                "referenced instance was not found",
            )
        }
        MutationError::DuplicateId(id) => CommandOutcome::conflict(
            ConflictReason::ValidationFailed,
            command.describe_refs(),
            json!({"duplicateId": id}),
            "instance id already exists",
        ),
        MutationError::InvalidName(name) => CommandOutcome::conflict(
            ConflictReason::ValidationFailed,
            command.describe_refs(),
            json!({"name": name}),
            "instance name must be non-empty and free of dots",
        ),
        MutationError::CyclicReparent(id) => CommandOutcome::conflict(
            ConflictReason::ValidationFailed,
            command.describe_refs(),
            json!({"cycleAt": id}),
            "reparent would create a cycle",
        ),
    }
}

/// Builds the single-command success body.
fn success_body(command: &Command, executed: &ExecutedCommand) -> CommandOutcome {
    CommandOutcome {
        status: 200,
        body: json!({
            "success": true,
            "op": command.op(),
            "id": executed.id,
            "resolvedPath": executed.path,
            "revision": executed.revision,
        }),
    }
}

/// Returns the op label of a wire payload for batch result rows.
fn executed_op(wire: &CommandPayload) -> JsonValue {
    wire.op.as_deref().map_or(JsonValue::Null, |op| json!(op))
}
