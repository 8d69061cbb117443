// crates/scene-hub-core/src/graph/scene.rs
// ============================================================================
// Module: Canonical Scene Graph
// Description: Revision-tracked instance tree with one write path.
// Purpose: Apply editor pushes and agent commands under uniform invariants.
// Dependencies: crate::core, crate::graph::{delta, index, snapshot}
// ============================================================================

//! ## Overview
//! The scene graph is the single shared mutable resource of the hub. Editor
//! deltas and agent commands flow through the same [`SceneGraph::apply_record`]
//! structural path so name uniquing, cascade deletes, and index maintenance
//! behave identically for both sources; only revision accounting and the
//! pending-change ledger differ by caller.
//!
//! Revision accounting: every committed mutation bumps the revision exactly
//! once. Batch entry points (`replace_full`, `apply_delta`, transactional
//! command batches) bump once per accepted batch so observers see a single
//! revision step.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ChangeId;
use crate::core::Instance;
use crate::core::InstanceId;
use crate::core::ScenePath;
use crate::core::Timestamp;
use crate::core::WireInstance;
use crate::core::is_valid_name;
use crate::graph::delta::MutationRecord;
use crate::graph::delta::ObservedChange;
use crate::graph::delta::diff_trees;
use crate::graph::index::PathIndex;
use crate::graph::snapshot::GraphSnapshot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Grace window after confirmation before a pending change is collected.
pub const PENDING_CONFIRM_GRACE_MS: i64 = 60_000;

// ============================================================================
// SECTION: Pending Changes
// ============================================================================

/// A committed mutation not yet acknowledged by the editor plugin.
///
/// # Invariants
/// - Either unconfirmed, or confirmed and within the grace window; collected
///   afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Change identifier.
    pub id: ChangeId,
    /// The committed mutation.
    pub record: MutationRecord,
    /// Whether the plugin has acknowledged the change.
    pub confirmed: bool,
    /// Commit timestamp.
    pub committed_at: Timestamp,
    /// Acknowledgement timestamp, when confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural errors for full-tree pushes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Two wire nodes share one id.
    #[error("duplicate instance id in tree push: {0}")]
    DuplicateId(InstanceId),
    /// A node references a parent absent from the push.
    #[error("unknown parent {parent} for instance {id}")]
    UnknownParent {
        /// Referencing instance.
        id: InstanceId,
        /// Missing parent id.
        parent: InstanceId,
    },
    /// A node name is empty or contains dots.
    #[error("invalid instance name: {0:?}")]
    InvalidName(String),
}

/// Failures of command-applied mutations; each maps to a structured conflict.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    /// Target instance does not exist.
    #[error("target instance not found: {0}")]
    MissingTarget(InstanceId),
    /// Parent instance does not exist.
    #[error("parent instance not found: {0}")]
    MissingParent(InstanceId),
    /// Create carried an id that already exists.
    #[error("instance id already exists: {0}")]
    DuplicateId(InstanceId),
    /// Requested name is empty or contains dots.
    #[error("invalid instance name: {0:?}")]
    InvalidName(String),
    /// Reparent would move an instance under itself.
    #[error("reparent would create a cycle at {0}")]
    CyclicReparent(InstanceId),
}

// ============================================================================
// SECTION: Applied Mutations
// ============================================================================

/// Outcome of one structurally applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMutation {
    /// Affected instance id.
    pub id: InstanceId,
    /// Path after the mutation (the pre-delete path for deletes).
    pub path: ScenePath,
    /// The record as actually applied (names uniqued).
    pub record: MutationRecord,
}

// ============================================================================
// SECTION: Scene Graph
// ============================================================================

/// Canonical revision-tracked instance tree.
#[derive(Debug, Default)]
pub struct SceneGraph {
    /// Instance arena keyed by id.
    arena: BTreeMap<InstanceId, Instance>,
    /// Ordered root service ids.
    roots: Vec<InstanceId>,
    /// Dual path/id index.
    index: PathIndex,
    /// Monotone revision counter.
    revision: u64,
    /// Pending-change ledger in commit order.
    pending: Vec<PendingChange>,
    /// Sequence for change ids.
    pending_seq: u64,
    /// Sequence for server-assigned instance ids.
    id_seq: u64,
}

impl SceneGraph {
    /// Creates an empty scene graph at revision zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current revision.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the number of live instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.arena.len()
    }

    /// Looks up an instance by id.
    #[must_use]
    pub fn get_by_id(&self, id: &InstanceId) -> Option<&Instance> {
        self.arena.get(id)
    }

    /// Looks up an instance by path.
    #[must_use]
    pub fn get_by_path(&self, path: &ScenePath) -> Option<&Instance> {
        self.index.id_at(path).and_then(|id| self.arena.get(id))
    }

    /// Returns the current path of an id.
    #[must_use]
    pub fn path_of(&self, id: &InstanceId) -> Option<&ScenePath> {
        self.index.path_of(id)
    }

    /// Returns the id at a path.
    #[must_use]
    pub fn id_at(&self, path: &ScenePath) -> Option<&InstanceId> {
        self.index.id_at(path)
    }

    /// Returns instances in stable traversal order: parent before child,
    /// siblings in child-list order.
    #[must_use]
    pub fn indexed_instances(&self) -> Vec<&Instance> {
        let mut ordered = Vec::with_capacity(self.arena.len());
        let mut stack: Vec<&InstanceId> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.arena.get(id) {
                ordered.push(node);
                for child in node.child_ids.iter().rev() {
                    stack.push(child);
                }
            }
        }
        ordered
    }

    /// Allocates a fresh server-assigned instance id.
    pub fn next_instance_id(&mut self) -> InstanceId {
        loop {
            self.id_seq += 1;
            let candidate = InstanceId::new(format!("srv_{}", self.id_seq));
            if !self.arena.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    // ------------------------------------------------------------------
    // Full-tree pushes
    // ------------------------------------------------------------------

    /// Replaces the whole tree with a full push from the editor and returns
    /// the observed changes. The revision bumps once iff anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] when the push is structurally malformed; current
    /// state is untouched in that case.
    pub fn replace_full(
        &mut self,
        nodes: Vec<WireInstance>,
    ) -> Result<Vec<ObservedChange>, TreeError> {
        let (arena, roots) = build_arena(nodes)?;
        let index = PathIndex::rebuild(&arena, &roots);
        let changes = diff_trees(&self.arena, &self.index, &arena, &index);
        self.arena = arena;
        self.roots = roots;
        self.index = index;
        if !changes.is_empty() {
            self.revision += 1;
        }
        Ok(changes)
    }

    // ------------------------------------------------------------------
    // Delta batches from the editor
    // ------------------------------------------------------------------

    /// Applies an ordered delta batch from the editor. Records are applied
    /// independently; the revision bumps once when at least one succeeded.
    /// Editor-sourced mutations never enter the pending-change ledger.
    pub fn apply_delta(
        &mut self,
        records: &[MutationRecord],
    ) -> Vec<Result<AppliedMutation, MutationError>> {
        let mut results = Vec::with_capacity(records.len());
        let mut applied_any = false;
        for record in records {
            let result = self.apply_record(record);
            applied_any |= result.is_ok();
            results.push(result);
        }
        if applied_any {
            self.revision += 1;
        }
        results
    }

    // ------------------------------------------------------------------
    // Command path
    // ------------------------------------------------------------------

    /// Applies a single agent-issued mutation: structural apply, one revision
    /// bump, and a pending-change record for the plugin to acknowledge.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] with state untouched when the record cannot
    /// be applied.
    pub fn apply_command(
        &mut self,
        record: MutationRecord,
        now: Timestamp,
    ) -> Result<AppliedMutation, MutationError> {
        let applied = self.apply_record(&record)?;
        self.revision += 1;
        self.record_pending(applied.record.clone(), now);
        Ok(applied)
    }

    /// Bumps the revision once; transactional batches call this after
    /// applying their records without per-record bumps.
    pub fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Appends a committed mutation to the pending-change ledger.
    pub fn record_pending(&mut self, record: MutationRecord, now: Timestamp) -> ChangeId {
        self.pending_seq += 1;
        let id = ChangeId::new(format!("chg_{:08}", self.pending_seq));
        self.pending.push(PendingChange {
            id: id.clone(),
            record,
            confirmed: false,
            committed_at: now,
            confirmed_at: None,
        });
        id
    }

    /// Structurally applies one mutation record without touching revision or
    /// pending state. Shared by the editor delta path and the command path.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] with state untouched on failure.
    pub fn apply_record(
        &mut self,
        record: &MutationRecord,
    ) -> Result<AppliedMutation, MutationError> {
        match record {
            MutationRecord::Create {
                id,
                class_name,
                name,
                parent_id,
                properties,
            } => self.apply_create(id, class_name, name, parent_id.as_ref(), properties),
            MutationRecord::Update {
                id,
                property,
                value,
            } => self.apply_update(id, property, value),
            MutationRecord::Delete { id } => self.apply_delete(id),
            MutationRecord::Rename { id, name } => self.apply_rename(id, name),
            MutationRecord::Reparent { id, new_parent_id } => {
                self.apply_reparent(id, new_parent_id)
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Captures an immutable snapshot of the tree and indexes.
    #[must_use]
    pub fn create_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            revision: self.revision,
            arena: self.arena.clone(),
            roots: self.roots.clone(),
            index: self.index.clone(),
        }
    }

    /// Restores tree, indexes, and revision from a snapshot. The pending
    /// ledger is left untouched; callers roll back before recording pending
    /// changes for a failed batch.
    pub fn restore_snapshot(&mut self, snapshot: GraphSnapshot) {
        self.arena = snapshot.arena;
        self.roots = snapshot.roots;
        self.index = snapshot.index;
        self.revision = snapshot.revision;
    }

    // ------------------------------------------------------------------
    // Pending-change ledger
    // ------------------------------------------------------------------

    /// Returns unconfirmed and in-grace pending changes, collecting entries
    /// whose confirmation grace expired.
    pub fn pending_changes(&mut self, now: Timestamp) -> Vec<PendingChange> {
        self.collect_pending(now);
        self.pending.clone()
    }

    /// Marks pending changes confirmed; returns how many were newly marked.
    pub fn confirm_changes(&mut self, ids: &[ChangeId], now: Timestamp) -> usize {
        let wanted: BTreeSet<&ChangeId> = ids.iter().collect();
        let mut confirmed = 0;
        for change in &mut self.pending {
            if !change.confirmed && wanted.contains(&change.id) {
                change.confirmed = true;
                change.confirmed_at = Some(now);
                confirmed += 1;
            }
        }
        confirmed
    }

    /// Drops confirmed changes older than the grace window.
    fn collect_pending(&mut self, now: Timestamp) {
        self.pending.retain(|change| match change.confirmed_at {
            Some(confirmed_at) if change.confirmed => {
                now.millis_since(confirmed_at) <= PENDING_CONFIRM_GRACE_MS
            }
            _ => true,
        });
    }

    // ------------------------------------------------------------------
    // Structural mutations
    // ------------------------------------------------------------------

    /// Creates one instance under a parent (or as a root service).
    fn apply_create(
        &mut self,
        id: &InstanceId,
        class_name: &str,
        name: &str,
        parent_id: Option<&InstanceId>,
        properties: &BTreeMap<String, crate::core::Value>,
    ) -> Result<AppliedMutation, MutationError> {
        if self.arena.contains_key(id) {
            return Err(MutationError::DuplicateId(id.clone()));
        }
        if !is_valid_name(name) {
            return Err(MutationError::InvalidName(name.to_string()));
        }
        let parent_path = match parent_id {
            Some(parent) => Some(
                self.index
                    .path_of(parent)
                    .ok_or_else(|| MutationError::MissingParent(parent.clone()))?
                    .clone(),
            ),
            None => None,
        };
        let final_name = self.unique_sibling_name(parent_id, name, None);
        let path = parent_path
            .as_ref()
            .map_or_else(|| ScenePath::root().child(&final_name), |p| p.child(&final_name));

        self.arena.insert(
            id.clone(),
            Instance {
                id: id.clone(),
                class_name: class_name.to_string(),
                name: final_name.clone(),
                parent_id: parent_id.cloned(),
                child_ids: Vec::new(),
                properties: properties.clone(),
            },
        );
        match parent_id {
            Some(parent) => {
                if let Some(parent_node) = self.arena.get_mut(parent) {
                    parent_node.child_ids.push(id.clone());
                }
            }
            None => self.roots.push(id.clone()),
        }
        self.index.insert(path.clone(), id.clone());

        Ok(AppliedMutation {
            id: id.clone(),
            path,
            record: MutationRecord::Create {
                id: id.clone(),
                class_name: class_name.to_string(),
                name: final_name,
                parent_id: parent_id.cloned(),
                properties: properties.clone(),
            },
        })
    }

    /// Sets or clears one property.
    fn apply_update(
        &mut self,
        id: &InstanceId,
        property: &str,
        value: &crate::core::Value,
    ) -> Result<AppliedMutation, MutationError> {
        let path = self
            .index
            .path_of(id)
            .ok_or_else(|| MutationError::MissingTarget(id.clone()))?
            .clone();
        let node = self
            .arena
            .get_mut(id)
            .ok_or_else(|| MutationError::MissingTarget(id.clone()))?;
        if value.is_null() {
            node.properties.remove(property);
        } else {
            node.properties.insert(property.to_string(), value.clone());
        }
        Ok(AppliedMutation {
            id: id.clone(),
            path,
            record: MutationRecord::Update {
                id: id.clone(),
                property: property.to_string(),
                value: value.clone(),
            },
        })
    }

    /// Deletes an instance and every descendant.
    fn apply_delete(&mut self, id: &InstanceId) -> Result<AppliedMutation, MutationError> {
        let path = self
            .index
            .path_of(id)
            .ok_or_else(|| MutationError::MissingTarget(id.clone()))?
            .clone();
        let parent = self.arena.get(id).and_then(|node| node.parent_id.clone());
        for removed in self.subtree_ids(id) {
            self.arena.remove(&removed);
            self.index.remove_id(&removed);
        }
        match parent {
            Some(parent_id) => {
                if let Some(parent_node) = self.arena.get_mut(&parent_id) {
                    parent_node.child_ids.retain(|child| child != id);
                }
            }
            None => self.roots.retain(|root| root != id),
        }
        Ok(AppliedMutation {
            id: id.clone(),
            path,
            record: MutationRecord::Delete { id: id.clone() },
        })
    }

    /// Renames an instance in place, preserving its id.
    fn apply_rename(
        &mut self,
        id: &InstanceId,
        name: &str,
    ) -> Result<AppliedMutation, MutationError> {
        if !self.arena.contains_key(id) {
            return Err(MutationError::MissingTarget(id.clone()));
        }
        if !is_valid_name(name) {
            return Err(MutationError::InvalidName(name.to_string()));
        }
        let parent = self.arena.get(id).and_then(|node| node.parent_id.clone());
        let final_name = self.unique_sibling_name(parent.as_ref(), name, Some(id));
        if let Some(node) = self.arena.get_mut(id) {
            node.name = final_name.clone();
        }
        self.reindex_subtree(id);
        let path = self.index.path_of(id).cloned().unwrap_or_default();
        Ok(AppliedMutation {
            id: id.clone(),
            path,
            record: MutationRecord::Rename {
                id: id.clone(),
                name: final_name,
            },
        })
    }

    /// Moves an instance under a new parent, preserving its id.
    fn apply_reparent(
        &mut self,
        id: &InstanceId,
        new_parent_id: &InstanceId,
    ) -> Result<AppliedMutation, MutationError> {
        if !self.arena.contains_key(id) {
            return Err(MutationError::MissingTarget(id.clone()));
        }
        if !self.arena.contains_key(new_parent_id) {
            return Err(MutationError::MissingParent(new_parent_id.clone()));
        }
        if id == new_parent_id || self.subtree_ids(id).contains(new_parent_id) {
            return Err(MutationError::CyclicReparent(id.clone()));
        }

        let old_parent = self.arena.get(id).and_then(|node| node.parent_id.clone());
        match old_parent {
            Some(parent_id) => {
                if let Some(parent_node) = self.arena.get_mut(&parent_id) {
                    parent_node.child_ids.retain(|child| child != id);
                }
            }
            None => self.roots.retain(|root| root != id),
        }

        let desired = self.arena.get(id).map(|node| node.name.clone()).unwrap_or_default();
        let final_name = self.unique_sibling_name(Some(new_parent_id), &desired, Some(id));
        if let Some(node) = self.arena.get_mut(id) {
            node.parent_id = Some(new_parent_id.clone());
            node.name = final_name;
        }
        if let Some(parent_node) = self.arena.get_mut(new_parent_id) {
            parent_node.child_ids.push(id.clone());
        }
        self.reindex_subtree(id);
        let path = self.index.path_of(id).cloned().unwrap_or_default();
        Ok(AppliedMutation {
            id: id.clone(),
            path,
            record: MutationRecord::Reparent {
                id: id.clone(),
                new_parent_id: new_parent_id.clone(),
            },
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Returns the ids of an instance and all descendants, parent first.
    fn subtree_ids(&self, id: &InstanceId) -> Vec<InstanceId> {
        let mut ids = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.get(&current) {
                for child in node.child_ids.iter().rev() {
                    stack.push(child.clone());
                }
            }
            ids.push(current);
        }
        ids
    }

    /// Recomputes index paths for an instance and all descendants in one
    /// pass after a rename or reparent.
    fn reindex_subtree(&mut self, id: &InstanceId) {
        let Some(base) = self.derive_path(id) else {
            return;
        };
        let mut stack = vec![(id.clone(), base)];
        while let Some((current, path)) = stack.pop() {
            if let Some(node) = self.arena.get(&current) {
                for child in node.child_ids.iter().rev() {
                    if let Some(child_node) = self.arena.get(child) {
                        stack.push((child.clone(), path.child(&child_node.name)));
                    }
                }
            }
            self.index.insert(path.clone(), current);
        }
    }

    /// Derives an instance's path by walking parent links to the root.
    fn derive_path(&self, id: &InstanceId) -> Option<ScenePath> {
        let mut segments = Vec::new();
        let mut current = Some(id.clone());
        while let Some(node_id) = current {
            let node = self.arena.get(&node_id)?;
            segments.push(node.name.clone());
            current = node.parent_id.clone();
        }
        segments.reverse();
        Some(ScenePath::new(segments))
    }

    /// Chooses the smallest free sibling name: the desired name itself, or
    /// `desired_N` for the smallest integer N >= 2.
    fn unique_sibling_name(
        &self,
        parent: Option<&InstanceId>,
        desired: &str,
        exclude: Option<&InstanceId>,
    ) -> String {
        let sibling_ids: Vec<&InstanceId> = match parent {
            Some(parent_id) => self
                .arena
                .get(parent_id)
                .map(|node| node.child_ids.iter().collect())
                .unwrap_or_default(),
            None => self.roots.iter().collect(),
        };
        let taken: BTreeSet<&str> = sibling_ids
            .iter()
            .filter(|sibling| exclude != Some(**sibling))
            .filter_map(|sibling| self.arena.get(sibling))
            .map(|node| node.name.as_str())
            .collect();
        if !taken.contains(desired) {
            return desired.to_string();
        }
        let mut suffix: u64 = 2;
        loop {
            let candidate = format!("{desired}_{suffix}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Builds an arena and ordered roots from a flat wire push.
fn build_arena(
    nodes: Vec<WireInstance>,
) -> Result<(BTreeMap<InstanceId, Instance>, Vec<InstanceId>), TreeError> {
    let mut arena: BTreeMap<InstanceId, Instance> = BTreeMap::new();
    let mut roots: Vec<InstanceId> = Vec::new();
    let mut arrival_children: BTreeMap<InstanceId, Vec<InstanceId>> = BTreeMap::new();
    let mut explicit_children: BTreeMap<InstanceId, Vec<InstanceId>> = BTreeMap::new();

    for node in &nodes {
        if arena.contains_key(&node.id) {
            return Err(TreeError::DuplicateId(node.id.clone()));
        }
        if !is_valid_name(&node.name) {
            return Err(TreeError::InvalidName(node.name.clone()));
        }
        if let Some(children) = &node.children {
            explicit_children.insert(node.id.clone(), children.clone());
        }
        match &node.parent_id {
            Some(parent) => arrival_children
                .entry(parent.clone())
                .or_default()
                .push(node.id.clone()),
            None => roots.push(node.id.clone()),
        }
        arena.insert(
            node.id.clone(),
            Instance {
                id: node.id.clone(),
                class_name: node.class_name.clone(),
                name: node.name.clone(),
                parent_id: node.parent_id.clone(),
                child_ids: Vec::new(),
                properties: node.properties.clone(),
            },
        );
    }

    for node in &nodes {
        if let Some(parent) = &node.parent_id {
            if !arena.contains_key(parent) {
                return Err(TreeError::UnknownParent {
                    id: node.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    // Child order: the plugin's explicit list when present (filtered to
    // pushed ids), arrival order otherwise.
    let ids: Vec<InstanceId> = arena.keys().cloned().collect();
    for id in ids {
        let ordered = explicit_children.get(&id).map_or_else(
            || arrival_children.get(&id).cloned().unwrap_or_default(),
            |listed| {
                listed
                    .iter()
                    .filter(|child| arena.contains_key(*child))
                    .cloned()
                    .collect()
            },
        );
        if let Some(node) = arena.get_mut(&id) {
            node.child_ids = ordered;
        }
    }

    dedupe_sibling_names(&mut arena, &roots);
    Ok((arena, roots))
}

/// Enforces sibling-name uniqueness over a freshly built arena by applying
/// the deterministic `_N` suffix rule in traversal order.
fn dedupe_sibling_names(arena: &mut BTreeMap<InstanceId, Instance>, roots: &[InstanceId]) {
    let mut groups: Vec<Vec<InstanceId>> = vec![roots.to_vec()];
    groups.extend(arena.values().map(|node| node.child_ids.clone()));
    for group in groups {
        let mut taken: BTreeSet<String> = BTreeSet::new();
        for id in group {
            let Some(node) = arena.get(&id) else { continue };
            let desired = node.name.clone();
            let mut chosen = desired.clone();
            let mut suffix: u64 = 2;
            while taken.contains(&chosen) {
                chosen = format!("{desired}_{suffix}");
                suffix += 1;
            }
            taken.insert(chosen.clone());
            if chosen != desired {
                if let Some(node) = arena.get_mut(&id) {
                    node.name = chosen;
                }
            }
        }
    }
}
