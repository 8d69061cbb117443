// crates/scene-hub-core/src/graph/delta.rs
// ============================================================================
// Module: Scene Graph Deltas
// Description: Mutation records and full-tree delta detection.
// Purpose: Provide the single mutation vocabulary shared by editor pushes,
//          agent commands, pending changes, and live-stream frames.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! All write traffic is expressed as [`MutationRecord`] values, whether it
//! arrives from the editor delta endpoint, the agent command path, or is
//! replayed to the plugin as a pending change. Full-tree pushes are reduced
//! to observed create/update/delete changes by [`diff_trees`]; a rename is
//! observable as delete+create with differing paths but the same id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::Instance;
use crate::core::InstanceId;
use crate::core::ScenePath;
use crate::core::Value;
use crate::graph::index::PathIndex;

// ============================================================================
// SECTION: Mutation Records
// ============================================================================

/// One observable scene-graph mutation.
///
/// # Invariants
/// - Variant tags and field names are stable wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MutationRecord {
    /// Create a new instance under a parent.
    Create {
        /// New instance id.
        id: InstanceId,
        /// Class name.
        class_name: String,
        /// Requested display name (uniqued against siblings on apply).
        name: String,
        /// Parent id; absent for root services.
        parent_id: Option<InstanceId>,
        /// Initial property map.
        #[serde(default)]
        properties: BTreeMap<String, Value>,
    },
    /// Set one property; a null value clears the property.
    Update {
        /// Target instance id.
        id: InstanceId,
        /// Property name.
        property: String,
        /// New value; null clears.
        value: Value,
    },
    /// Delete an instance and its descendants.
    Delete {
        /// Target instance id.
        id: InstanceId,
    },
    /// Rename an instance in place.
    Rename {
        /// Target instance id.
        id: InstanceId,
        /// Requested display name (uniqued against siblings on apply).
        name: String,
    },
    /// Move an instance under a new parent.
    Reparent {
        /// Target instance id.
        id: InstanceId,
        /// New parent id.
        new_parent_id: InstanceId,
    },
}

impl MutationRecord {
    /// Returns the id of the instance the record targets or creates.
    #[must_use]
    pub const fn target_id(&self) -> &InstanceId {
        match self {
            Self::Create { id, .. }
            | Self::Update { id, .. }
            | Self::Delete { id }
            | Self::Rename { id, .. }
            | Self::Reparent { id, .. } => id,
        }
    }

    /// Returns a stable label for the record type.
    #[must_use]
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Rename { .. } => "rename",
            Self::Reparent { .. } => "reparent",
        }
    }
}

// ============================================================================
// SECTION: Observed Changes
// ============================================================================

/// Kind of change observed by full-tree delta detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedChangeKind {
    /// Path present only in the new tree.
    Created,
    /// Property value differs at an existing path.
    Updated,
    /// Path present only in the old tree.
    Deleted,
}

/// One change observed while diffing a full-tree push against current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedChange {
    /// Change kind.
    pub kind: ObservedChangeKind,
    /// Path of the affected instance.
    pub path: ScenePath,
    /// Id of the affected instance.
    pub id: InstanceId,
    /// Property name for updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// New value for updates; null when the property vanished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

// ============================================================================
// SECTION: Delta Detection
// ============================================================================

/// Diffs two indexed trees and emits observed changes.
///
/// Creates are emitted for paths absent from the old index, deletes for
/// paths absent from the new index, and one update per property whose value
/// deep-compares differently; a property missing from the new state surfaces
/// as an update to null. Paths shared by both trees but occupied by a
/// different id are emitted as delete+create.
#[must_use]
pub fn diff_trees(
    old_arena: &BTreeMap<InstanceId, Instance>,
    old_index: &PathIndex,
    new_arena: &BTreeMap<InstanceId, Instance>,
    new_index: &PathIndex,
) -> Vec<ObservedChange> {
    let mut changes = Vec::new();

    for (path, old_id) in old_index.paths() {
        let replaced = new_index.id_at(path).is_some_and(|new_id| new_id != old_id);
        if new_index.id_at(path).is_none() || replaced {
            changes.push(ObservedChange {
                kind: ObservedChangeKind::Deleted,
                path: path.clone(),
                id: old_id.clone(),
                property: None,
                value: None,
            });
        }
    }

    for (path, new_id) in new_index.paths() {
        let Some(new_node) = new_arena.get(new_id) else {
            continue;
        };
        let old_id = old_index.id_at(path);
        let survived = old_id.is_some_and(|id| id == new_id);
        if survived {
            if let Some(old_node) = old_id.and_then(|id| old_arena.get(id)) {
                diff_properties(old_node, new_node, path, &mut changes);
            }
        } else {
            changes.push(ObservedChange {
                kind: ObservedChangeKind::Created,
                path: path.clone(),
                id: new_id.clone(),
                property: None,
                value: None,
            });
        }
    }

    changes
}

/// Emits one update per property whose value differs between two nodes.
fn diff_properties(
    old_node: &Instance,
    new_node: &Instance,
    path: &ScenePath,
    changes: &mut Vec<ObservedChange>,
) {
    for (name, old_value) in &old_node.properties {
        match new_node.properties.get(name) {
            Some(new_value) if new_value == old_value => {}
            Some(new_value) => changes.push(property_update(path, new_node, name, new_value.clone())),
            None => changes.push(property_update(path, new_node, name, Value::null())),
        }
    }
    for (name, new_value) in &new_node.properties {
        if !old_node.properties.contains_key(name) {
            changes.push(property_update(path, new_node, name, new_value.clone()));
        }
    }
}

/// Builds one observed property update.
fn property_update(
    path: &ScenePath,
    node: &Instance,
    property: &str,
    value: Value,
) -> ObservedChange {
    ObservedChange {
        kind: ObservedChangeKind::Updated,
        path: path.clone(),
        id: node.id.clone(),
        property: Some(property.to_string()),
        value: Some(value),
    }
}
