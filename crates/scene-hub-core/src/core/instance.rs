// crates/scene-hub-core/src/core/instance.rs
// ============================================================================
// Module: Scene Hub Instances
// Description: Arena nodes of the canonical scene graph and their wire form.
// Purpose: Model instances by id with derived paths and ordered children.
// Dependencies: crate::core::{identifiers, value}, serde
// ============================================================================

//! ## Overview
//! Instances live in an arena keyed by id; parent links are ids, never
//! pointers, and paths are derived by the index. The wire form mirrors what
//! the editor plugin pushes: a flat list of nodes with parent ids and
//! ordered child id lists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::InstanceId;
use crate::core::value::Value;

// ============================================================================
// SECTION: Instance
// ============================================================================

/// A node of the canonical scene graph.
///
/// # Invariants
/// - `name` is non-empty, free of dots, and unique among siblings.
/// - `parent` refers to an existing node or is `None` for root services.
/// - `children` order is the editor's sibling order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Stable instance id.
    pub id: InstanceId,
    /// Class name.
    pub class_name: String,
    /// Sibling-unique display name.
    pub name: String,
    /// Parent instance id; `None` only for root services.
    pub parent_id: Option<InstanceId>,
    /// Ordered child ids.
    pub child_ids: Vec<InstanceId>,
    /// Property map.
    pub properties: BTreeMap<String, Value>,
}

// ============================================================================
// SECTION: Wire Form
// ============================================================================

/// One node of a full-tree push from the editor plugin.
///
/// Child order is carried by `children` when present; otherwise arrival
/// order among nodes sharing a parent is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInstance {
    /// Stable instance id.
    pub id: InstanceId,
    /// Class name.
    pub class_name: String,
    /// Display name.
    pub name: String,
    /// Parent instance id; absent for root services.
    #[serde(default)]
    pub parent_id: Option<InstanceId>,
    /// Ordered child ids, when the plugin supplies them.
    #[serde(default)]
    pub children: Option<Vec<InstanceId>>,
    /// Property map.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}
