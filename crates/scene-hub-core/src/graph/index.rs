// crates/scene-hub-core/src/graph/index.rs
// ============================================================================
// Module: Scene Graph Path Index
// Description: Dual indexing of tree nodes by hierarchical path and stable id.
// Purpose: Provide O(log n) lookups both ways with a single rebuild pass.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The path index maintains the bijection between current instance paths and
//! stable ids. It is rebuilt wholesale on full-tree pushes and patched
//! incrementally by the scene graph's write path; for every id there is at
//! most one current path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::Instance;
use crate::core::InstanceId;
use crate::core::ScenePath;

// ============================================================================
// SECTION: Path Index
// ============================================================================

/// Bidirectional path/id index over the instance arena.
///
/// # Invariants
/// - `path_to_id` and `id_to_path` are exact inverses at all times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathIndex {
    /// Path to id mapping.
    path_to_id: BTreeMap<ScenePath, InstanceId>,
    /// Id to path mapping.
    id_to_path: BTreeMap<InstanceId, ScenePath>,
}

impl PathIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the index from an arena and its ordered roots.
    #[must_use]
    pub fn rebuild(arena: &BTreeMap<InstanceId, Instance>, roots: &[InstanceId]) -> Self {
        let mut index = Self::new();
        let mut stack: Vec<(InstanceId, ScenePath)> = Vec::new();
        for root in roots.iter().rev() {
            if let Some(node) = arena.get(root) {
                stack.push((root.clone(), ScenePath::root().child(&node.name)));
            }
        }
        while let Some((id, path)) = stack.pop() {
            if let Some(node) = arena.get(&id) {
                for child in node.child_ids.iter().rev() {
                    if let Some(child_node) = arena.get(child) {
                        stack.push((child.clone(), path.child(&child_node.name)));
                    }
                }
                index.insert(path, id);
            }
        }
        index
    }

    /// Inserts or replaces the mapping for one instance.
    pub fn insert(&mut self, path: ScenePath, id: InstanceId) {
        if let Some(previous) = self.id_to_path.insert(id.clone(), path.clone()) {
            self.path_to_id.remove(&previous);
        }
        self.path_to_id.insert(path, id);
    }

    /// Removes the mapping for one instance by id.
    pub fn remove_id(&mut self, id: &InstanceId) {
        if let Some(path) = self.id_to_path.remove(id) {
            self.path_to_id.remove(&path);
        }
    }

    /// Returns the id at a path, if any.
    #[must_use]
    pub fn id_at(&self, path: &ScenePath) -> Option<&InstanceId> {
        self.path_to_id.get(path)
    }

    /// Returns the current path of an id, if any.
    #[must_use]
    pub fn path_of(&self, id: &InstanceId) -> Option<&ScenePath> {
        self.id_to_path.get(id)
    }

    /// Returns the number of indexed instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_path.len()
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_path.is_empty()
    }

    /// Iterates `(path, id)` pairs in path order.
    pub fn paths(&self) -> impl Iterator<Item = (&ScenePath, &InstanceId)> {
        self.path_to_id.iter()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::collections::BTreeMap;

    use crate::core::Instance;
    use crate::core::InstanceId;
    use crate::core::ScenePath;

    use super::PathIndex;

    /// Builds a tiny arena: Workspace -> Door.
    fn arena() -> (BTreeMap<InstanceId, Instance>, Vec<InstanceId>) {
        let ws = InstanceId::new("ws");
        let door = InstanceId::new("door");
        let mut arena = BTreeMap::new();
        arena.insert(
            ws.clone(),
            Instance {
                id: ws.clone(),
                class_name: "Workspace".to_string(),
                name: "Workspace".to_string(),
                parent_id: None,
                child_ids: vec![door.clone()],
                properties: BTreeMap::new(),
            },
        );
        arena.insert(
            door.clone(),
            Instance {
                id: door.clone(),
                class_name: "Model".to_string(),
                name: "Door".to_string(),
                parent_id: Some(ws.clone()),
                child_ids: Vec::new(),
                properties: BTreeMap::new(),
            },
        );
        (arena, vec![ws])
    }

    #[test]
    fn rebuild_indexes_every_reachable_node() {
        let (arena, roots) = arena();
        let index = PathIndex::rebuild(&arena, &roots);
        assert_eq!(index.len(), 2);
        let door_path = ScenePath::from(["Workspace", "Door"].as_slice());
        assert_eq!(index.id_at(&door_path).unwrap().as_str(), "door");
        assert_eq!(index.path_of(&InstanceId::new("door")).unwrap(), &door_path);
    }

    #[test]
    fn insert_replaces_stale_paths_for_the_same_id() {
        let mut index = PathIndex::new();
        let id = InstanceId::new("door");
        let old_path = ScenePath::from(["Workspace", "Door"].as_slice());
        let new_path = ScenePath::from(["Workspace", "Door_2"].as_slice());
        index.insert(old_path.clone(), id.clone());
        index.insert(new_path.clone(), id.clone());
        assert_eq!(index.id_at(&old_path), None);
        assert_eq!(index.path_of(&id).unwrap(), &new_path);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_id_drops_both_directions() {
        let (arena, roots) = arena();
        let mut index = PathIndex::rebuild(&arena, &roots);
        index.remove_id(&InstanceId::new("door"));
        assert_eq!(index.len(), 1);
        assert!(index.id_at(&ScenePath::from(["Workspace", "Door"].as_slice())).is_none());
    }
}
