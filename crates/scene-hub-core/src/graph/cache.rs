// crates/scene-hub-core/src/graph/cache.rs
// ============================================================================
// Module: Derived View Cache
// Description: Revision-scoped memoization of listings, snapshots, and schemas.
// Purpose: Compute each derived product at most once per revision.
// Dependencies: crate::core, crate::graph, crate::schema
// ============================================================================

//! ## Overview
//! Derived products are keyed by `(revision, optional class filter)`. When
//! the cache observes a new revision it drops every entry and rebuilds
//! lazily on demand; the internal mutex makes the at-most-once guarantee
//! hold for concurrent readers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;

use crate::core::InstanceId;
use crate::core::ScenePath;
use crate::core::Value;
use crate::graph::scene::SceneGraph;
use crate::schema::ClassSchema;
use crate::schema::infer_class_schemas;

// ============================================================================
// SECTION: Payload Types
// ============================================================================

/// One instance projected for agent consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    /// Stable instance id.
    pub id: InstanceId,
    /// Class name.
    pub class_name: String,
    /// Display name.
    pub name: String,
    /// Path segments, root first.
    pub path: ScenePath,
    /// Dotted path projection.
    pub path_string: String,
    /// Parent id; absent for root services.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<InstanceId>,
    /// Ordered child ids.
    pub child_ids: Vec<InstanceId>,
    /// Property map.
    pub properties: BTreeMap<String, Value>,
}

/// Snapshot payload served to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    /// Revision the payload reflects.
    pub revision: u64,
    /// Instances in stable traversal order.
    pub instances: Vec<InstanceView>,
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cached products for one revision.
#[derive(Debug, Default)]
struct CacheSlot {
    /// Revision the slot reflects.
    revision: u64,
    /// Flat ordered listing.
    listing: Option<Arc<Vec<InstanceView>>>,
    /// Snapshot payload.
    snapshot: Option<Arc<SnapshotPayload>>,
    /// Inferred schemas keyed by class filter (empty key = all classes).
    schemas: BTreeMap<String, Arc<BTreeMap<String, ClassSchema>>>,
}

/// Revision-scoped memo of derived views.
#[derive(Debug, Default)]
pub struct DerivedCache {
    /// Guarded slot; replaced wholesale when the revision moves.
    slot: Mutex<CacheSlot>,
}

impl DerivedCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the flat ordered instance listing for the graph's current
    /// revision, computing it at most once.
    pub fn listing(&self, graph: &SceneGraph) -> Arc<Vec<InstanceView>> {
        let mut slot = self.lock_for(graph.revision());
        if let Some(listing) = &slot.listing {
            return Arc::clone(listing);
        }
        let listing = Arc::new(build_listing(graph));
        slot.listing = Some(Arc::clone(&listing));
        listing
    }

    /// Returns the snapshot payload for the graph's current revision.
    pub fn snapshot(&self, graph: &SceneGraph) -> Arc<SnapshotPayload> {
        let listing = self.listing(graph);
        let mut slot = self.lock_for(graph.revision());
        if let Some(snapshot) = &slot.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(SnapshotPayload {
            revision: graph.revision(),
            instances: listing.as_ref().clone(),
        });
        slot.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Returns inferred class schemas for the graph's current revision,
    /// optionally filtered to one class.
    pub fn schemas(
        &self,
        graph: &SceneGraph,
        class_filter: Option<&str>,
    ) -> Arc<BTreeMap<String, ClassSchema>> {
        let key = class_filter.unwrap_or_default().to_string();
        let mut slot = self.lock_for(graph.revision());
        if let Some(schemas) = slot.schemas.get(&key) {
            return Arc::clone(schemas);
        }
        let schemas = Arc::new(infer_class_schemas(graph.indexed_instances(), class_filter));
        slot.schemas.insert(key, Arc::clone(&schemas));
        schemas
    }

    /// Locks the slot, dropping every entry when the revision moved.
    fn lock_for(&self, revision: u64) -> std::sync::MutexGuard<'_, CacheSlot> {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.revision != revision {
            *slot = CacheSlot {
                revision,
                ..CacheSlot::default()
            };
        }
        slot
    }
}

/// Builds the flat ordered listing from the graph.
fn build_listing(graph: &SceneGraph) -> Vec<InstanceView> {
    graph
        .indexed_instances()
        .into_iter()
        .map(|instance| {
            let path = graph.path_of(&instance.id).cloned().unwrap_or_default();
            InstanceView {
                id: instance.id.clone(),
                class_name: instance.class_name.clone(),
                name: instance.name.clone(),
                path_string: path.dotted(),
                path,
                parent_id: instance.parent_id.clone(),
                child_ids: instance.child_ids.clone(),
                properties: instance.properties.clone(),
            }
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::core::InstanceId;
    use crate::core::Timestamp;
    use crate::core::WireInstance;
    use crate::graph::delta::MutationRecord;
    use crate::graph::scene::SceneGraph;

    use super::DerivedCache;

    /// Builds a two-node graph: Workspace -> Door.
    fn graph() -> SceneGraph {
        let mut graph = SceneGraph::new();
        let nodes = vec![
            WireInstance {
                id: InstanceId::new("ws"),
                class_name: "Workspace".to_string(),
                name: "Workspace".to_string(),
                parent_id: None,
                children: None,
                properties: BTreeMap::new(),
            },
            WireInstance {
                id: InstanceId::new("door"),
                class_name: "Model".to_string(),
                name: "Door".to_string(),
                parent_id: Some(InstanceId::new("ws")),
                children: None,
                properties: BTreeMap::new(),
            },
        ];
        graph.replace_full(nodes).unwrap();
        graph
    }

    #[test]
    fn listing_is_memoized_per_revision() {
        let graph = graph();
        let cache = DerivedCache::new();
        let first = cache.listing(&graph);
        let second = cache.listing(&graph);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn revision_change_invalidates_all_products() {
        let mut graph = graph();
        let cache = DerivedCache::new();
        let before = cache.snapshot(&graph);
        graph
            .apply_command(
                MutationRecord::Update {
                    id: InstanceId::new("door"),
                    property: "Transparency".to_string(),
                    value: crate::core::Value::Primitive(crate::core::Primitive::Number(0.5)),
                },
                Timestamp::from_unix_millis(0),
            )
            .unwrap();
        let after = cache.snapshot(&graph);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.revision, graph.revision());
    }

    #[test]
    fn path_string_is_dot_joined() {
        let graph = graph();
        let cache = DerivedCache::new();
        let listing = cache.listing(&graph);
        let door = listing.iter().find(|view| view.name == "Door").unwrap();
        assert_eq!(door.path_string, "Workspace.Door");
    }

    #[test]
    fn schema_filter_keys_are_independent() {
        let graph = graph();
        let cache = DerivedCache::new();
        let all = cache.schemas(&graph, None);
        let filtered = cache.schemas(&graph, Some("Model"));
        assert_eq!(all.len(), 2);
        assert_eq!(filtered.len(), 1);
    }
}
