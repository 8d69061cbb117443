// crates/scene-hub-core/src/core/path.rs
// ============================================================================
// Module: Scene Hub Paths
// Description: Hierarchical instance paths with prefix semantics.
// Purpose: Provide the segment-path form shared by the index, locks, and API.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A scene path is an ordered list of sibling names from a root service down
//! to an instance. Paths serialize as JSON arrays; the dotted string form is
//! only a projection (dots inside names are rejected at validation, so the
//! dotted form is unambiguous).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Scene Path
// ============================================================================

/// Hierarchical path of sibling names, root first.
///
/// # Invariants
/// - Segments are non-empty and contain no `.` characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ScenePath(Vec<String>);

impl ScenePath {
    /// Creates a path from owned segments.
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Creates an empty (root-level) path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the path has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the final segment, if any.
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns the parent path, or `None` for a root-level path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Returns this path extended with one more segment.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Returns true when `self` is a prefix of (or equal to) `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Returns true when either path is a prefix of the other, the overlap
    /// rule used by the lock manager.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Returns the dotted string projection.
    #[must_use]
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl From<Vec<String>> for ScenePath {
    fn from(segments: Vec<String>) -> Self {
        Self::new(segments)
    }
}

impl From<&[&str]> for ScenePath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(ToString::to_string).collect())
    }
}

/// Returns true when a sibling name is valid: non-empty and free of dots.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.')
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::ScenePath;
    use super::is_valid_name;

    #[test]
    fn prefix_overlap_is_symmetric_on_either_prefix() {
        let parent = ScenePath::from(["Workspace"].as_slice());
        let child = ScenePath::from(["Workspace", "Door"].as_slice());
        let sibling = ScenePath::from(["Lighting"].as_slice());
        assert!(parent.overlaps(&child));
        assert!(child.overlaps(&parent));
        assert!(parent.overlaps(&parent));
        assert!(!parent.overlaps(&sibling));
    }

    #[test]
    fn dotted_projection_joins_segments() {
        let path = ScenePath::from(["ReplicatedStorage", "Gameplay"].as_slice());
        assert_eq!(path.dotted(), "ReplicatedStorage.Gameplay");
        assert_eq!(path.to_string(), "ReplicatedStorage.Gameplay");
    }

    #[test]
    fn parent_and_child_invert() {
        let path = ScenePath::from(["Workspace", "Door"].as_slice());
        assert_eq!(path.parent().unwrap().child("Door"), path);
        assert_eq!(ScenePath::root().parent(), None);
    }

    #[test]
    fn names_with_dots_are_invalid() {
        assert!(is_valid_name("Door"));
        assert!(!is_valid_name("Door.Handle"));
        assert!(!is_valid_name(""));
    }
}
