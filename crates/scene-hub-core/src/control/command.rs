// crates/scene-hub-core/src/control/command.rs
// ============================================================================
// Module: Command Parsing
// Description: Wire payloads and the typed command union for the agent path.
// Purpose: Turn untrusted JSON into validated commands with uniform ref rules.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! The agent wire format is permissive (id-or-path refs, single property or
//! property map); parsing normalizes it into the closed [`Command`] union
//! before anything touches the scene graph. Parse failures name the missing
//! or contradictory field so the caller can self-correct.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::json;
use thiserror::Error;

use crate::core::InstanceId;
use crate::core::ScenePath;
use crate::core::Value;

// ============================================================================
// SECTION: Instance Refs
// ============================================================================

/// Reference to an instance, by id or by array path. Both forms share the
/// same resolution rules everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceRef {
    /// By stable id.
    Id(InstanceId),
    /// By path segments, root first.
    Path(ScenePath),
}

impl InstanceRef {
    /// Renders the ref for `expected` diagnostic blocks.
    #[must_use]
    pub fn describe(&self) -> JsonValue {
        match self {
            Self::Id(id) => json!({"id": id}),
            Self::Path(path) => json!({"path": path}),
        }
    }
}

// ============================================================================
// SECTION: Wire Payloads
// ============================================================================

/// Wire form of one agent command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandPayload {
    /// Operation name: `create`, `update`, `rename`, `delete`, `reparent`.
    pub op: Option<String>,
    /// Target ref by id.
    pub target_id: Option<InstanceId>,
    /// Target ref by path.
    pub target_path: Option<Vec<String>>,
    /// Parent ref by id (create and reparent).
    pub parent_id: Option<InstanceId>,
    /// Parent ref by path (create and reparent).
    pub parent_path: Option<Vec<String>>,
    /// Class name for create.
    pub class_name: Option<String>,
    /// Name for create and rename.
    pub name: Option<String>,
    /// Single property name for update.
    pub property: Option<String>,
    /// Single property value for update.
    pub value: Option<Value>,
    /// Property map for create and update.
    pub properties: Option<BTreeMap<String, Value>>,
    /// Optimistic-concurrency guard.
    pub base_revision: Option<u64>,
    /// Idempotency key (body form; the header form wins when both appear).
    pub idempotency_key: Option<String>,
}

/// Wire form of a batch request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchPayload {
    /// Commands in execution order.
    pub commands: Vec<CommandPayload>,
    /// All-or-nothing execution with snapshot rollback.
    pub transactional: bool,
    /// Keep executing after a failed command (forced off when transactional).
    pub continue_on_error: bool,
    /// Optimistic-concurrency guard for the whole batch.
    pub base_revision: Option<u64>,
    /// Idempotency key (body form).
    pub idempotency_key: Option<String>,
}

// ============================================================================
// SECTION: Typed Commands
// ============================================================================

/// The closed command union executed by the control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create an instance under a parent.
    Create {
        /// Parent ref.
        parent: InstanceRef,
        /// Class name.
        class_name: String,
        /// Requested name.
        name: String,
        /// Initial properties.
        properties: BTreeMap<String, Value>,
    },
    /// Set one or more properties on a target.
    Update {
        /// Target ref.
        target: InstanceRef,
        /// Property updates in name order.
        updates: BTreeMap<String, Value>,
    },
    /// Rename a target in place.
    Rename {
        /// Target ref.
        target: InstanceRef,
        /// Requested name.
        name: String,
    },
    /// Delete a target and its descendants.
    Delete {
        /// Target ref.
        target: InstanceRef,
    },
    /// Move a target under a new parent.
    Reparent {
        /// Target ref.
        target: InstanceRef,
        /// New parent ref.
        new_parent: InstanceRef,
    },
}

impl Command {
    /// Returns the operation label.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::Reparent { .. } => "reparent",
        }
    }

    /// Renders the refs the command supplied for `expected` blocks.
    #[must_use]
    pub fn describe_refs(&self) -> JsonValue {
        match self {
            Self::Create {
                parent,
                class_name,
                name,
                ..
            } => json!({
                "op": "create",
                "parent": parent.describe(),
                "className": class_name,
                "name": name,
            }),
            Self::Update { target, updates } => json!({
                "op": "update",
                "target": target.describe(),
                "properties": updates.keys().collect::<Vec<_>>(),
            }),
            Self::Rename { target, name } => json!({
                "op": "rename",
                "target": target.describe(),
                "name": name,
            }),
            Self::Delete { target } => json!({
                "op": "delete",
                "target": target.describe(),
            }),
            Self::Reparent { target, new_parent } => json!({
                "op": "reparent",
                "target": target.describe(),
                "newParent": new_parent.describe(),
            }),
        }
    }
}

// ============================================================================
// SECTION: Parse Errors
// ============================================================================

/// Command parse failures; all map to `validation_failed`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    /// Missing or unrecognized op.
    #[error("unknown or missing op: {0:?}")]
    UnknownOp(Option<String>),
    /// A required ref is absent.
    #[error("missing {0} ref")]
    MissingRef(&'static str),
    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),
    /// Update carried neither a property pair nor a property map.
    #[error("update requires property+value or a properties map")]
    EmptyUpdate,
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses the wire payload into a typed command.
///
/// # Errors
///
/// Returns [`CommandParseError`] naming the offending field.
pub fn parse_command(payload: &CommandPayload) -> Result<Command, CommandParseError> {
    let op = payload
        .op
        .as_deref()
        .ok_or_else(|| CommandParseError::UnknownOp(None))?;
    match op {
        "create" => parse_create(payload),
        "update" => parse_update(payload),
        "rename" => Ok(Command::Rename {
            target: target_ref(payload)?,
            name: require_field(payload.name.clone(), "name")?,
        }),
        "delete" => Ok(Command::Delete {
            target: target_ref(payload)?,
        }),
        "reparent" => Ok(Command::Reparent {
            target: target_ref(payload)?,
            new_parent: parent_ref(payload)?,
        }),
        other => Err(CommandParseError::UnknownOp(Some(other.to_string()))),
    }
}

/// Parses a create command.
fn parse_create(payload: &CommandPayload) -> Result<Command, CommandParseError> {
    Ok(Command::Create {
        parent: parent_ref(payload)?,
        class_name: require_field(payload.class_name.clone(), "className")?,
        name: require_field(payload.name.clone(), "name")?,
        properties: payload.properties.clone().unwrap_or_default(),
    })
}

/// Parses an update command, merging the single pair with the map form.
fn parse_update(payload: &CommandPayload) -> Result<Command, CommandParseError> {
    let mut updates = payload.properties.clone().unwrap_or_default();
    if let Some(property) = &payload.property {
        let value = payload.value.clone().unwrap_or(Value::null());
        updates.insert(property.clone(), value);
    }
    if updates.is_empty() {
        return Err(CommandParseError::EmptyUpdate);
    }
    Ok(Command::Update {
        target: target_ref(payload)?,
        updates,
    })
}

/// Extracts the target ref; the id form wins when both appear.
fn target_ref(payload: &CommandPayload) -> Result<InstanceRef, CommandParseError> {
    ref_from(payload.target_id.clone(), payload.target_path.clone())
        .ok_or(CommandParseError::MissingRef("target"))
}

/// Extracts the parent ref; the id form wins when both appear.
fn parent_ref(payload: &CommandPayload) -> Result<InstanceRef, CommandParseError> {
    ref_from(payload.parent_id.clone(), payload.parent_path.clone())
        .ok_or(CommandParseError::MissingRef("parent"))
}

/// Builds a ref from optional id and path forms.
fn ref_from(id: Option<InstanceId>, path: Option<Vec<String>>) -> Option<InstanceRef> {
    id.map(InstanceRef::Id)
        .or_else(|| path.map(|segments| InstanceRef::Path(ScenePath::new(segments))))
}

/// Requires a field to be present.
fn require_field<T>(value: Option<T>, field: &'static str) -> Result<T, CommandParseError> {
    value.ok_or(CommandParseError::MissingField(field))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::Command;
    use super::CommandParseError;
    use super::CommandPayload;
    use super::InstanceRef;
    use super::parse_command;

    /// Parses a JSON literal into the wire payload.
    fn payload(body: serde_json::Value) -> CommandPayload {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn create_parses_with_path_parent() {
        let command = parse_command(&payload(json!({
            "op": "create",
            "parentPath": ["ReplicatedStorage"],
            "className": "Folder",
            "name": "Gameplay",
        })))
        .unwrap();
        match command {
            Command::Create {
                parent,
                class_name,
                name,
                ..
            } => {
                assert!(matches!(parent, InstanceRef::Path(_)));
                assert_eq!(class_name, "Folder");
                assert_eq!(name, "Gameplay");
            }
            other => unreachable!("parsed {other:?}"),
        }
    }

    #[test]
    fn update_merges_pair_and_map_forms() {
        let command = parse_command(&payload(json!({
            "op": "update",
            "targetId": "door",
            "property": "Transparency",
            "value": 0.5,
            "properties": {"Reflectance": 0.1},
        })))
        .unwrap();
        match command {
            Command::Update { updates, .. } => {
                assert_eq!(updates.len(), 2);
                assert!(updates.contains_key("Transparency"));
                assert!(updates.contains_key("Reflectance"));
            }
            other => unreachable!("parsed {other:?}"),
        }
    }

    #[test]
    fn update_without_payload_is_rejected() {
        let error = parse_command(&payload(json!({
            "op": "update",
            "targetId": "door",
        })))
        .unwrap_err();
        assert_eq!(error, CommandParseError::EmptyUpdate);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let error = parse_command(&payload(json!({"op": "destroy"}))).unwrap_err();
        assert_eq!(error, CommandParseError::UnknownOp(Some("destroy".to_string())));
    }

    #[test]
    fn missing_target_is_named() {
        let error = parse_command(&payload(json!({"op": "delete"}))).unwrap_err();
        assert_eq!(error, CommandParseError::MissingRef("target"));
    }
}
