// crates/scene-hub-core/src/core/value.rs
// ============================================================================
// Module: Scene Hub Value Model
// Description: Tagged property values with structural equality and type tags.
// Purpose: Replace untyped property maps with a closed, serializable union.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every instance property is one of a closed set of value shapes: a JSON
//! primitive, one of the editor's fixed struct types, an enum item, an
//! instance reference, or an opaque unsupported marker. Primitives serialize
//! as bare JSON scalars; composite shapes serialize as tagged objects so the
//! wire form is self-describing.
//!
//! Non-finite numbers never enter the model: [`Value::ensure_finite`] runs at
//! every ingestion boundary, so structural equality is plain field equality.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::InstanceId;

// ============================================================================
// SECTION: Value Union
// ============================================================================

/// A property value in the scene graph.
///
/// Deserialization tries composite shapes before primitives so that tagged
/// objects are never mistaken for plain maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Fixed editor struct shape (vectors, colors, dimensions, ...).
    Struct(StructValue),
    /// Enum item with type name, numeric value, and symbolic name.
    Enum(EnumValue),
    /// Reference to another instance by id or path.
    Reference(ReferenceValue),
    /// Opaque value the hub cannot represent; read-only.
    Unsupported(UnsupportedValue),
    /// JSON primitive: string, finite number, boolean, or null.
    Primitive(Primitive),
}

/// JSON primitive values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    /// JSON null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Finite double-precision number.
    Number(f64),
    /// UTF-8 string.
    String(String),
}

/// Fixed struct shapes supported by the editor wire contract.
///
/// # Invariants
/// - Tags are stable for serialization and schema inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape")]
pub enum StructValue {
    /// 2D vector.
    Vector2 {
        /// X component.
        x: f64,
        /// Y component.
        y: f64,
    },
    /// 3D vector.
    Vector3 {
        /// X component.
        x: f64,
        /// Y component.
        y: f64,
        /// Z component.
        z: f64,
    },
    /// Coordinate frame: position plus row-major 3x3 rotation matrix.
    CFrame {
        /// Position components.
        position: [f64; 3],
        /// Row-major rotation matrix components.
        rotation: [f64; 9],
    },
    /// RGB color triplet with components in `[0, 1]`.
    Color3 {
        /// Red component.
        r: f64,
        /// Green component.
        g: f64,
        /// Blue component.
        b: f64,
    },
    /// 1D UI dimension.
    UDim {
        /// Relative scale component.
        scale: f64,
        /// Absolute pixel offset component.
        offset: i64,
    },
    /// 2D UI dimension.
    UDim2 {
        /// Horizontal dimension.
        x: UDimComponent,
        /// Vertical dimension.
        y: UDimComponent,
    },
    /// Palette color: catalog number plus display name.
    BrickColor {
        /// Palette catalog number.
        number: u32,
        /// Display name.
        name: String,
    },
    /// Closed numeric range.
    NumberRange {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Axis-aligned rectangle.
    Rect {
        /// Minimum corner.
        min: Point2,
        /// Maximum corner.
        max: Point2,
    },
}

/// One axis of a [`StructValue::UDim2`] dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UDimComponent {
    /// Relative scale component.
    pub scale: f64,
    /// Absolute pixel offset component.
    pub offset: i64,
}

/// A 2D point used by rectangle shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// Enum item value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    /// Enum type name (for example `Material`).
    pub enum_type: String,
    /// Numeric enum value.
    pub value: u32,
    /// Symbolic item name.
    pub name: String,
}

/// Reference to another instance, by id or by path segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceValue {
    /// Reference by stable instance id.
    ById {
        /// Target instance id.
        #[serde(rename = "refId")]
        ref_id: InstanceId,
    },
    /// Reference by hierarchical path segments.
    ByPath {
        /// Target path segments, root first.
        #[serde(rename = "refPath")]
        ref_path: Vec<String>,
    },
}

/// Opaque value the hub cannot express; surfaced read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedValue {
    /// Foreign type label reported by the editor.
    pub unsupported_type: String,
}

// ============================================================================
// SECTION: Kind Classification
// ============================================================================

/// Canonical value kind used by schema inference.
///
/// # Invariants
/// - Precedence (highest first): enum, reference, struct, primitive,
///   readonly, unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Enum item values.
    Enum,
    /// Instance references.
    Reference,
    /// Fixed struct shapes.
    Struct,
    /// JSON primitives.
    Primitive,
    /// Opaque unsupported values (observed read-only).
    Readonly,
    /// No observation yet.
    Unknown,
}

impl ValueKind {
    /// Returns the precedence rank; lower ranks win when kinds are mixed.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Enum => 0,
            Self::Reference => 1,
            Self::Struct => 2,
            Self::Primitive => 3,
            Self::Readonly => 4,
            Self::Unknown => 5,
        }
    }

    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enum => "enum",
            Self::Reference => "reference",
            Self::Struct => "struct",
            Self::Primitive => "primitive",
            Self::Readonly => "readonly",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// SECTION: Value Errors
// ============================================================================

/// Errors raised when a value fails model validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric component is NaN or infinite.
    #[error("non-finite number in {context}")]
    NonFinite {
        /// Where the non-finite component was found.
        context: String,
    },
}

// ============================================================================
// SECTION: Value Methods
// ============================================================================

impl Value {
    /// Convenience constructor for a null primitive.
    #[must_use]
    pub const fn null() -> Self {
        Self::Primitive(Primitive::Null)
    }

    /// Returns true for the null primitive.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Null))
    }

    /// Returns the canonical kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Struct(_) => ValueKind::Struct,
            Self::Enum(_) => ValueKind::Enum,
            Self::Reference(_) => ValueKind::Reference,
            Self::Unsupported(_) => ValueKind::Readonly,
            Self::Primitive(_) => ValueKind::Primitive,
        }
    }

    /// Returns the stable type tag used by schema inference
    /// (for example `number`, `Vector3`, `Enum`).
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Struct(shape) => shape.type_tag(),
            Self::Enum(_) => "Enum",
            Self::Reference(_) => "Reference",
            Self::Unsupported(_) => "Unsupported",
            Self::Primitive(Primitive::Null) => "null",
            Self::Primitive(Primitive::Bool(_)) => "boolean",
            Self::Primitive(Primitive::Number(_)) => "number",
            Self::Primitive(Primitive::String(_)) => "string",
        }
    }

    /// Returns the numeric payload when this value is a number primitive.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Primitive(Primitive::Number(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload when this value is a string primitive.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Primitive(Primitive::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Validates that every numeric component is finite.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::NonFinite`] naming the offending component.
    pub fn ensure_finite(&self) -> Result<(), ValueError> {
        match self {
            Self::Primitive(Primitive::Number(value)) => check_finite(*value, "number"),
            Self::Struct(shape) => shape.ensure_finite(),
            Self::Enum(_) | Self::Reference(_) | Self::Unsupported(_) | Self::Primitive(_) => {
                Ok(())
            }
        }
    }
}

impl StructValue {
    /// Returns the stable shape tag.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Vector2 { .. } => "Vector2",
            Self::Vector3 { .. } => "Vector3",
            Self::CFrame { .. } => "CFrame",
            Self::Color3 { .. } => "Color3",
            Self::UDim { .. } => "UDim",
            Self::UDim2 { .. } => "UDim2",
            Self::BrickColor { .. } => "BrickColor",
            Self::NumberRange { .. } => "NumberRange",
            Self::Rect { .. } => "Rect",
        }
    }

    /// Validates that every numeric component is finite.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::NonFinite`] naming the offending component.
    pub fn ensure_finite(&self) -> Result<(), ValueError> {
        let tag = self.type_tag();
        match self {
            Self::Vector2 { x, y } => check_all_finite(&[*x, *y], tag),
            Self::Vector3 { x, y, z } => check_all_finite(&[*x, *y, *z], tag),
            Self::CFrame { position, rotation } => {
                check_all_finite(position, tag)?;
                check_all_finite(rotation, tag)
            }
            Self::Color3 { r, g, b } => check_all_finite(&[*r, *g, *b], tag),
            Self::UDim { scale, .. } => check_finite(*scale, tag),
            Self::UDim2 { x, y } => {
                check_finite(x.scale, tag)?;
                check_finite(y.scale, tag)
            }
            Self::BrickColor { .. } => Ok(()),
            Self::NumberRange { min, max } => check_all_finite(&[*min, *max], tag),
            Self::Rect { min, max } => check_all_finite(&[min.x, min.y, max.x, max.y], tag),
        }
    }
}

/// Rejects NaN and infinities for one component.
fn check_finite(value: f64, context: &str) -> Result<(), ValueError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValueError::NonFinite {
            context: context.to_string(),
        })
    }
}

/// Rejects NaN and infinities across a component slice.
fn check_all_finite(values: &[f64], context: &str) -> Result<(), ValueError> {
    for value in values {
        check_finite(*value, context)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::Primitive;
    use super::StructValue;
    use super::Value;
    use super::ValueKind;

    #[test]
    fn primitives_round_trip_as_bare_scalars() {
        let value: Value = serde_json::from_value(json!(1.5)).unwrap();
        assert_eq!(value, Value::Primitive(Primitive::Number(1.5)));
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(1.5));

        let value: Value = serde_json::from_value(json!(null)).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn struct_shapes_round_trip_with_tags() {
        let wire = json!({"shape": "Vector3", "x": 1.0, "y": 2.0, "z": 3.0});
        let value: Value = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(value.type_tag(), "Vector3");
        assert_eq!(serde_json::to_value(&value).unwrap(), wire);
    }

    #[test]
    fn enum_values_take_priority_over_plain_maps() {
        let wire = json!({"enumType": "Material", "value": 256, "name": "Plastic"});
        let value: Value = serde_json::from_value(wire).unwrap();
        assert_eq!(value.kind(), ValueKind::Enum);
    }

    #[test]
    fn references_parse_by_id_and_path() {
        let by_id: Value = serde_json::from_value(json!({"refId": "inst-9"})).unwrap();
        assert_eq!(by_id.kind(), ValueKind::Reference);
        let by_path: Value =
            serde_json::from_value(json!({"refPath": ["Workspace", "Door"]})).unwrap();
        assert_eq!(by_path.kind(), ValueKind::Reference);
    }

    #[test]
    fn unsupported_values_classify_readonly() {
        let value: Value =
            serde_json::from_value(json!({"unsupportedType": "BinaryString"})).unwrap();
        assert_eq!(value.kind(), ValueKind::Readonly);
        assert_eq!(value.type_tag(), "Unsupported");
    }

    #[test]
    fn finiteness_is_enforced_recursively() {
        let bad = Value::Struct(StructValue::Vector2 {
            x: f64::NAN,
            y: 0.0,
        });
        assert!(bad.ensure_finite().is_err());
        let good = Value::Struct(StructValue::NumberRange { min: 0.0, max: 1.0 });
        assert!(good.ensure_finite().is_ok());
    }

    #[test]
    fn kind_precedence_orders_enum_first() {
        assert!(ValueKind::Enum.precedence() < ValueKind::Reference.precedence());
        assert!(ValueKind::Reference.precedence() < ValueKind::Struct.precedence());
        assert!(ValueKind::Struct.precedence() < ValueKind::Primitive.precedence());
        assert!(ValueKind::Primitive.precedence() < ValueKind::Readonly.precedence());
        assert!(ValueKind::Readonly.precedence() < ValueKind::Unknown.precedence());
    }
}
