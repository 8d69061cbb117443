// crates/scene-hub-core/src/schema/infer.rs
// ============================================================================
// Module: Schema Inference
// Description: Per-class property shape aggregation from observed instances.
// Purpose: Give agents a typed view of what each class accepts.
// Dependencies: crate::core, crate::schema::constraints, serde
// ============================================================================

//! ## Overview
//! The inferer scans every observed instance of a class and aggregates one
//! [`PropertySchema`] per property: the canonical kind (highest-precedence
//! kind seen), the set of observed type tags, writability, nullability, and
//! numeric/string/enum constraints merged with the strict built-in tables.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::Instance;
use crate::core::Primitive;
use crate::core::Value;
use crate::core::ValueKind;
use crate::schema::constraints::builtin_enum_allowlist;
use crate::schema::constraints::builtin_numeric_rule;
use crate::schema::constraints::builtin_string_rule;
use crate::schema::constraints::is_readonly_property;

// ============================================================================
// SECTION: Constraint Types
// ============================================================================

/// Numeric constraint aggregated from observation and built-in rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericConstraint {
    /// Inclusive lower bound, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Whether every observation (and any built-in rule) was integral.
    pub integer: bool,
    /// Whether the bounds come from the strict built-in table.
    pub strict: bool,
}

/// String constraint aggregated from observation and built-in rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringConstraint {
    /// Shortest observed length.
    pub min_length: usize,
    /// Longest observed length.
    pub max_length: usize,
    /// Whether the empty string is rejected (built-in rule).
    pub non_empty: bool,
}

/// Enum constraint aggregated from observation and built-in allowlists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumConstraint {
    /// Enum type name, when consistently observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_type: Option<String>,
    /// Allowed item names.
    pub names: BTreeSet<String>,
    /// Observed numeric values.
    pub values: BTreeSet<u32>,
    /// Whether `names` is a strict built-in allowlist.
    pub strict: bool,
}

// ============================================================================
// SECTION: Property Schema
// ============================================================================

/// Aggregated shape of one property across a class's observed instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    /// Canonical kind (highest precedence among observations).
    pub kind: ValueKind,
    /// Observed value type tags (for example `number`, `Vector3`, `Enum`).
    pub value_types: BTreeSet<String>,
    /// Whether the command path may write this property.
    pub writable: bool,
    /// Whether null was observed.
    pub nullable: bool,
    /// Numeric constraint, when numbers were observed or a rule exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericConstraint>,
    /// String constraint, when strings were observed or a rule exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string: Option<StringConstraint>,
    /// Enum constraint, when enum items were observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_items: Option<EnumConstraint>,
}

impl PropertySchema {
    /// Starting point before the first observation folds in.
    fn unknown(property: &str) -> Self {
        Self {
            kind: ValueKind::Unknown,
            value_types: BTreeSet::new(),
            writable: !is_readonly_property(property),
            nullable: false,
            numeric: None,
            string: None,
            enum_items: None,
        }
    }

    /// Folds one observed value into the aggregate.
    fn observe(&mut self, property: &str, value: &Value) {
        let kind = value.kind();
        if kind.precedence() < self.kind.precedence() {
            self.kind = kind;
        }
        self.value_types.insert(value.type_tag().to_string());
        match value {
            Value::Primitive(Primitive::Null) => self.nullable = true,
            Value::Primitive(Primitive::Number(number)) => self.observe_number(property, *number),
            Value::Primitive(Primitive::String(text)) => self.observe_string(property, text),
            Value::Enum(item) => self.observe_enum(item),
            Value::Unsupported(_) => self.writable = false,
            Value::Primitive(_) | Value::Struct(_) | Value::Reference(_) => {}
        }
    }

    /// Folds one numeric observation. Strict built-in bounds never widen;
    /// observed bounds track the min/max and integral-ness of what was seen.
    fn observe_number(&mut self, property: &str, number: f64) {
        if let Some(rule) = builtin_numeric_rule(property) {
            self.numeric.get_or_insert_with(|| NumericConstraint {
                min: rule.min,
                max: rule.max,
                integer: rule.integer,
                strict: true,
            });
            return;
        }
        match &mut self.numeric {
            Some(constraint) => {
                constraint.min = Some(constraint.min.map_or(number, |min| min.min(number)));
                constraint.max = Some(constraint.max.map_or(number, |max| max.max(number)));
                constraint.integer = constraint.integer && number.fract() == 0.0;
            }
            None => {
                self.numeric = Some(NumericConstraint {
                    min: Some(number),
                    max: Some(number),
                    integer: number.fract() == 0.0,
                    strict: false,
                });
            }
        }
    }

    /// Folds one string observation.
    fn observe_string(&mut self, property: &str, text: &str) {
        let rule = builtin_string_rule(property);
        let length = text.chars().count();
        match &mut self.string {
            Some(constraint) => {
                constraint.min_length = constraint.min_length.min(length);
                constraint.max_length = constraint.max_length.max(length);
            }
            None => {
                self.string = Some(StringConstraint {
                    min_length: length,
                    max_length: length,
                    non_empty: rule.is_some_and(|r| r.non_empty),
                });
            }
        }
    }

    /// Folds one enum observation, preferring strict built-in allowlists.
    fn observe_enum(&mut self, item: &crate::core::EnumValue) {
        let allowlist = builtin_enum_allowlist(&item.enum_type);
        let entry = self.enum_items.get_or_insert_with(|| EnumConstraint {
            enum_type: Some(item.enum_type.clone()),
            names: allowlist
                .map(|names| names.iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
            values: BTreeSet::new(),
            strict: allowlist.is_some(),
        });
        if entry.enum_type.as_deref() != Some(item.enum_type.as_str()) {
            entry.enum_type = None;
            entry.strict = false;
        }
        if !entry.strict {
            entry.names.insert(item.name.clone());
        }
        entry.values.insert(item.value);
    }
}

// ============================================================================
// SECTION: Class Schema
// ============================================================================

/// Aggregated property schema for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSchema {
    /// Class name.
    pub class_name: String,
    /// How many instances contributed observations.
    pub instance_count: usize,
    /// Per-property aggregates.
    pub properties: BTreeMap<String, PropertySchema>,
}

/// Infers per-class schemas from an instance listing, optionally filtered to
/// one class.
#[must_use]
pub fn infer_class_schemas<'a>(
    instances: impl IntoIterator<Item = &'a Instance>,
    class_filter: Option<&str>,
) -> BTreeMap<String, ClassSchema> {
    let mut schemas: BTreeMap<String, ClassSchema> = BTreeMap::new();
    for instance in instances {
        if class_filter.is_some_and(|wanted| wanted != instance.class_name) {
            continue;
        }
        let entry = schemas
            .entry(instance.class_name.clone())
            .or_insert_with(|| ClassSchema {
                class_name: instance.class_name.clone(),
                instance_count: 0,
                properties: BTreeMap::new(),
            });
        entry.instance_count += 1;
        for (property, value) in &instance.properties {
            entry
                .properties
                .entry(property.clone())
                .or_insert_with(|| PropertySchema::unknown(property))
                .observe(property, value);
        }
    }
    schemas
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use crate::core::EnumValue;
    use crate::core::Instance;
    use crate::core::InstanceId;
    use crate::core::Primitive;
    use crate::core::StructValue;
    use crate::core::Value;
    use crate::core::ValueKind;

    use super::infer_class_schemas;

    /// Builds a part-like instance with the given properties.
    fn part(id: &str, properties: &[(&str, Value)]) -> Instance {
        Instance {
            id: InstanceId::new(id),
            class_name: "Part".to_string(),
            name: id.to_string(),
            parent_id: None,
            child_ids: Vec::new(),
            properties: properties
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
        }
    }

    #[test]
    fn numeric_observation_widens_bounds() {
        let a = part("a", &[("Size", Value::Primitive(Primitive::Number(4.0)))]);
        let b = part("b", &[("Size", Value::Primitive(Primitive::Number(10.0)))]);
        let schemas = infer_class_schemas([&a, &b], None);
        let size = &schemas["Part"].properties["Size"];
        let numeric = size.numeric.clone().unwrap();
        assert_eq!(numeric.min, Some(4.0));
        assert_eq!(numeric.max, Some(10.0));
        assert!(!numeric.strict);
    }

    #[test]
    fn builtin_rules_stay_strict_under_observation() {
        let a = part(
            "a",
            &[("Transparency", Value::Primitive(Primitive::Number(0.5)))],
        );
        let schemas = infer_class_schemas([&a], None);
        let numeric = schemas["Part"].properties["Transparency"].numeric.clone().unwrap();
        assert_eq!(numeric.min, Some(0.0));
        assert_eq!(numeric.max, Some(1.0));
        assert!(numeric.strict);
    }

    #[test]
    fn kind_precedence_prefers_enum_over_primitive() {
        let a = part(
            "a",
            &[(
                "Material",
                Value::Enum(EnumValue {
                    enum_type: "Material".to_string(),
                    value: 256,
                    name: "Plastic".to_string(),
                }),
            )],
        );
        let b = part("b", &[("Material", Value::Primitive(Primitive::Number(256.0)))]);
        let schemas = infer_class_schemas([&a, &b], None);
        let material = &schemas["Part"].properties["Material"];
        assert_eq!(material.kind, ValueKind::Enum);
        assert!(material.value_types.contains("Enum"));
        assert!(material.value_types.contains("number"));
    }

    #[test]
    fn unsupported_observation_marks_unwritable() {
        let a = part(
            "a",
            &[(
                "AttributesSerialize",
                Value::Unsupported(crate::core::UnsupportedValue {
                    unsupported_type: "BinaryString".to_string(),
                }),
            )],
        );
        let schemas = infer_class_schemas([&a], None);
        assert!(!schemas["Part"].properties["AttributesSerialize"].writable);
    }

    #[test]
    fn nullability_tracks_null_observations() {
        let a = part("a", &[("Value", Value::null())]);
        let schemas = infer_class_schemas([&a], None);
        assert!(schemas["Part"].properties["Value"].nullable);
    }

    #[test]
    fn class_filter_limits_output() {
        let a = part("a", &[]);
        let mut other = part("b", &[]);
        other.class_name = "Folder".to_string();
        let schemas = infer_class_schemas([&a, &other], Some("Folder"));
        assert_eq!(schemas.len(), 1);
        assert!(schemas.contains_key("Folder"));
    }

    #[test]
    fn struct_observation_records_shape_tag() {
        let a = part(
            "a",
            &[(
                "Position",
                Value::Struct(StructValue::Vector3 {
                    x: 0.0,
                    y: 1.0,
                    z: 2.0,
                }),
            )],
        );
        let schemas = infer_class_schemas([&a], None);
        let position = &schemas["Part"].properties["Position"];
        assert_eq!(position.kind, ValueKind::Struct);
        assert!(position.value_types.contains("Vector3"));
    }
}
