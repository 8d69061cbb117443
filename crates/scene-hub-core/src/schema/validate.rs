// crates/scene-hub-core/src/schema/validate.rs
// ============================================================================
// Module: Property Update Validation
// Description: Pre-mutation checks against built-in and inferred constraints.
// Purpose: Reject bad writes with errors naming property, expectation, and value.
// Dependencies: crate::core, crate::schema::{constraints, infer}
// ============================================================================

//! ## Overview
//! Every property write from the command path runs through
//! [`validate_property_update`] before the scene graph mutates. Checks are
//! ordered from structural (writability, finiteness, known-property) to
//! constraint-based (built-in bounds, enum allowlists, inferred kinds); the
//! first violation wins and carries the offending value verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::Instance;
use crate::core::Primitive;
use crate::core::Value;
use crate::core::ValueKind;
use crate::core::is_valid_name;
use crate::schema::constraints::builtin_enum_allowlist;
use crate::schema::constraints::builtin_numeric_rule;
use crate::schema::constraints::builtin_string_rule;
use crate::schema::constraints::is_readonly_property;
use crate::schema::infer::ClassSchema;

// ============================================================================
// SECTION: Violation
// ============================================================================

/// A rejected property write: what was expected and what arrived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyViolation {
    /// Property name.
    pub property: String,
    /// Human-readable expectation (kind, type, or bound).
    pub expected: String,
    /// The offending value.
    pub actual: Value,
}

impl PropertyViolation {
    /// Builds a violation for one property.
    fn new(property: &str, expected: impl Into<String>, actual: &Value) -> Self {
        Self {
            property: property.to_string(),
            expected: expected.into(),
            actual: actual.clone(),
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates one property write against built-in rules and the inferred
/// class schema.
///
/// # Errors
///
/// Returns [`PropertyViolation`] naming the property, the expectation, and
/// the offending value.
pub fn validate_property_update(
    instance: &Instance,
    class_schema: Option<&ClassSchema>,
    property: &str,
    value: &Value,
) -> Result<(), PropertyViolation> {
    if is_readonly_property(property) {
        return Err(PropertyViolation::new(property, "a writable property", value));
    }
    let inferred = class_schema.and_then(|schema| schema.properties.get(property));
    if inferred.is_some_and(|schema| !schema.writable) {
        return Err(PropertyViolation::new(property, "a writable property", value));
    }
    if value.ensure_finite().is_err() {
        return Err(PropertyViolation::new(property, "finite numeric components", value));
    }

    if property == "Name" {
        return validate_name(property, value);
    }

    let known = builtin_numeric_rule(property).is_some()
        || builtin_string_rule(property).is_some()
        || instance.properties.contains_key(property)
        || inferred.is_some();
    if !known {
        return Err(PropertyViolation::new(
            property,
            format!("a known property of class {}", instance.class_name),
            value,
        ));
    }

    // Null clears the property; constraint checks apply to real values only.
    if value.is_null() {
        return Ok(());
    }

    if let Some(rule) = builtin_numeric_rule(property) {
        validate_numeric(property, value, rule)?;
    }
    if let Some(rule) = builtin_string_rule(property) {
        validate_string(property, value, rule)?;
    }
    if let Value::Enum(item) = value {
        if let Some(allowlist) = builtin_enum_allowlist(&item.enum_type) {
            if !allowlist.contains(&item.name.as_str()) {
                return Err(PropertyViolation::new(
                    property,
                    format!("one of the {} items: {}", item.enum_type, allowlist.join(", ")),
                    value,
                ));
            }
        }
    }
    validate_inferred_kind(property, value, inferred)
}

/// Name writes must be non-empty strings free of dots.
fn validate_name(property: &str, value: &Value) -> Result<(), PropertyViolation> {
    match value.as_str() {
        Some(name) if is_valid_name(name) => Ok(()),
        _ => Err(PropertyViolation::new(
            property,
            "a non-empty string without dots",
            value,
        )),
    }
}

/// Applies a strict numeric rule.
fn validate_numeric(
    property: &str,
    value: &Value,
    rule: crate::schema::constraints::NumericRule,
) -> Result<(), PropertyViolation> {
    let Some(number) = value.as_number() else {
        return Err(PropertyViolation::new(property, "number", value));
    };
    if rule.min.is_some_and(|min| number < min) || rule.max.is_some_and(|max| number > max) {
        let low = rule.min.map_or_else(|| "-inf".to_string(), |min| min.to_string());
        let high = rule.max.map_or_else(|| "+inf".to_string(), |max| max.to_string());
        return Err(PropertyViolation::new(
            property,
            format!("number in [{low}, {high}]"),
            value,
        ));
    }
    if rule.integer && number.fract() != 0.0 {
        return Err(PropertyViolation::new(property, "integer", value));
    }
    Ok(())
}

/// Applies a strict string rule.
fn validate_string(
    property: &str,
    value: &Value,
    rule: crate::schema::constraints::StringRule,
) -> Result<(), PropertyViolation> {
    let Some(text) = value.as_str() else {
        return Err(PropertyViolation::new(property, "string", value));
    };
    if rule.non_empty && text.is_empty() {
        return Err(PropertyViolation::new(property, "a non-empty string", value));
    }
    if rule.no_dots && text.contains('.') {
        return Err(PropertyViolation::new(property, "a string without dots", value));
    }
    Ok(())
}

/// Rejects kind and primitive-tag mismatches against the inferred schema.
fn validate_inferred_kind(
    property: &str,
    value: &Value,
    inferred: Option<&crate::schema::infer::PropertySchema>,
) -> Result<(), PropertyViolation> {
    let Some(schema) = inferred else {
        return Ok(());
    };
    match schema.kind {
        ValueKind::Unknown | ValueKind::Readonly => Ok(()),
        kind if value.kind() != kind => Err(PropertyViolation::new(
            property,
            format!("a {} value", kind.as_str()),
            value,
        )),
        ValueKind::Primitive => {
            let tag = value.type_tag();
            let observed_scalar = schema
                .value_types
                .iter()
                .any(|seen| matches!(seen.as_str(), "string" | "number" | "boolean"));
            if observed_scalar
                && !schema.value_types.contains(tag)
                && !matches!(value, Value::Primitive(Primitive::Null))
            {
                let seen = schema.value_types.iter().cloned().collect::<Vec<_>>().join(", ");
                return Err(PropertyViolation::new(property, format!("one of: {seen}"), value));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use crate::core::Instance;
    use crate::core::InstanceId;
    use crate::core::Primitive;
    use crate::core::Value;
    use crate::schema::infer::infer_class_schemas;

    use super::validate_property_update;

    /// Builds a part instance carrying the given properties.
    fn part(properties: &[(&str, Value)]) -> Instance {
        Instance {
            id: InstanceId::new("p1"),
            class_name: "Part".to_string(),
            name: "Part".to_string(),
            parent_id: None,
            child_ids: Vec::new(),
            properties: properties
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
        }
    }

    /// Number helper.
    fn num(value: f64) -> Value {
        Value::Primitive(Primitive::Number(value))
    }

    #[test]
    fn transparency_bounds_are_inclusive() {
        let instance = part(&[]);
        assert!(validate_property_update(&instance, None, "Transparency", &num(0.0)).is_ok());
        assert!(validate_property_update(&instance, None, "Transparency", &num(1.0)).is_ok());
        assert!(validate_property_update(&instance, None, "Transparency", &num(-0.01)).is_err());
        assert!(validate_property_update(&instance, None, "Transparency", &num(1.01)).is_err());
    }

    #[test]
    fn readonly_names_are_rejected() {
        let instance = part(&[]);
        let violation = validate_property_update(
            &instance,
            None,
            "ClassName",
            &Value::Primitive(Primitive::String("Folder".to_string())),
        )
        .unwrap_err();
        assert_eq!(violation.property, "ClassName");
    }

    #[test]
    fn unknown_properties_are_rejected() {
        let instance = part(&[]);
        let violation =
            validate_property_update(&instance, None, "NonexistentProp", &num(1.0)).unwrap_err();
        assert!(violation.expected.contains("known property"));
    }

    #[test]
    fn name_updates_reject_dots_and_empty() {
        let instance = part(&[]);
        let dotted = Value::Primitive(Primitive::String("Door.Handle".to_string()));
        assert!(validate_property_update(&instance, None, "Name", &dotted).is_err());
        let empty = Value::Primitive(Primitive::String(String::new()));
        assert!(validate_property_update(&instance, None, "Name", &empty).is_err());
        let clean = Value::Primitive(Primitive::String("Door".to_string()));
        assert!(validate_property_update(&instance, None, "Name", &clean).is_ok());
    }

    #[test]
    fn inferred_kind_mismatch_is_rejected() {
        let observed = part(&[("Anchored", Value::Primitive(Primitive::Bool(true)))]);
        let schemas = infer_class_schemas([&observed], None);
        let schema = schemas.get("Part");
        let text = Value::Primitive(Primitive::String("yes".to_string()));
        let violation =
            validate_property_update(&observed, schema, "Anchored", &text).unwrap_err();
        assert!(violation.expected.contains("boolean"));
        assert!(
            validate_property_update(&observed, schema, "Anchored", &Value::Primitive(Primitive::Bool(false)))
                .is_ok()
        );
    }

    #[test]
    fn null_clears_known_properties() {
        let instance = part(&[("Transparency", num(0.5))]);
        assert!(validate_property_update(&instance, None, "Transparency", &Value::null()).is_ok());
    }
}
