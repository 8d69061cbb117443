// crates/scene-hub-core/src/schema/constraints.rs
// ============================================================================
// Module: Built-In Property Constraints
// Description: Strict constraint tables keyed by property and enum names.
// Purpose: Encode editor-defined bounds that observation alone cannot prove.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Observation tells the inferer what values look like; these tables tell it
//! what values are allowed to be. Entries here are strict: validation rejects
//! values outside them regardless of what has been observed.

// ============================================================================
// SECTION: Readonly Properties
// ============================================================================

/// Property names that are never writable through the command path.
pub const READONLY_PROPERTY_NAMES: &[&str] = &["ClassName", "Parent", "Children"];

/// Returns true when the property is readonly by name.
#[must_use]
pub fn is_readonly_property(property: &str) -> bool {
    READONLY_PROPERTY_NAMES.contains(&property)
}

// ============================================================================
// SECTION: Numeric Rules
// ============================================================================

/// Strict numeric bounds for one property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRule {
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
    /// Whether only integral values are allowed.
    pub integer: bool,
}

/// Strict numeric rules keyed by property name.
const NUMERIC_RULES: &[(&str, NumericRule)] = &[
    (
        "Transparency",
        NumericRule {
            min: Some(0.0),
            max: Some(1.0),
            integer: false,
        },
    ),
    (
        "Reflectance",
        NumericRule {
            min: Some(0.0),
            max: Some(1.0),
            integer: false,
        },
    ),
    (
        "BackgroundTransparency",
        NumericRule {
            min: Some(0.0),
            max: Some(1.0),
            integer: false,
        },
    ),
    (
        "TextTransparency",
        NumericRule {
            min: Some(0.0),
            max: Some(1.0),
            integer: false,
        },
    ),
    (
        "ImageTransparency",
        NumericRule {
            min: Some(0.0),
            max: Some(1.0),
            integer: false,
        },
    ),
    (
        "LayoutOrder",
        NumericRule {
            min: None,
            max: None,
            integer: true,
        },
    ),
    (
        "ZIndex",
        NumericRule {
            min: None,
            max: None,
            integer: true,
        },
    ),
];

/// Looks up the strict numeric rule for a property, if any.
#[must_use]
pub fn builtin_numeric_rule(property: &str) -> Option<NumericRule> {
    NUMERIC_RULES
        .iter()
        .find(|(name, _)| *name == property)
        .map(|(_, rule)| *rule)
}

// ============================================================================
// SECTION: String Rules
// ============================================================================

/// Strict string constraints for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRule {
    /// Whether the empty string is rejected.
    pub non_empty: bool,
    /// Whether `.` characters are rejected (path-segment safety).
    pub no_dots: bool,
}

/// Strict string rules keyed by property name.
const STRING_RULES: &[(&str, StringRule)] = &[(
    "Name",
    StringRule {
        non_empty: true,
        no_dots: true,
    },
)];

/// Looks up the strict string rule for a property, if any.
#[must_use]
pub fn builtin_string_rule(property: &str) -> Option<StringRule> {
    STRING_RULES
        .iter()
        .find(|(name, _)| *name == property)
        .map(|(_, rule)| *rule)
}

// ============================================================================
// SECTION: Enum Allowlists
// ============================================================================

/// Strict item-name allowlists keyed by enum type name.
const ENUM_ALLOWLISTS: &[(&str, &[&str])] = &[
    (
        "Material",
        &[
            "Plastic", "Wood", "Slate", "Concrete", "Metal", "Brick", "Glass", "Neon", "Grass",
            "Sand", "Fabric",
        ],
    ),
    ("SortOrder", &["Name", "LayoutOrder", "Custom"]),
    ("FillDirection", &["Horizontal", "Vertical"]),
];

/// Looks up the strict item allowlist for an enum type, if any.
#[must_use]
pub fn builtin_enum_allowlist(enum_type: &str) -> Option<&'static [&'static str]> {
    ENUM_ALLOWLISTS
        .iter()
        .find(|(name, _)| *name == enum_type)
        .map(|(_, items)| *items)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::builtin_enum_allowlist;
    use super::builtin_numeric_rule;
    use super::builtin_string_rule;
    use super::is_readonly_property;

    #[test]
    fn transparency_is_unit_bounded() {
        let rule = builtin_numeric_rule("Transparency").unwrap_or_else(|| unreachable!());
        assert_eq!(rule.min, Some(0.0));
        assert_eq!(rule.max, Some(1.0));
        assert!(!rule.integer);
    }

    #[test]
    fn name_rule_rejects_dots_and_empty() {
        let rule = builtin_string_rule("Name").unwrap_or_else(|| unreachable!());
        assert!(rule.non_empty);
        assert!(rule.no_dots);
    }

    #[test]
    fn readonly_names_cover_structural_fields() {
        assert!(is_readonly_property("ClassName"));
        assert!(is_readonly_property("Parent"));
        assert!(is_readonly_property("Children"));
        assert!(!is_readonly_property("Transparency"));
    }

    #[test]
    fn unknown_lookups_return_none() {
        assert!(builtin_numeric_rule("Anchored").is_none());
        assert!(builtin_string_rule("Text").is_none());
        assert!(builtin_enum_allowlist("NoSuchEnum").is_none());
    }
}
