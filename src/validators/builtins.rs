//! XSD built-in types
//!
//! This module defines the catalog of XSD 1.0 built-in simple types: their
//! derivation chain, primitive, whiteSpace, fundamental facets, lexical
//! validator and the facets their derivation implies (for example
//! `positiveInteger` implies `minInclusive = 1`). XSD 1.1-only types are not
//! part of the catalog.

use indexmap::IndexMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::validators::facets::{FacetKind, WhiteSpace};
use crate::validators::helpers::{
    any_uri_validator, base64_binary_validator, boolean_validator, date_validator, datetime_validator,
    decimal_validator, duration_validator, float_validator, gday_validator, gmonth_day_validator,
    gmonth_validator, gyear_month_validator, gyear_validator, hex_binary_validator, integer_validator,
    language_validator, name_validator, ncname_validator, nmtoken_validator, normalized_string_validator,
    qname_validator, string_validator, time_validator, token_validator,
};
use crate::XSD_NAMESPACE;

// =============================================================================
// XSD Type Names
// =============================================================================

/// XSD anyType type name
pub const XSD_ANY_TYPE: &str = "anyType";
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";
/// XSD string type name
pub const XSD_STRING: &str = "string";
/// XSD decimal type name
pub const XSD_DECIMAL: &str = "decimal";
/// XSD integer type name
pub const XSD_INTEGER: &str = "integer";
/// XSD ID type name
pub const XSD_ID: &str = "ID";
/// XSD QName type name
pub const XSD_QNAME: &str = "QName";
/// XSD NOTATION type name
pub const XSD_NOTATION: &str = "NOTATION";

/// XSD 1.1-only names that are not part of the 1.0 catalog
pub const XSD_11_ONLY_TYPES: &[&str] = &[
    "anyAtomicType",
    "dateTimeStamp",
    "yearMonthDuration",
    "dayTimeDuration",
    "precisionDecimal",
    "timeDuration",
    "error",
];

// =============================================================================
// Fundamental Facets
// =============================================================================

/// Type category in the builtin hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// anySimpleType
    Special,
    /// One of the 19 primitives
    Primitive,
    /// Atomic type derived by restriction
    Derived,
    /// Builtin list type (NMTOKENS, IDREFS, ENTITIES)
    List,
}

/// The `ordered` fundamental facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordered {
    /// No order
    None,
    /// Partial order
    Partial,
    /// Total order
    Total,
}

/// The `cardinality` fundamental facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Finite value space
    Finite,
    /// Countably infinite value space
    CountablyInfinite,
}

/// A built-in simple type
pub struct BuiltinType {
    /// Local name in the XSD namespace
    pub name: &'static str,
    /// Position in the hierarchy
    pub category: TypeCategory,
    /// Immediate base (None for anySimpleType, whose base is anyType)
    pub base_type: Option<&'static str>,
    /// Primitive at the root of the restriction chain
    pub primitive: &'static str,
    /// whiteSpace of the type (fixed to collapse for non-string primitives)
    pub white_space: WhiteSpace,
    /// `ordered` fundamental facet
    pub ordered: Ordered,
    /// `bounded` fundamental facet
    pub bounded: bool,
    /// `cardinality` fundamental facet
    pub cardinality: Cardinality,
    /// `numeric` fundamental facet
    pub numeric: bool,
    /// Item type of builtin list types
    pub item_type: Option<&'static str>,
    /// Facets introduced by this type's own derivation step
    pub implied_facets: &'static [(FacetKind, &'static str)],
    /// Lexical validator (applied after whitespace normalization)
    pub validator: fn(&str) -> Result<()>,
}

impl fmt::Debug for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinType")
            .field("name", &self.name)
            .field("primitive", &self.primitive)
            .finish()
    }
}

impl PartialEq for BuiltinType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl BuiltinType {
    /// Expanded name of this type
    pub fn qname(&self) -> QName {
        QName::xsd(self.name)
    }

    /// Builtin list type?
    pub fn is_list(&self) -> bool {
        self.category == TypeCategory::List
    }

    /// The anySimpleType entry?
    pub fn is_any_simple_type(&self) -> bool {
        self.category == TypeCategory::Special
    }

    /// Immediate builtin base, if any
    pub fn base(&self) -> Option<&'static BuiltinType> {
        self.base_type.and_then(get_builtin_type)
    }

    /// Primitive type entry
    pub fn primitive_type(&self) -> Option<&'static BuiltinType> {
        get_builtin_type(self.primitive)
    }

    /// Check whether this type is `name` or derives from it
    pub fn is_derived_from(&self, name: &str) -> bool {
        let mut current = Some(self.name);
        while let Some(n) = current {
            if n == name {
                return true;
            }
            current = get_builtin_type(n).and_then(|t| t.base_type);
        }
        false
    }

    /// Derived from xs:integer (fractionDigits fixed to 0)
    pub fn is_integer_derived(&self) -> bool {
        self.is_derived_from(XSD_INTEGER)
    }

    /// Facets applicable to restrictions of this type
    pub fn admits_facet(&self, kind: FacetKind) -> bool {
        use FacetKind::*;
        if self.is_list() {
            return matches!(kind, Length | MinLength | MaxLength | Pattern | Enumeration | WhiteSpace);
        }
        match self.primitive {
            "string" | "anyURI" | "QName" | "NOTATION" | "hexBinary" | "base64Binary" => {
                matches!(kind, Length | MinLength | MaxLength | Pattern | Enumeration | WhiteSpace)
            }
            "boolean" => matches!(kind, Pattern | WhiteSpace),
            "decimal" => !kind.is_length(),
            "float" | "double" | "duration" | "dateTime" | "time" | "date" | "gYearMonth" | "gYear"
            | "gMonthDay" | "gDay" | "gMonth" => !kind.is_length() && !kind.is_digits(),
            _ => matches!(kind, Pattern | Enumeration | WhiteSpace),
        }
    }

    /// Implied facets along the builtin chain, nearest derivation first
    pub fn implied_facets_chain(&self) -> Vec<(FacetKind, &'static str)> {
        let mut facets = Vec::new();
        let mut current = Some(self);
        while let Some(t) = current {
            for (kind, value) in t.implied_facets {
                if !facets.iter().any(|(k, _)| k == kind) {
                    facets.push((*kind, *value));
                }
            }
            current = t.base();
        }
        facets
    }

    /// Validate a lexical value: whitespace normalization, then the
    /// lexical validator (per item for list types)
    pub fn validate(&self, value: &str) -> Result<()> {
        let normalized = self.white_space.normalize(value);
        match self.item_type.and_then(get_builtin_type) {
            Some(item) => {
                if normalized.is_empty() {
                    return Err(Error::Value(format!("xs:{} requires at least one item", self.name)));
                }
                normalized.split(' ').try_for_each(|token| item.validate(token))
            }
            None => (self.validator)(&normalized),
        }
    }
}

// =============================================================================
// Built-in Type Registry
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn entry(
    name: &'static str,
    category: TypeCategory,
    base_type: Option<&'static str>,
    primitive: &'static str,
    white_space: WhiteSpace,
    ordered: Ordered,
    numeric: bool,
    validator: fn(&str) -> Result<()>,
) -> BuiltinType {
    BuiltinType {
        name,
        category,
        base_type,
        primitive,
        white_space,
        ordered,
        bounded: false,
        cardinality: Cardinality::CountablyInfinite,
        numeric,
        item_type: None,
        implied_facets: &[],
        validator,
    }
}

fn primitive(
    name: &'static str,
    white_space: WhiteSpace,
    ordered: Ordered,
    numeric: bool,
    validator: fn(&str) -> Result<()>,
) -> BuiltinType {
    entry(
        name,
        TypeCategory::Primitive,
        Some(XSD_ANY_SIMPLE_TYPE),
        name,
        white_space,
        ordered,
        numeric,
        validator,
    )
}

fn derived(
    name: &'static str,
    base: &'static str,
    primitive: &'static str,
    white_space: WhiteSpace,
    validator: fn(&str) -> Result<()>,
) -> BuiltinType {
    let (ordered, numeric) = if primitive == XSD_DECIMAL {
        (Ordered::Total, true)
    } else {
        (Ordered::None, false)
    };
    entry(
        name,
        TypeCategory::Derived,
        Some(base),
        primitive,
        white_space,
        ordered,
        numeric,
        validator,
    )
}

fn bounded_integer(
    name: &'static str,
    base: &'static str,
    implied: &'static [(FacetKind, &'static str)],
) -> BuiltinType {
    BuiltinType {
        bounded: true,
        cardinality: Cardinality::Finite,
        implied_facets: implied,
        ..derived(name, base, XSD_DECIMAL, WhiteSpace::Collapse, integer_validator)
    }
}

fn list(name: &'static str, item: &'static str) -> BuiltinType {
    BuiltinType {
        item_type: Some(item),
        implied_facets: &[(FacetKind::MinLength, "1")],
        ..entry(
            name,
            TypeCategory::List,
            Some(XSD_ANY_SIMPLE_TYPE),
            XSD_STRING,
            WhiteSpace::Collapse,
            Ordered::None,
            false,
            string_validator,
        )
    }
}

fn build_catalog() -> IndexMap<&'static str, BuiltinType> {
    use FacetKind::{FractionDigits, MaxInclusive, MinInclusive};
    use WhiteSpace::{Collapse, Preserve, Replace};

    let date_family = |name: &'static str, validator: fn(&str) -> Result<()>| {
        primitive(name, Collapse, Ordered::Partial, false, validator)
    };

    let types = vec![
        BuiltinType {
            base_type: None,
            ..entry(
                XSD_ANY_SIMPLE_TYPE,
                TypeCategory::Special,
                None,
                XSD_ANY_SIMPLE_TYPE,
                Preserve,
                Ordered::None,
                false,
                string_validator,
            )
        },
        // Primitive types
        primitive(XSD_STRING, Preserve, Ordered::None, false, string_validator),
        BuiltinType {
            cardinality: Cardinality::Finite,
            ..primitive("boolean", Collapse, Ordered::None, false, boolean_validator)
        },
        primitive(XSD_DECIMAL, Collapse, Ordered::Total, true, decimal_validator),
        BuiltinType {
            bounded: true,
            cardinality: Cardinality::Finite,
            ..primitive("float", Collapse, Ordered::Partial, true, float_validator)
        },
        BuiltinType {
            bounded: true,
            cardinality: Cardinality::Finite,
            ..primitive("double", Collapse, Ordered::Partial, true, float_validator)
        },
        date_family("duration", duration_validator),
        date_family("dateTime", datetime_validator),
        date_family("time", time_validator),
        date_family("date", date_validator),
        date_family("gYearMonth", gyear_month_validator),
        date_family("gYear", gyear_validator),
        date_family("gMonthDay", gmonth_day_validator),
        date_family("gDay", gday_validator),
        date_family("gMonth", gmonth_validator),
        primitive("hexBinary", Collapse, Ordered::None, false, hex_binary_validator),
        primitive("base64Binary", Collapse, Ordered::None, false, base64_binary_validator),
        primitive("anyURI", Collapse, Ordered::None, false, any_uri_validator),
        primitive(XSD_QNAME, Collapse, Ordered::None, false, qname_validator),
        primitive(XSD_NOTATION, Collapse, Ordered::None, false, qname_validator),
        // Derived string types
        derived("normalizedString", XSD_STRING, XSD_STRING, Replace, normalized_string_validator),
        derived("token", "normalizedString", XSD_STRING, Collapse, token_validator),
        derived("language", "token", XSD_STRING, Collapse, language_validator),
        derived("NMTOKEN", "token", XSD_STRING, Collapse, nmtoken_validator),
        derived("Name", "token", XSD_STRING, Collapse, name_validator),
        derived("NCName", "Name", XSD_STRING, Collapse, ncname_validator),
        derived(XSD_ID, "NCName", XSD_STRING, Collapse, ncname_validator),
        derived("IDREF", "NCName", XSD_STRING, Collapse, ncname_validator),
        derived("ENTITY", "NCName", XSD_STRING, Collapse, ncname_validator),
        list("NMTOKENS", "NMTOKEN"),
        list("IDREFS", "IDREF"),
        list("ENTITIES", "ENTITY"),
        // Derived numeric types
        BuiltinType {
            implied_facets: &[(FractionDigits, "0")],
            ..derived(XSD_INTEGER, XSD_DECIMAL, XSD_DECIMAL, Collapse, integer_validator)
        },
        BuiltinType {
            implied_facets: &[(MaxInclusive, "0")],
            ..derived("nonPositiveInteger", XSD_INTEGER, XSD_DECIMAL, Collapse, integer_validator)
        },
        BuiltinType {
            implied_facets: &[(MaxInclusive, "-1")],
            ..derived("negativeInteger", "nonPositiveInteger", XSD_DECIMAL, Collapse, integer_validator)
        },
        bounded_integer(
            "long",
            XSD_INTEGER,
            &[(MinInclusive, "-9223372036854775808"), (MaxInclusive, "9223372036854775807")],
        ),
        bounded_integer("int", "long", &[(MinInclusive, "-2147483648"), (MaxInclusive, "2147483647")]),
        bounded_integer("short", "int", &[(MinInclusive, "-32768"), (MaxInclusive, "32767")]),
        bounded_integer("byte", "short", &[(MinInclusive, "-128"), (MaxInclusive, "127")]),
        BuiltinType {
            implied_facets: &[(MinInclusive, "0")],
            ..derived("nonNegativeInteger", XSD_INTEGER, XSD_DECIMAL, Collapse, integer_validator)
        },
        bounded_integer("unsignedLong", "nonNegativeInteger", &[(MaxInclusive, "18446744073709551615")]),
        bounded_integer("unsignedInt", "unsignedLong", &[(MaxInclusive, "4294967295")]),
        bounded_integer("unsignedShort", "unsignedInt", &[(MaxInclusive, "65535")]),
        bounded_integer("unsignedByte", "unsignedShort", &[(MaxInclusive, "255")]),
        BuiltinType {
            implied_facets: &[(MinInclusive, "1")],
            ..derived("positiveInteger", "nonNegativeInteger", XSD_DECIMAL, Collapse, integer_validator)
        },
    ];

    types.into_iter().map(|t| (t.name, t)).collect()
}

lazy_static::lazy_static! {
    /// Registry of all XSD 1.0 built-in simple types, keyed by local name
    pub static ref BUILTIN_TYPES: IndexMap<&'static str, BuiltinType> = build_catalog();
}

/// Get a built-in type by local name
pub fn get_builtin_type(name: &str) -> Option<&'static BuiltinType> {
    BUILTIN_TYPES.get(name)
}

/// Get a built-in simple type by expanded name
pub fn builtin_by_qname(qname: &QName) -> Option<&'static BuiltinType> {
    if qname.namespace == XSD_NAMESPACE {
        get_builtin_type(&qname.local_name)
    } else {
        None
    }
}

/// Check for xs:anyType
pub fn is_any_type(qname: &QName) -> bool {
    qname.is_xsd_named(XSD_ANY_TYPE)
}

/// Validate a value against a built-in type by local name
pub fn validate_builtin(type_name: &str, value: &str) -> Result<()> {
    let builtin = get_builtin_type(type_name)
        .ok_or_else(|| Error::Value(format!("unknown built-in type xs:{}", type_name)))?;
    builtin.validate(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_size_and_exclusions() {
        // anySimpleType + 19 primitives + 25 derived
        assert_eq!(BUILTIN_TYPES.len(), 45);
        for name in XSD_11_ONLY_TYPES {
            assert!(get_builtin_type(name).is_none(), "{} should not be cataloged", name);
        }
        assert!(get_builtin_type(XSD_ANY_TYPE).is_none());
    }

    #[test]
    fn test_primitive_chain() {
        let byte = get_builtin_type("byte").unwrap();
        assert_eq!(byte.primitive, "decimal");
        assert!(byte.is_integer_derived());
        assert!(byte.is_derived_from("long"));
        assert!(!byte.is_derived_from("unsignedLong"));
        assert_eq!(get_builtin_type("token").unwrap().primitive, "string");
    }

    #[test]
    fn test_implied_facets_chain() {
        let positive = get_builtin_type("positiveInteger").unwrap();
        let implied = positive.implied_facets_chain();
        assert!(implied.contains(&(FacetKind::MinInclusive, "1")));
        assert!(implied.contains(&(FacetKind::FractionDigits, "0")));
        assert!(!implied.contains(&(FacetKind::MinInclusive, "0")));

        let nmtokens = get_builtin_type("NMTOKENS").unwrap();
        assert_eq!(nmtokens.implied_facets_chain(), vec![(FacetKind::MinLength, "1")]);
    }

    #[test]
    fn test_fundamental_facets() {
        let decimal = get_builtin_type("decimal").unwrap();
        assert_eq!(decimal.ordered, Ordered::Total);
        assert!(decimal.numeric);
        let date = get_builtin_type("date").unwrap();
        assert_eq!(date.ordered, Ordered::Partial);
        let string = get_builtin_type("string").unwrap();
        assert_eq!(string.ordered, Ordered::None);
        assert_eq!(get_builtin_type("int").unwrap().cardinality, Cardinality::Finite);
    }

    #[test]
    fn test_admitted_facets() {
        let string = get_builtin_type("string").unwrap();
        assert!(string.admits_facet(FacetKind::MaxLength));
        assert!(!string.admits_facet(FacetKind::MinInclusive));
        let decimal = get_builtin_type("decimal").unwrap();
        assert!(decimal.admits_facet(FacetKind::TotalDigits));
        assert!(!decimal.admits_facet(FacetKind::Length));
        let boolean = get_builtin_type("boolean").unwrap();
        assert!(!boolean.admits_facet(FacetKind::Enumeration));
        let float = get_builtin_type("float").unwrap();
        assert!(!float.admits_facet(FacetKind::TotalDigits));
        let idrefs = get_builtin_type("IDREFS").unwrap();
        assert!(idrefs.admits_facet(FacetKind::Length));
        assert!(!idrefs.admits_facet(FacetKind::MaxInclusive));
    }

    #[test]
    fn test_validate_builtin() {
        assert!(validate_builtin("int", " 42 ").is_ok());
        assert!(validate_builtin("int", "4.2").is_err());
        assert!(validate_builtin("NMTOKENS", "a b  c").is_ok());
        assert!(validate_builtin("NMTOKENS", "   ").is_err());
        assert!(validate_builtin("string", "  anything\t").is_ok());
        assert!(validate_builtin("nope", "x").is_err());
    }
}
