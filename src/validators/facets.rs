//! XSD Facets
//!
//! Constraining facets as they appear on a simple-type restriction. A facet
//! keeps its lexical form; its typed value is bound by the facet engine once
//! the base type is known. Facets whose base could not be resolved by the
//! parser arrive as [`DeferredFacet`]s and are bound the same way.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::values::Value;
use crate::error::{schema_error, Error, ErrorKind, Result, SchemaError};
use crate::namespaces::NamespaceContext;

/// White space handling mode; ordered from least to most restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from string value
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(Error::Value(format!(
                "Invalid whiteSpace value: '{}'. Must be 'preserve', 'replace', or 'collapse'",
                s
            ))),
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s
                .split(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for WhiteSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhiteSpace::Preserve => f.write_str("preserve"),
            WhiteSpace::Replace => f.write_str("replace"),
            WhiteSpace::Collapse => f.write_str("collapse"),
        }
    }
}

/// Kind of a constraining facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacetKind {
    /// length
    Length,
    /// minLength
    MinLength,
    /// maxLength
    MaxLength,
    /// pattern
    Pattern,
    /// enumeration
    Enumeration,
    /// whiteSpace
    WhiteSpace,
    /// maxInclusive
    MaxInclusive,
    /// maxExclusive
    MaxExclusive,
    /// minInclusive
    MinInclusive,
    /// minExclusive
    MinExclusive,
    /// totalDigits
    TotalDigits,
    /// fractionDigits
    FractionDigits,
}

impl FacetKind {
    /// All XSD 1.0 facet kinds
    pub const ALL: [FacetKind; 12] = [
        FacetKind::Length,
        FacetKind::MinLength,
        FacetKind::MaxLength,
        FacetKind::Pattern,
        FacetKind::Enumeration,
        FacetKind::WhiteSpace,
        FacetKind::MaxInclusive,
        FacetKind::MaxExclusive,
        FacetKind::MinInclusive,
        FacetKind::MinExclusive,
        FacetKind::TotalDigits,
        FacetKind::FractionDigits,
    ];

    /// Facet element name
    pub fn name(&self) -> &'static str {
        match self {
            FacetKind::Length => "length",
            FacetKind::MinLength => "minLength",
            FacetKind::MaxLength => "maxLength",
            FacetKind::Pattern => "pattern",
            FacetKind::Enumeration => "enumeration",
            FacetKind::WhiteSpace => "whiteSpace",
            FacetKind::MaxInclusive => "maxInclusive",
            FacetKind::MaxExclusive => "maxExclusive",
            FacetKind::MinInclusive => "minInclusive",
            FacetKind::MinExclusive => "minExclusive",
            FacetKind::TotalDigits => "totalDigits",
            FacetKind::FractionDigits => "fractionDigits",
        }
    }

    /// Look a facet up by element name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// min/max Inclusive/Exclusive
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FacetKind::MinInclusive | FacetKind::MinExclusive | FacetKind::MaxInclusive | FacetKind::MaxExclusive
        )
    }

    /// length, minLength, maxLength
    pub fn is_length(&self) -> bool {
        matches!(self, FacetKind::Length | FacetKind::MinLength | FacetKind::MaxLength)
    }

    /// totalDigits, fractionDigits
    pub fn is_digits(&self) -> bool {
        matches!(self, FacetKind::TotalDigits | FacetKind::FractionDigits)
    }

    /// Whether the facet may appear more than once on a restriction
    pub fn is_repeatable(&self) -> bool {
        matches!(self, FacetKind::Pattern | FacetKind::Enumeration)
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed value of a facet, bound against the base type
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FacetValue {
    /// Not bound yet
    #[default]
    Unbound,
    /// Non-negative integer of a length or digits facet
    Count(u64),
    /// Value of a range facet on an ordered primitive
    Ordered(Value),
    /// whiteSpace mode
    WhiteSpace(WhiteSpace),
    /// Translated regular expression of a pattern
    Pattern(String),
    /// Enumeration member, normalized per the base's whiteSpace
    Lexical(String),
}

/// A constraining facet with its original lexical form.
///
/// Equality ignores the bound value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facet {
    /// Facet kind
    pub kind: FacetKind,
    /// Lexical form as written in the schema
    pub value: String,
    /// `fixed="true"` on the facet
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fixed: bool,
    /// In-scope namespaces (for NOTATION/QName enumerations)
    #[serde(default, skip_serializing_if = "NamespaceContext::is_empty")]
    pub namespaces: NamespaceContext,
    /// Typed value, bound by the facet engine
    #[serde(skip)]
    pub typed: FacetValue,
}

impl PartialEq for Facet {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.value == other.value
            && self.fixed == other.fixed
            && self.namespaces == other.namespaces
    }
}

impl Facet {
    /// Create a new unbound facet
    pub fn new(kind: FacetKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            fixed: false,
            namespaces: NamespaceContext::new(),
            typed: FacetValue::Unbound,
        }
    }

    /// Builder-style `fixed` flag
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Builder-style namespace context
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Non-negative integer value of a length or digits facet
    pub fn count(&self) -> Option<u64> {
        match self.typed {
            FacetValue::Count(n) => Some(n),
            _ => self.value.trim().parse().ok(),
        }
    }
}

/// A facet whose base type was not resolvable at parse time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredFacet {
    /// Facet element name
    pub name: String,
    /// Lexical value
    pub value: String,
    /// `fixed="true"` on the facet
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fixed: bool,
    /// In-scope namespaces
    #[serde(default, skip_serializing_if = "NamespaceContext::is_empty")]
    pub namespaces: NamespaceContext,
}

impl DeferredFacet {
    /// Create a new deferred facet
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            fixed: false,
            namespaces: NamespaceContext::new(),
        }
    }

    /// Convert to an unbound facet; unknown facet names are applicability errors
    pub fn bind(&self) -> std::result::Result<Facet, SchemaError> {
        let kind = FacetKind::from_name(&self.name).ok_or_else(|| {
            schema_error(
                ErrorKind::FacetApplicability,
                format!("unknown facet '{}'", self.name),
            )
        })?;
        Ok(Facet {
            kind,
            value: self.value.clone(),
            fixed: self.fixed,
            namespaces: self.namespaces.clone(),
            typed: FacetValue::Unbound,
        })
    }
}

/// A facet on a restriction: bound or deferred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetEntry {
    /// Facet with a known kind
    Typed(Facet),
    /// Facet still waiting for its base type
    Deferred(DeferredFacet),
}

impl FacetEntry {
    /// Facet element name
    pub fn name(&self) -> &str {
        match self {
            FacetEntry::Typed(f) => f.kind.name(),
            FacetEntry::Deferred(d) => &d.name,
        }
    }

    /// Check for a deferred facet
    pub fn is_deferred(&self) -> bool {
        matches!(self, FacetEntry::Deferred(_))
    }

    /// The facet as a typed (possibly unbound) facet
    pub fn to_facet(&self) -> std::result::Result<Facet, SchemaError> {
        match self {
            FacetEntry::Typed(f) => Ok(f.clone()),
            FacetEntry::Deferred(d) => d.bind(),
        }
    }
}

impl From<Facet> for FacetEntry {
    fn from(facet: Facet) -> Self {
        FacetEntry::Typed(facet)
    }
}

impl From<DeferredFacet> for FacetEntry {
    fn from(facet: DeferredFacet) -> Self {
        FacetEntry::Deferred(facet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_space_from_str() {
        assert_eq!(WhiteSpace::from_str("preserve").unwrap(), WhiteSpace::Preserve);
        assert_eq!(WhiteSpace::from_str("collapse").unwrap(), WhiteSpace::Collapse);
        assert!(WhiteSpace::from_str("invalid").is_err());
    }

    #[test]
    fn test_white_space_normalize() {
        assert_eq!(WhiteSpace::Preserve.normalize("a\tb"), "a\tb");
        assert_eq!(WhiteSpace::Replace.normalize("a\tb\nc"), "a b c");
        assert_eq!(WhiteSpace::Collapse.normalize("  a \t\n b  "), "a b");
    }

    #[test]
    fn test_white_space_order() {
        assert!(WhiteSpace::Preserve < WhiteSpace::Replace);
        assert!(WhiteSpace::Replace < WhiteSpace::Collapse);
    }

    #[test]
    fn test_facet_kind_names() {
        for kind in FacetKind::ALL {
            assert_eq!(FacetKind::from_name(kind.name()), Some(kind));
        }
        assert!(FacetKind::MinExclusive.is_range());
        assert!(FacetKind::Length.is_length());
        assert!(FacetKind::FractionDigits.is_digits());
        assert_eq!(FacetKind::from_name("assertion"), None);
    }

    #[test]
    fn test_deferred_bind() {
        let facet = DeferredFacet::new("maxLength", "5").bind().unwrap();
        assert_eq!(facet.kind, FacetKind::MaxLength);
        assert_eq!(facet.count(), Some(5));
        let err = DeferredFacet::new("explicitTimezone", "required").bind().unwrap_err();
        assert_eq!(err.kind, ErrorKind::FacetApplicability);
    }

    #[test]
    fn test_facet_entry_json() {
        let entries: Vec<FacetEntry> = serde_json::from_str(
            r#"[{"kind": "minInclusive", "value": "1"}, {"name": "maxInclusive", "value": "9"}]"#,
        )
        .unwrap();
        assert!(!entries[0].is_deferred());
        assert!(entries[1].is_deferred());
        assert_eq!(entries[1].name(), "maxInclusive");
    }
}
