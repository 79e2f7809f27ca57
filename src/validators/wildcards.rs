//! XSD Wildcard components
//!
//! This module implements wildcards for XSD element and attribute content:
//! - xs:any - allows any element from specified namespaces
//! - xs:anyAttribute - allows any attribute from specified namespaces
//!
//! The namespace-constraint algebra (subset, intersection, union) is shared by
//! particle derivation, UPA and attribute-wildcard aggregation.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Wildcards

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::particles::Occurrence;
use crate::error::{schema_error, ErrorKind, SchemaError};

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessContents {
    /// Validate strictly - element/attribute must be declared
    #[default]
    Strict,
    /// Validate if declaration found, otherwise accept
    Lax,
    /// Skip validation entirely
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    fn strength(&self) -> u8 {
        match self {
            Self::Strict => 2,
            Self::Lax => 1,
            Self::Skip => 0,
        }
    }

    /// Check if this is a valid restriction of another process contents
    /// (`strict > lax > skip`)
    pub fn is_restriction_of(&self, other: &Self) -> bool {
        self.strength() >= other.strength()
    }
}

impl fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lax => write!(f, "lax"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Namespace constraint of a wildcard.
///
/// `Other(T)` is XSD 1.0 `##other`: every namespace except `T` and the absent
/// namespace. The empty string stands for "no namespace" throughout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceConstraint {
    /// `##any`
    Any,
    /// `##other` relative to the given target namespace
    Other(String),
    /// `##targetNamespace`
    TargetNamespace(String),
    /// `##local`
    Local,
    /// An explicit list of namespaces ("" = no namespace)
    List(Vec<String>),
}

impl Default for NamespaceConstraint {
    fn default() -> Self {
        Self::Any
    }
}

/// Set-theoretic form used by the algebra: either an explicit set of
/// namespaces or the complement of one.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NsSet {
    Only(BTreeSet<String>),
    AllBut(BTreeSet<String>),
}

impl NamespaceConstraint {
    /// Create from the source value of a `namespace` attribute
    pub fn from_namespace_attr(value: &str, target_namespace: &str) -> Result<Self, SchemaError> {
        let value = value.trim();
        match value {
            "##any" => Ok(Self::Any),
            "##other" => Ok(Self::Other(target_namespace.to_string())),
            "##targetNamespace" => Ok(Self::TargetNamespace(target_namespace.to_string())),
            "##local" => Ok(Self::Local),
            _ => {
                let mut namespaces = Vec::new();
                for ns in value.split_whitespace() {
                    let ns = match ns {
                        "##local" => "",
                        "##targetNamespace" => target_namespace,
                        s if s.starts_with("##") => {
                            return Err(schema_error(
                                ErrorKind::WildcardDerivation,
                                format!("wrong value '{}' in 'namespace' attribute", s),
                            ));
                        }
                        uri => uri,
                    };
                    if !namespaces.iter().any(|n| n == ns) {
                        namespaces.push(ns.to_string());
                    }
                }
                Ok(Self::List(namespaces))
            }
        }
    }

    /// Check if a namespace satisfies this constraint
    pub fn is_allowed(&self, namespace: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Other(tns) => namespace != tns && !namespace.is_empty(),
            Self::TargetNamespace(tns) => namespace == tns,
            Self::Local => namespace.is_empty(),
            Self::List(list) => list.iter().any(|ns| ns == namespace),
        }
    }

    /// Check if no namespace at all is allowed
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::List(list) if list.is_empty())
    }

    fn to_set(&self) -> NsSet {
        match self {
            Self::Any => NsSet::AllBut(BTreeSet::new()),
            Self::Other(tns) => {
                let mut excluded = BTreeSet::new();
                excluded.insert(tns.clone());
                excluded.insert(String::new());
                NsSet::AllBut(excluded)
            }
            Self::TargetNamespace(tns) => NsSet::Only(std::iter::once(tns.clone()).collect()),
            Self::Local => NsSet::Only(std::iter::once(String::new()).collect()),
            Self::List(list) => NsSet::Only(list.iter().cloned().collect()),
        }
    }

    /// Convert back; complements other than `##other` are not expressible.
    fn from_set(set: NsSet) -> Option<Self> {
        match set {
            NsSet::Only(only) => {
                if only.len() == 1 && only.contains("") {
                    Some(Self::Local)
                } else {
                    Some(Self::List(only.into_iter().collect()))
                }
            }
            NsSet::AllBut(excluded) => {
                if excluded.is_empty() {
                    return Some(Self::Any);
                }
                if !excluded.contains("") {
                    return None;
                }
                match excluded.len() {
                    1 => Some(Self::Other(String::new())),
                    2 => excluded
                        .into_iter()
                        .find(|ns| !ns.is_empty())
                        .map(Self::Other),
                    _ => None,
                }
            }
        }
    }

    /// Check if every namespace satisfying `self` also satisfies `other`
    pub fn is_subset(&self, other: &Self) -> bool {
        match (self.to_set(), other.to_set()) {
            (NsSet::Only(a), _) => a.iter().all(|ns| other.is_allowed(ns)),
            (NsSet::AllBut(_), NsSet::Only(_)) => false,
            (NsSet::AllBut(a), NsSet::AllBut(b)) => b.is_subset(&a),
        }
    }

    /// Check semantic equality of two constraints
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.is_subset(other) && other.is_subset(self)
    }

    /// Intersection of two constraints; `None` when not expressible
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.is_subset(other) {
            return Some(self.clone());
        }
        if other.is_subset(self) {
            return Some(other.clone());
        }
        let set = match (self.to_set(), other.to_set()) {
            (NsSet::Only(a), NsSet::Only(b)) => NsSet::Only(a.intersection(&b).cloned().collect()),
            (NsSet::Only(a), NsSet::AllBut(b)) | (NsSet::AllBut(b), NsSet::Only(a)) => {
                NsSet::Only(a.difference(&b).cloned().collect())
            }
            (NsSet::AllBut(a), NsSet::AllBut(b)) => NsSet::AllBut(a.union(&b).cloned().collect()),
        };
        Self::from_set(set)
    }

    /// Union of two constraints; `None` when not expressible
    pub fn union(&self, other: &Self) -> Option<Self> {
        if self.is_subset(other) {
            return Some(other.clone());
        }
        if other.is_subset(self) {
            return Some(self.clone());
        }
        let set = match (self.to_set(), other.to_set()) {
            (NsSet::Only(a), NsSet::Only(b)) => NsSet::Only(a.union(&b).cloned().collect()),
            (NsSet::Only(a), NsSet::AllBut(b)) | (NsSet::AllBut(b), NsSet::Only(a)) => {
                NsSet::AllBut(b.difference(&a).cloned().collect())
            }
            (NsSet::AllBut(a), NsSet::AllBut(b)) => {
                NsSet::AllBut(a.intersection(&b).cloned().collect())
            }
        };
        Self::from_set(set)
    }

    /// Check whether some namespace satisfies both constraints
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self.to_set(), other.to_set()) {
            (NsSet::AllBut(_), NsSet::AllBut(_)) => true,
            (NsSet::Only(a), _) => a.iter().any(|ns| other.is_allowed(ns)),
            (_, NsSet::Only(b)) => b.iter().any(|ns| self.is_allowed(ns)),
        }
    }
}

impl fmt::Display for NamespaceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("##any"),
            Self::Other(tns) => write!(f, "##other (not '{}')", tns),
            Self::TargetNamespace(tns) => write!(f, "##targetNamespace ('{}')", tns),
            Self::Local => f.write_str("##local"),
            Self::List(list) => {
                let items: Vec<&str> = list
                    .iter()
                    .map(|ns| if ns.is_empty() { "##local" } else { ns.as_str() })
                    .collect();
                write!(f, "[{}]", items.join(" "))
            }
        }
    }
}

/// A wildcard: namespace constraint plus process contents.
///
/// Used directly for `xs:anyAttribute` and inside [`AnyElement`] for `xs:any`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Wildcard {
    /// Allowed namespaces
    #[serde(default)]
    pub namespace: NamespaceConstraint,
    /// Process contents mode
    #[serde(default)]
    pub process_contents: ProcessContents,
}

impl Wildcard {
    /// Create a new wildcard
    pub fn new(namespace: NamespaceConstraint, process_contents: ProcessContents) -> Self {
        Self {
            namespace,
            process_contents,
        }
    }

    /// Strict `##any` wildcard
    pub fn any() -> Self {
        Self::default()
    }

    /// Check if a namespace is allowed
    pub fn is_namespace_allowed(&self, namespace: &str) -> bool {
        self.namespace.is_allowed(namespace)
    }

    /// Check that `self` is a valid restriction of `base`:
    /// namespace subset and process contents equal or stronger.
    pub fn check_restriction_of(&self, base: &Wildcard, kind: ErrorKind) -> Result<(), SchemaError> {
        if !self.namespace.is_subset(&base.namespace) {
            return Err(schema_error(
                kind,
                format!(
                    "wildcard namespace {} is not a subset of base wildcard namespace {}",
                    self.namespace, base.namespace
                ),
            ));
        }
        if !self.process_contents.is_restriction_of(&base.process_contents) {
            return Err(schema_error(
                kind,
                format!(
                    "processContents '{}' is weaker than base processContents '{}'",
                    self.process_contents, base.process_contents
                ),
            ));
        }
        Ok(())
    }

    /// Intersect with another wildcard; process contents are taken from `self`
    pub fn intersection(&self, other: &Wildcard) -> Result<Wildcard, SchemaError> {
        self.namespace
            .intersection(&other.namespace)
            .map(|namespace| Wildcard::new(namespace, self.process_contents))
            .ok_or_else(|| {
                schema_error(
                    ErrorKind::AnyAttributeDerivation,
                    format!(
                        "intersection of wildcards {} and {} is not expressible",
                        self.namespace, other.namespace
                    ),
                )
            })
    }

    /// Union with another wildcard; process contents are taken from `self`
    pub fn union(&self, other: &Wildcard) -> Result<Wildcard, SchemaError> {
        self.namespace
            .union(&other.namespace)
            .map(|namespace| Wildcard::new(namespace, self.process_contents))
            .ok_or_else(|| {
                schema_error(
                    ErrorKind::AnyAttributeDerivation,
                    format!(
                        "union of wildcards {} and {} is not expressible",
                        self.namespace, other.namespace
                    ),
                )
            })
    }
}

/// Element wildcard particle (`xs:any`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AnyElement {
    /// Namespace constraint and process contents
    #[serde(flatten)]
    pub wildcard: Wildcard,
    /// Occurrence bounds
    #[serde(flatten)]
    pub occurs: Occurrence,
}

impl AnyElement {
    /// Create a new element wildcard
    pub fn new(wildcard: Wildcard, occurs: Occurrence) -> Self {
        Self { wildcard, occurs }
    }

    /// Check if an element namespace matches
    pub fn is_namespace_allowed(&self, namespace: &str) -> bool {
        self.wildcard.is_namespace_allowed(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> NamespaceConstraint {
        NamespaceConstraint::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_process_contents_restriction() {
        assert!(ProcessContents::Strict.is_restriction_of(&ProcessContents::Lax));
        assert!(ProcessContents::Lax.is_restriction_of(&ProcessContents::Skip));
        assert!(ProcessContents::Skip.is_restriction_of(&ProcessContents::Skip));
        assert!(!ProcessContents::Skip.is_restriction_of(&ProcessContents::Strict));
        assert!(!ProcessContents::Lax.is_restriction_of(&ProcessContents::Strict));
    }

    #[test]
    fn test_namespace_attr_parsing() {
        let tns = "urn:t";
        assert_eq!(NamespaceConstraint::from_namespace_attr("##any", tns).unwrap(), NamespaceConstraint::Any);
        assert_eq!(
            NamespaceConstraint::from_namespace_attr("##other", tns).unwrap(),
            NamespaceConstraint::Other(tns.to_string())
        );
        assert_eq!(
            NamespaceConstraint::from_namespace_attr("##local urn:a ##targetNamespace", tns).unwrap(),
            list(&["", "urn:a", "urn:t"])
        );
        assert!(NamespaceConstraint::from_namespace_attr("##bogus", tns).is_err());
    }

    #[test]
    fn test_namespace_constraint_other() {
        let other = NamespaceConstraint::Other("urn:t".to_string());
        assert!(other.is_allowed("urn:a"));
        assert!(!other.is_allowed("urn:t"));
        assert!(!other.is_allowed(""));
    }

    #[test]
    fn test_subset() {
        let any = NamespaceConstraint::Any;
        let other_t = NamespaceConstraint::Other("urn:t".to_string());
        let other_empty = NamespaceConstraint::Other(String::new());
        let tns = NamespaceConstraint::TargetNamespace("urn:t".to_string());

        assert!(other_t.is_subset(&any));
        assert!(!any.is_subset(&other_t));
        assert!(other_t.is_subset(&other_empty));
        assert!(!other_t.is_subset(&NamespaceConstraint::Other("urn:u".to_string())));
        assert!(!other_t.is_subset(&list(&["urn:a"])));
        assert!(list(&["urn:a", "urn:b"]).is_subset(&other_t));
        assert!(!list(&["urn:t"]).is_subset(&other_t));
        assert!(tns.is_subset(&list(&["urn:t", ""])));
        assert!(NamespaceConstraint::Local.is_subset(&list(&[""])));
    }

    #[test]
    fn test_intersection() {
        let any = NamespaceConstraint::Any;
        let other_t = NamespaceConstraint::Other("urn:t".to_string());
        let c = list(&["urn:a", "urn:t"]);

        assert_eq!(any.intersection(&c), Some(c.clone()));
        assert_eq!(c.intersection(&c), Some(c.clone()));
        assert_eq!(other_t.intersection(&c), Some(list(&["urn:a"])));
        assert_eq!(
            other_t.intersection(&NamespaceConstraint::Other("urn:u".to_string())),
            None
        );
        let disjoint = list(&["urn:x"]).intersection(&list(&["urn:y"])).unwrap();
        assert!(disjoint.is_empty());
    }

    #[test]
    fn test_union() {
        let other_t = NamespaceConstraint::Other("urn:t".to_string());
        let tns = NamespaceConstraint::TargetNamespace("urn:t".to_string());

        let u = other_t.union(&tns).unwrap();
        assert!(other_t.is_subset(&u));
        assert_eq!(u, NamespaceConstraint::Other(String::new()));
        assert_eq!(other_t.union(&NamespaceConstraint::Local), None);
        assert_eq!(
            other_t.union(&list(&["", "urn:t"])),
            Some(NamespaceConstraint::Any)
        );
        assert_eq!(
            list(&["urn:a"]).union(&list(&["urn:b"])),
            Some(list(&["urn:a", "urn:b"]))
        );
    }

    #[test]
    fn test_overlaps() {
        let other_t = NamespaceConstraint::Other("urn:t".to_string());
        assert!(other_t.overlaps(&NamespaceConstraint::Any));
        assert!(!other_t.overlaps(&NamespaceConstraint::Local));
        assert!(list(&["urn:a"]).overlaps(&other_t));
    }

    #[test]
    fn test_wildcard_restriction() {
        let base = Wildcard::new(NamespaceConstraint::Any, ProcessContents::Lax);
        let derived = Wildcard::new(list(&["urn:a"]), ProcessContents::Strict);
        assert!(derived.check_restriction_of(&base, ErrorKind::WildcardDerivation).is_ok());
        let err = base
            .check_restriction_of(&derived, ErrorKind::WildcardDerivation)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::WildcardDerivation);
    }
}
