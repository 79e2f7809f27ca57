//! XSD Simple Type definitions
//!
//! A user-defined simple type is exactly one of a restriction, a list or a
//! union; the variety follows from that choice (a restriction inherits the
//! variety of its base). The checks here cover the type-level rules of
//! simple type definitions. Facets are handed to the facet engine in
//! [`super::restrictions`].
//!
//! See: https://www.w3.org/TR/xmlschema-1/#Simple_Type_Definitions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::names::validate_ncname;
use crate::namespaces::QName;

use super::builtins::XSD_NOTATION;
use super::facets::{FacetEntry, FacetKind};
use super::globals::Context;
use super::restrictions::check_restriction_facets;
use super::types::{DerivationMethod, DerivationSet, TypeHandle, TypeKey, Variety};

// =============================================================================
// Model
// =============================================================================

/// Reference to a simple type: by name or an anonymous inline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimpleTypeRef {
    /// Reference by name
    Named(QName),
    /// Anonymous inline definition
    Inline(Box<SimpleType>),
}

impl From<QName> for SimpleTypeRef {
    fn from(name: QName) -> Self {
        SimpleTypeRef::Named(name)
    }
}

impl From<SimpleType> for SimpleTypeRef {
    fn from(st: SimpleType) -> Self {
        SimpleTypeRef::Inline(Box::new(st))
    }
}

/// How a simple type is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variety", rename_all = "snake_case")]
pub enum SimpleDerivation {
    /// `xs:restriction`: base plus facets in source order
    Restriction {
        /// Base type
        base: SimpleTypeRef,
        /// Constraining facets
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        facets: Vec<FacetEntry>,
    },
    /// `xs:list`
    List {
        /// Item type
        item_type: SimpleTypeRef,
    },
    /// `xs:union`
    Union {
        /// `memberTypes` attribute
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        member_types: Vec<QName>,
        /// Inline member definitions
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        inline_types: Vec<SimpleType>,
    },
}

/// A user-defined simple type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleType {
    /// Type name; `None` for anonymous types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<QName>,
    /// Construction
    #[serde(flatten)]
    pub derivation: SimpleDerivation,
    /// `final`
    #[serde(default, rename = "final", skip_serializing_if = "DerivationSet::is_empty")]
    pub final_: DerivationSet,
}

impl SimpleType {
    /// Restriction of `base`
    pub fn restriction(base: impl Into<SimpleTypeRef>, facets: Vec<FacetEntry>) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::Restriction {
                base: base.into(),
                facets,
            },
            final_: DerivationSet::EMPTY,
        }
    }

    /// List of `item_type`
    pub fn list(item_type: impl Into<SimpleTypeRef>) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::List {
                item_type: item_type.into(),
            },
            final_: DerivationSet::EMPTY,
        }
    }

    /// Union of named members
    pub fn union(member_types: Vec<QName>) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::Union {
                member_types,
                inline_types: Vec::new(),
            },
            final_: DerivationSet::EMPTY,
        }
    }

    /// Builder-style name
    pub fn named(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Builder-style `final`
    pub fn with_final(mut self, final_: DerivationSet) -> Self {
        self.final_ = final_;
        self
    }

    /// Facets of a restriction; empty for lists and unions
    pub fn facets(&self) -> &[FacetEntry] {
        match &self.derivation {
            SimpleDerivation::Restriction { facets, .. } => facets,
            _ => &[],
        }
    }

    /// Name for diagnostics
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("simple type '{}'", name),
            None => "anonymous simple type".to_string(),
        }
    }
}

// =============================================================================
// Simple type checks
// =============================================================================

/// Check a simple type definition, global or inline
pub fn check_simple_type(cx: &Context<'_>, st: &SimpleType, errors: &mut Vec<SchemaError>) {
    if let Some(name) = &st.name {
        if let Err(e) = validate_ncname(&name.local_name) {
            errors.push(schema_error(ErrorKind::InvalidName, e.to_string()));
        }
    }
    let mut found = Vec::new();
    match &st.derivation {
        SimpleDerivation::Restriction { base, facets } => check_restriction(cx, st, base, facets, &mut found),
        SimpleDerivation::List { item_type } => check_list(cx, st, item_type, &mut found),
        SimpleDerivation::Union {
            member_types,
            inline_types,
        } => check_union(cx, st, member_types, inline_types, &mut found),
    }
    if st.name.is_some() {
        errors.extend(found);
    } else {
        errors.extend(found.into_iter().map(|e| e.in_context(st.display_name())));
    }
}

fn check_inline(cx: &Context<'_>, type_ref: &SimpleTypeRef, errors: &mut Vec<SchemaError>) {
    if let SimpleTypeRef::Inline(inline) = type_ref {
        check_simple_type(cx, inline, errors);
    }
}

fn check_restriction(
    cx: &Context<'_>,
    st: &SimpleType,
    base: &SimpleTypeRef,
    facets: &[FacetEntry],
    errors: &mut Vec<SchemaError>,
) {
    check_inline(cx, base, errors);
    let Some(base_type) = cx.schema.resolve_simple_ref(base) else {
        errors.push(schema_error(
            ErrorKind::NotFound,
            format!("base type '{}' of {} not found", ref_name(base), st.display_name()),
        ));
        return;
    };

    if base_type.is_any_type() {
        errors.push(schema_error(
            ErrorKind::SimpleTypeBaseInvalid,
            format!("{} may not restrict xs:anyType", st.display_name()),
        ));
        return;
    }
    if base_type.is_complex() {
        errors.push(schema_error(
            ErrorKind::SimpleTypeBaseInvalid,
            format!(
                "base {} of {} is a complex type",
                base_type.display_name(),
                st.display_name()
            ),
        ));
        return;
    }
    if base_type.is_any_simple_type() && !facets.is_empty() {
        errors.push(schema_error(
            ErrorKind::SimpleTypeBaseInvalid,
            format!("{} restricts xs:anySimpleType with facets", st.display_name()),
        ));
        return;
    }
    if base_type.final_set().contains(DerivationMethod::Restriction) {
        errors.push(schema_error(
            ErrorKind::FinalViolation,
            format!(
                "base {} of {} is final for restriction",
                base_type.display_name(),
                st.display_name()
            ),
        ));
    }
    if TypeHandle::Simple(st).has_circular_base(cx.schema) {
        errors.push(schema_error(
            ErrorKind::CircularDerivation,
            format!("circular derivation of {}", st.display_name()),
        ));
        return;
    }

    if matches!(base_type, TypeHandle::Builtin(b) if b.name == XSD_NOTATION) {
        check_notation_enumeration(cx, st, facets, errors);
    }

    check_restriction_facets(cx, base_type, facets, errors);
}

fn check_list(cx: &Context<'_>, st: &SimpleType, item_type: &SimpleTypeRef, errors: &mut Vec<SchemaError>) {
    check_inline(cx, item_type, errors);
    let Some(item) = cx.schema.resolve_simple_ref(item_type) else {
        errors.push(schema_error(
            ErrorKind::NotFound,
            format!("item type '{}' of {} not found", ref_name(item_type), st.display_name()),
        ));
        return;
    };
    if !item.is_simple() {
        errors.push(schema_error(
            ErrorKind::SimpleTypeBaseInvalid,
            format!("item type {} of {} is not a simple type", item.display_name(), st.display_name()),
        ));
        return;
    }
    match item.variety(cx.schema) {
        Some(Variety::List) => errors.push(schema_error(
            ErrorKind::SimpleTypeBaseInvalid,
            format!("item type {} of {} is itself a list", item.display_name(), st.display_name()),
        )),
        None if item.has_circular_base(cx.schema) => errors.push(schema_error(
            ErrorKind::CircularDerivation,
            format!("item type {} of {} has a circular derivation", item.display_name(), st.display_name()),
        )),
        _ => {}
    }
    if item.final_set().contains(DerivationMethod::List) {
        errors.push(schema_error(
            ErrorKind::FinalViolation,
            format!("item type {} of {} is final for list", item.display_name(), st.display_name()),
        ));
    }
}

fn check_union(
    cx: &Context<'_>,
    st: &SimpleType,
    member_types: &[QName],
    inline_types: &[SimpleType],
    errors: &mut Vec<SchemaError>,
) {
    if member_types.is_empty() && inline_types.is_empty() {
        errors.push(schema_error(
            ErrorKind::SimpleTypeBaseInvalid,
            format!("{} has no member types", st.display_name()),
        ));
        return;
    }
    for inline in inline_types {
        check_simple_type(cx, inline, errors);
    }

    let mut members = Vec::new();
    for name in member_types {
        match cx.schema.lookup_type(name) {
            Some(member) => members.push(member),
            None => errors.push(schema_error(
                ErrorKind::NotFound,
                format!("member type '{}' of {} not found", name, st.display_name()),
            )),
        }
    }
    members.extend(inline_types.iter().map(TypeHandle::Simple));

    for member in &members {
        if !member.is_simple() {
            errors.push(schema_error(
                ErrorKind::SimpleTypeBaseInvalid,
                format!("member type {} of {} is not a simple type", member.display_name(), st.display_name()),
            ));
            continue;
        }
        if member.final_set().contains(DerivationMethod::Union) {
            errors.push(schema_error(
                ErrorKind::FinalViolation,
                format!("member type {} of {} is final for union", member.display_name(), st.display_name()),
            ));
        }
    }

    let own = TypeHandle::Simple(st).key();
    let mut seen = HashSet::new();
    if members.iter().any(|m| union_reaches(cx, *m, &own, &mut seen)) {
        errors.push(schema_error(
            ErrorKind::CircularDerivation,
            format!("{} is a member of itself", st.display_name()),
        ));
    }
}

/// Check whether a member type leads back to `target` through union
/// membership or its base chain
fn union_reaches(cx: &Context<'_>, member: TypeHandle<'_>, target: &TypeKey, seen: &mut HashSet<TypeKey>) -> bool {
    for t in member.ancestors(cx.schema) {
        let key = t.key();
        if &key == target {
            return true;
        }
        if !seen.insert(key) {
            tracing::trace!(key = ?t.key(), "union membership already visited");
            return false;
        }
        if t.variety(cx.schema) == Some(Variety::Union) {
            return t
                .member_types(cx.schema)
                .into_iter()
                .any(|m| union_reaches(cx, m, target, seen));
        }
    }
    false
}

/// A restriction whose direct base is xs:NOTATION needs enumerations that
/// name declared notations
fn check_notation_enumeration(cx: &Context<'_>, st: &SimpleType, facets: &[FacetEntry], errors: &mut Vec<SchemaError>) {
    let enumerations: Vec<_> = facets
        .iter()
        .filter_map(|entry| entry.to_facet().ok())
        .filter(|f| f.kind == FacetKind::Enumeration)
        .collect();
    if enumerations.is_empty() {
        errors.push(schema_error(
            ErrorKind::NotationEnumeration,
            format!("{} restricts xs:NOTATION without an enumeration", st.display_name()),
        ));
        return;
    }
    for facet in enumerations {
        let resolved = if facet.namespaces.is_empty() {
            cx.schema.namespaces.resolve(&facet.value)
        } else {
            facet.namespaces.resolve(&facet.value)
        };
        match resolved {
            Ok(name) if cx.schema.notations.contains_key(&name) => {}
            Ok(name) => errors.push(schema_error(
                ErrorKind::NotationEnumeration,
                format!("enumeration '{}' of {} names undeclared notation '{}'", facet.value, st.display_name(), name),
            )),
            Err(e) => errors.push(schema_error(
                ErrorKind::NotationEnumeration,
                format!("enumeration '{}' of {}: {}", facet.value, st.display_name(), e),
            )),
        }
    }
}

fn ref_name(type_ref: &SimpleTypeRef) -> String {
    match type_ref {
        SimpleTypeRef::Named(name) => name.to_string(),
        SimpleTypeRef::Inline(_) => "anonymous".to_string(),
    }
}
