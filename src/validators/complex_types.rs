//! XSD Complex Type Validators
//!
//! This module implements complex type definitions for XSD schemas.
//! Complex types can have element content (model groups), simple content,
//! or mixed content with both text and elements.
//!
//! The type engine checks the content structure of each definition against
//! its base (simpleContent vs complexContent compatibility, `final`, mixed
//! content), then its attribute uses, then Element Declarations Consistent
//! and UPA on the effective content model.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Complex_Type_Definitions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::names::validate_ncname;
use crate::namespaces::QName;

use super::attributes::{check_type_attributes, AttributeDecl};
use super::derivations::check_particle_restriction;
use super::facets::FacetEntry;
use super::globals::{Context, Schema};
use super::groups::{check_particle, effective_occurrence, is_emptiable, GroupKind, ModelGroup};
use super::models::{check_element_consistency, check_upa};
use super::particles::{Occurrence, Particle};
use super::restrictions::check_restriction_facets;
use super::simple_types::{check_simple_type, SimpleType};
use super::types::{DerivationMethod, DerivationSet, TypeHandle, TypeKey};
use super::wildcards::{AnyElement, NamespaceConstraint, ProcessContents, Wildcard};

fn is_false(value: &bool) -> bool {
    !*value
}

/// `xs:simpleContent` derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleContent {
    /// Restriction or extension
    pub derivation: DerivationMethod,
    /// Base type name
    pub base: QName,
    /// Facets of a restriction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<FacetEntry>,
    /// Inline `xs:simpleType` of a restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_type: Option<SimpleType>,
}

/// `xs:complexContent` derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexContent {
    /// Restriction or extension
    pub derivation: DerivationMethod,
    /// Base type name
    pub base: QName,
    /// Content model of the derivation step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle: Option<Particle>,
}

/// Content of a complex type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    /// No content
    #[default]
    Empty,
    /// `xs:simpleContent`
    Simple(SimpleContent),
    /// `xs:complexContent`
    Complex(ComplexContent),
    /// A content model without explicit `xs:complexContent`
    Element {
        /// The content model
        particle: Particle,
    },
}

/// XSD Complex Type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexType {
    /// Type name; `None` for anonymous types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<QName>,
    /// Content
    #[serde(default)]
    pub content: Content,
    /// `mixed`
    #[serde(default, skip_serializing_if = "is_false")]
    pub mixed: bool,
    /// `abstract`
    #[serde(default, rename = "abstract", skip_serializing_if = "is_false")]
    pub abstract_: bool,
    /// `final`
    #[serde(default, rename = "final", skip_serializing_if = "DerivationSet::is_empty")]
    pub final_: DerivationSet,
    /// `block`
    #[serde(default, skip_serializing_if = "DerivationSet::is_empty")]
    pub block: DerivationSet,
    /// Attribute uses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDecl>,
    /// Referenced attribute groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_groups: Vec<QName>,
    /// `xs:anyAttribute`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_attribute: Option<Wildcard>,
}

impl ComplexType {
    fn with_content(content: Content) -> Self {
        Self {
            name: None,
            content,
            mixed: false,
            abstract_: false,
            final_: DerivationSet::EMPTY,
            block: DerivationSet::EMPTY,
            attributes: Vec::new(),
            attribute_groups: Vec::new(),
            any_attribute: None,
        }
    }

    /// Anonymous type with empty content
    pub fn empty() -> Self {
        Self::with_content(Content::Empty)
    }

    /// Anonymous type with a content model
    pub fn element_only(particle: impl Into<Particle>) -> Self {
        Self::with_content(Content::Element {
            particle: particle.into(),
        })
    }

    /// `xs:complexContent` extension
    pub fn extension(base: QName, particle: Option<Particle>) -> Self {
        Self::with_content(Content::Complex(ComplexContent {
            derivation: DerivationMethod::Extension,
            base,
            particle,
        }))
    }

    /// `xs:complexContent` restriction
    pub fn restriction(base: QName, particle: Option<Particle>) -> Self {
        Self::with_content(Content::Complex(ComplexContent {
            derivation: DerivationMethod::Restriction,
            base,
            particle,
        }))
    }

    /// `xs:simpleContent` extension
    pub fn simple_extension(base: QName) -> Self {
        Self::with_content(Content::Simple(SimpleContent {
            derivation: DerivationMethod::Extension,
            base,
            facets: Vec::new(),
            simple_type: None,
        }))
    }

    /// `xs:simpleContent` restriction
    pub fn simple_restriction(base: QName, facets: Vec<FacetEntry>) -> Self {
        Self::with_content(Content::Simple(SimpleContent {
            derivation: DerivationMethod::Restriction,
            base,
            facets,
            simple_type: None,
        }))
    }

    /// Set the name
    pub fn named(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Set `mixed`
    pub fn with_mixed(mut self, mixed: bool) -> Self {
        self.mixed = mixed;
        self
    }

    /// Set `final`
    pub fn with_final(mut self, final_: DerivationSet) -> Self {
        self.final_ = final_;
        self
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add an attribute group reference
    pub fn with_attribute_group(mut self, name: QName) -> Self {
        self.attribute_groups.push(name);
        self
    }

    /// Set the attribute wildcard
    pub fn with_any_attribute(mut self, wildcard: Wildcard) -> Self {
        self.any_attribute = Some(wildcard);
        self
    }

    /// Explicit derivation method; `None` for the implicit restriction of
    /// `xs:anyType`
    pub fn derivation_method(&self) -> Option<DerivationMethod> {
        match &self.content {
            Content::Simple(sc) => Some(sc.derivation),
            Content::Complex(cc) => Some(cc.derivation),
            Content::Empty | Content::Element { .. } => None,
        }
    }

    /// Check for mixed content
    pub fn is_mixed(&self) -> bool {
        self.mixed
    }

    /// Check for simple content
    pub fn has_simple_content(&self) -> bool {
        matches!(self.content, Content::Simple(_))
    }

    /// Content model written on this definition
    pub fn own_particle(&self) -> Option<&Particle> {
        match &self.content {
            Content::Element { particle } => Some(particle),
            Content::Complex(cc) => cc.particle.as_ref(),
            Content::Empty | Content::Simple(_) => None,
        }
    }

    /// Name for diagnostics
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("complex type '{}'", name),
            None => "anonymous complex type".to_string(),
        }
    }
}

// =============================================================================
// Effective content
// =============================================================================

/// Content model of `xs:anyType`
fn any_type_particle() -> Particle {
    let wildcard = Wildcard::new(NamespaceConstraint::Any, ProcessContents::Lax);
    ModelGroup::sequence(vec![AnyElement::new(wildcard, Occurrence::zero_or_more()).into()]).into()
}

/// Check for a content model that matches nothing
fn is_empty_particle(particle: &Particle) -> bool {
    match particle {
        Particle::Group(group) => group.is_empty() || group.occurs.is_empty(),
        other => other.occurs().is_empty(),
    }
}

/// Effective content model of a complex type: the restriction's own
/// particle, or for an extension a sequence of the base's effective content
/// followed by the extension's particle. `None` means empty content.
pub fn effective_particle(cx: &Context<'_>, ct: &ComplexType) -> Option<Particle> {
    let mut seen = HashSet::new();
    effective_guarded(cx.schema, ct, &mut seen)
}

fn effective_guarded(schema: &Schema, ct: &ComplexType, seen: &mut HashSet<TypeKey>) -> Option<Particle> {
    if !seen.insert(TypeHandle::Complex(ct).key()) {
        tracing::trace!(complex_type = %ct.display_name(), "cycle in content extension chain");
        return None;
    }
    let own = ct.own_particle().filter(|p| !is_empty_particle(p)).cloned();
    let Content::Complex(cc) = &ct.content else {
        return own;
    };
    if cc.derivation != DerivationMethod::Extension {
        return own;
    }
    let inherited = match schema.lookup_type(&cc.base) {
        Some(TypeHandle::AnyType) => Some(any_type_particle()),
        Some(TypeHandle::Complex(base)) => effective_guarded(schema, base, seen),
        _ => None,
    };
    match (inherited, own) {
        (Some(base), Some(own)) => Some(ModelGroup::sequence(vec![base, own]).into()),
        (base, own) => base.or(own),
    }
}

/// Check whether the content of a complex type may be empty
pub fn content_is_emptiable(cx: &Context<'_>, ct: &ComplexType) -> bool {
    match &ct.content {
        Content::Empty => true,
        Content::Simple(_) => false,
        Content::Complex(_) | Content::Element { .. } => match effective_particle(cx, ct) {
            None => true,
            Some(particle) => is_emptiable(cx.schema, &particle),
        },
    }
}

/// Check whether a particle is an `xs:all` group, directly or through a
/// group reference
fn is_all_group(schema: &Schema, particle: &Particle) -> bool {
    match particle {
        Particle::Group(group) => group.kind == GroupKind::All,
        Particle::GroupRef(group_ref) => schema
            .groups
            .get(&group_ref.name)
            .map_or(false, |named| named.group.kind == GroupKind::All),
        Particle::Element(_) | Particle::Any(_) => false,
    }
}

// =============================================================================
// Complex type checks
// =============================================================================

/// Check a complex type definition, global or inline
pub fn check_complex_type(cx: &Context<'_>, ct: &ComplexType, errors: &mut Vec<SchemaError>) {
    if let Some(name) = &ct.name {
        if let Err(e) = validate_ncname(&name.local_name) {
            errors.push(schema_error(ErrorKind::InvalidName, e.to_string()));
        }
    }
    let handle = TypeHandle::Complex(ct);
    if handle.has_circular_base(cx.schema) {
        errors.push(schema_error(
            ErrorKind::CircularDerivation,
            format!("{} is derived from itself", ct.display_name()),
        ));
        return;
    }
    if let Err(e) = cx.limits.check_depth(handle.ancestors(cx.schema).len()) {
        errors.push(schema_error(
            ErrorKind::CircularDerivation,
            format!("derivation chain of {}: {}", ct.display_name(), e),
        ));
        return;
    }

    match &ct.content {
        Content::Empty => {}
        Content::Element { particle } => check_particle(cx, particle, None, 0, errors),
        Content::Simple(sc) => check_simple_content(cx, ct, sc, errors),
        Content::Complex(cc) => check_complex_content(cx, ct, cc, errors),
    }

    check_type_attributes(cx, ct, errors);

    if let Some(particle) = effective_particle(cx, ct) {
        check_element_consistency(cx, &particle, errors);
        check_upa(cx, &particle, errors);
    }
}

fn check_simple_content(cx: &Context<'_>, ct: &ComplexType, sc: &SimpleContent, errors: &mut Vec<SchemaError>) {
    let schema = cx.schema;
    if let Some(inline) = &sc.simple_type {
        check_simple_type(cx, inline, errors);
    }
    let Some(base) = schema.lookup_type(&sc.base) else {
        errors.push(schema_error(
            ErrorKind::NotFound,
            format!("base type '{}' of {} not found", sc.base, ct.display_name()),
        ));
        return;
    };
    if base.final_set().contains(sc.derivation) {
        errors.push(schema_error(
            ErrorKind::FinalViolation,
            format!(
                "base type {} has final='{}' which bars {} of {}",
                base.display_name(),
                base.final_set(),
                sc.derivation,
                ct.display_name()
            ),
        ));
    }
    match sc.derivation {
        DerivationMethod::Restriction => {
            let valid_base = match base {
                TypeHandle::AnyType => true,
                TypeHandle::Complex(b) => {
                    b.has_simple_content()
                        || (sc.simple_type.is_some() && b.is_mixed() && content_is_emptiable(cx, b))
                }
                TypeHandle::Builtin(_) | TypeHandle::Simple(_) => false,
            };
            if !valid_base {
                errors.push(schema_error(
                    ErrorKind::SimpleContentBaseInvalid,
                    format!(
                        "simpleContent restriction of {} requires a complex base with simple content, got {}",
                        ct.display_name(),
                        base.display_name()
                    ),
                ));
                return;
            }
            if ct.name.is_none() && sc.simple_type.is_some() && sc.facets.is_empty() {
                errors.push(schema_error(
                    ErrorKind::SimpleContentBaseInvalid,
                    format!(
                        "simpleContent restriction of base {} with an inline simple type must carry a facet",
                        base.display_name()
                    ),
                ));
            }
            let restricted = match &sc.simple_type {
                Some(inline) => Some(TypeHandle::Simple(inline)),
                None => base.content_simple_type(schema),
            };
            if let Some(simple) = restricted {
                check_restriction_facets(cx, simple, &sc.facets, errors);
            }
        }
        DerivationMethod::Extension => {
            if base.content_simple_type(schema).is_none() {
                errors.push(schema_error(
                    ErrorKind::SimpleContentBaseInvalid,
                    format!(
                        "simpleContent extension of {} requires a simple type or simple content base, got {}",
                        ct.display_name(),
                        base.display_name()
                    ),
                ));
            }
            if !sc.facets.is_empty() {
                errors.push(schema_error(
                    ErrorKind::SimpleContentBaseInvalid,
                    format!("simpleContent extension of {} may not carry facets", ct.display_name()),
                ));
            }
        }
        other => errors.push(schema_error(
            ErrorKind::SimpleContentBaseInvalid,
            format!("{} is not a valid simpleContent derivation", other),
        )),
    }
}

fn check_complex_content(cx: &Context<'_>, ct: &ComplexType, cc: &ComplexContent, errors: &mut Vec<SchemaError>) {
    let schema = cx.schema;
    if let Some(particle) = &cc.particle {
        check_particle(cx, particle, None, 0, errors);
    }
    let Some(base) = schema.lookup_type(&cc.base) else {
        errors.push(schema_error(
            ErrorKind::NotFound,
            format!("base type '{}' of {} not found", cc.base, ct.display_name()),
        ));
        return;
    };
    let base_type = match base {
        TypeHandle::Builtin(_) | TypeHandle::Simple(_) => {
            errors.push(schema_error(
                ErrorKind::ComplexContentBaseInvalid,
                format!(
                    "complexContent derivation of {} from simple type {}",
                    ct.display_name(),
                    base.display_name()
                ),
            ));
            return;
        }
        TypeHandle::Complex(b) if b.has_simple_content() => {
            errors.push(schema_error(
                ErrorKind::ComplexContentBaseInvalid,
                format!(
                    "complexContent derivation of {} from {} which has simple content",
                    ct.display_name(),
                    b.display_name()
                ),
            ));
            return;
        }
        TypeHandle::Complex(b) => Some(b),
        TypeHandle::AnyType => None,
    };
    if base.final_set().contains(cc.derivation) {
        errors.push(schema_error(
            ErrorKind::FinalViolation,
            format!(
                "base type {} has final='{}' which bars {} of {}",
                base.display_name(),
                base.final_set(),
                cc.derivation,
                ct.display_name()
            ),
        ));
    }
    let base_mixed = base_type.map_or(true, ComplexType::is_mixed);
    let own = cc.particle.as_ref().filter(|p| !is_empty_particle(p));
    match cc.derivation {
        DerivationMethod::Extension => {
            let inherited = match base_type {
                Some(b) => effective_particle(cx, b),
                None => Some(any_type_particle()),
            };
            if let Some(inherited) = &inherited {
                if own.is_some() && base_mixed != ct.is_mixed() {
                    errors.push(schema_error(
                        ErrorKind::MixedContentDerivation,
                        format!(
                            "extension {} must keep the mixed content of base type {}",
                            ct.display_name(),
                            base.display_name()
                        ),
                    ));
                }
                if let Some(own) = own {
                    if is_all_group(schema, own) && !is_emptiable(schema, inherited) {
                        errors.push(schema_error(
                            ErrorKind::AllGroupConstraint,
                            format!(
                                "all group in extension {} requires emptiable base content",
                                ct.display_name()
                            ),
                        ));
                    } else if is_all_group(schema, inherited) && !is_emptiable(schema, inherited) {
                        errors.push(schema_error(
                            ErrorKind::ComplexContentBaseInvalid,
                            format!(
                                "{} cannot extend the all-group content of base type {}",
                                ct.display_name(),
                                base.display_name()
                            ),
                        ));
                    }
                }
            }
        }
        DerivationMethod::Restriction => {
            if ct.is_mixed() && !base_mixed {
                errors.push(schema_error(
                    ErrorKind::MixedContentDerivation,
                    format!(
                        "restriction {} cannot add mixed content to base type {}",
                        ct.display_name(),
                        base.display_name()
                    ),
                ));
            }
            let Some(base_type) = base_type else {
                return;
            };
            let inherited = effective_particle(cx, base_type);
            match (own, inherited) {
                (None, None) => {}
                (None, Some(inherited)) => {
                    if !is_emptiable(schema, &inherited) {
                        errors.push(schema_error(
                            ErrorKind::ParticleRestrictionInvalid,
                            format!(
                                "empty content of {} cannot restrict the non-emptiable content of {}",
                                ct.display_name(),
                                base.display_name()
                            ),
                        ));
                    }
                }
                (Some(own), None) => {
                    if !effective_occurrence(schema, own).is_empty() {
                        errors.push(schema_error(
                            ErrorKind::ParticleRestrictionInvalid,
                            format!(
                                "{} adds content to base type {} which has empty content",
                                ct.display_name(),
                                base.display_name()
                            ),
                        ));
                    }
                }
                (Some(own), Some(inherited)) => {
                    if let Err(e) = check_particle_restriction(cx, own, &inherited) {
                        errors.push(e.in_context(format!("restriction {} of {}", ct.display_name(), base.display_name())));
                    }
                }
            }
        }
        other => errors.push(schema_error(
            ErrorKind::ComplexContentBaseInvalid,
            format!("{} is not a valid complexContent derivation", other),
        )),
    }
}
