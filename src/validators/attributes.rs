//! XSD attribute declarations, attribute groups and attribute uses
//!
//! An [`AttributeDecl`] is either a global declaration, a local declaration
//! inside a complex type or attribute group, or a reference to a global
//! declaration (`reference` set; the use-level `use`, `default` and `fixed`
//! are its own). The effective attribute uses of a complex type are computed
//! by walking its derivation chain from `xs:anyType` down.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cAttribute_Declarations

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::names::{validate_attribute_name, validate_ncname};
use crate::namespaces::{NamespaceContext, QName};

use super::builtins::{XSD_ANY_SIMPLE_TYPE, XSD_ID};
use super::complex_types::ComplexType;
use super::globals::{Context, Schema};
use super::restrictions::{normalize_value, validate_value};
use super::simple_types::{check_simple_type, SimpleTypeRef};
use super::types::{DerivationMethod, DerivationSet, Form, TypeHandle};
use super::wildcards::{NamespaceConstraint, ProcessContents, Wildcard};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Attribute `use`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Use {
    /// May be present
    #[default]
    Optional,
    /// Must be present
    Required,
    /// Removed from the type (restrictions only)
    Prohibited,
}

impl Use {
    /// Check for the source default
    pub fn is_optional(&self) -> bool {
        *self == Use::Optional
    }
}

impl fmt::Display for Use {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Use::Optional => f.write_str("optional"),
            Use::Required => f.write_str("required"),
            Use::Prohibited => f.write_str("prohibited"),
        }
    }
}

/// XSD Attribute declaration or attribute use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDecl {
    /// Attribute name; the namespace is the declaring document's target
    /// namespace, or the referenced name for references
    pub name: QName,
    /// `form` as written
    #[serde(default, skip_serializing_if = "Form::is_default")]
    pub form: Form,
    /// Top-level declaration
    #[serde(default, skip_serializing_if = "is_false")]
    pub global: bool,
    /// Reference to the global declaration `name`
    #[serde(default, rename = "ref", skip_serializing_if = "is_false")]
    pub reference: bool,
    /// Declared simple type; `xs:anySimpleType` when absent
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_def: Option<SimpleTypeRef>,
    /// `use`
    #[serde(default, rename = "use", skip_serializing_if = "Use::is_optional")]
    pub use_: Use,
    /// `default` value constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// `fixed` value constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
    /// In-scope namespaces for QName-valued constraints
    #[serde(default, skip_serializing_if = "NamespaceContext::is_empty")]
    pub namespaces: NamespaceContext,
}

impl AttributeDecl {
    /// Create a new local attribute declaration
    pub fn new(name: QName) -> Self {
        Self {
            name,
            form: Form::Default,
            global: false,
            reference: false,
            type_def: None,
            use_: Use::Optional,
            default: None,
            fixed: None,
            namespaces: NamespaceContext::new(),
        }
    }

    /// Create a reference to a global attribute
    pub fn reference(name: QName) -> Self {
        Self {
            reference: true,
            ..Self::new(name)
        }
    }

    /// Expanded name: global declarations and references keep `name`,
    /// unqualified local declarations lose the namespace
    pub fn effective_name(&self, form_default: Form) -> QName {
        if self.global || self.reference || self.form.is_qualified(form_default) {
            self.name.clone()
        } else {
            QName::local(self.name.local_name.clone())
        }
    }
}

/// Named attribute group definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeGroup {
    /// Group name
    pub name: QName,
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

impl AttributeGroup {
    /// Create an empty attribute group
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            attribute_groups: Vec::new(),
            any_attribute: None,
        }
    }
}

// =============================================================================
// Attribute uses
// =============================================================================

/// A resolved attribute use
#[derive(Debug, Clone, Copy)]
pub struct AttributeUse<'a> {
    /// The use as written
    pub decl: &'a AttributeDecl,
    /// The declaration after following a reference
    pub target: &'a AttributeDecl,
}

impl<'a> AttributeUse<'a> {
    /// `use` of this attribute use
    pub fn use_(&self) -> Use {
        self.decl.use_
    }

    /// `fixed` of the use, or of the referenced declaration
    pub fn fixed(&self) -> Option<&'a str> {
        self.decl.fixed.as_deref().or(self.target.fixed.as_deref())
    }

    /// Declared type; unresolvable references give `None`
    pub fn type_handle(&self, schema: &'a Schema) -> Option<TypeHandle<'a>> {
        match &self.target.type_def {
            Some(type_ref) => schema.resolve_simple_ref(type_ref),
            None => TypeHandle::builtin(XSD_ANY_SIMPLE_TYPE),
        }
    }

    /// Check whether the type is `xs:ID` or derived from it
    pub fn is_id(&self, schema: &'a Schema) -> bool {
        self.type_handle(schema)
            .and_then(|t| t.builtin_ancestor(schema))
            .map_or(false, |b| b.is_derived_from(XSD_ID))
    }
}

/// The attribute uses and the attribute wildcard of a type or group
#[derive(Debug, Clone, Default)]
pub struct AttributeUses<'a> {
    /// Uses keyed by expanded name, in declaration order
    pub uses: IndexMap<QName, AttributeUse<'a>>,
    /// Complete attribute wildcard
    pub wildcard: Option<Wildcard>,
}

impl<'a> AttributeUses<'a> {
    /// Look up a use by name
    pub fn get(&self, name: &QName) -> Option<&AttributeUse<'a>> {
        self.uses.get(name)
    }

    /// Check whether an attribute name is admitted by a use or the wildcard
    pub fn admits(&self, name: &QName) -> bool {
        self.uses.contains_key(name)
            || self.wildcard.as_ref().map_or(false, |w| w.is_namespace_allowed(&name.namespace))
    }

    /// Uses with an `xs:ID` type
    pub fn id_uses(&self, schema: &'a Schema) -> Vec<&QName> {
        self.uses
            .iter()
            .filter(|(_, u)| u.use_() != Use::Prohibited && u.is_id(schema))
            .map(|(name, _)| name)
            .collect()
    }
}

/// Uses declared directly on a type or attribute group, with attribute
/// groups expanded. Prohibited uses are kept.
#[derive(Debug, Default)]
struct LocalUses<'a> {
    uses: Vec<(QName, AttributeUse<'a>)>,
    wildcards: Vec<&'a Wildcard>,
    missing_groups: Vec<&'a QName>,
    circular_groups: Vec<&'a QName>,
}

impl<'a> LocalUses<'a> {
    fn collect(
        schema: &'a Schema,
        attributes: &'a [AttributeDecl],
        groups: &'a [QName],
        any_attribute: Option<&'a Wildcard>,
        owner: Option<&'a QName>,
    ) -> Self {
        let mut local = LocalUses::default();
        let mut seen: HashSet<&'a QName> = owner.into_iter().collect();
        local.absorb(schema, attributes, groups, any_attribute, &mut seen);
        local
    }

    fn absorb(
        &mut self,
        schema: &'a Schema,
        attributes: &'a [AttributeDecl],
        groups: &'a [QName],
        any_attribute: Option<&'a Wildcard>,
        seen: &mut HashSet<&'a QName>,
    ) {
        for decl in attributes {
            let target = if decl.reference {
                match schema.attributes.get(&decl.name) {
                    Some(global) => global,
                    None => continue,
                }
            } else {
                decl
            };
            let name = decl.effective_name(schema.attribute_form_default);
            self.uses.push((name, AttributeUse { decl, target }));
        }
        if let Some(wildcard) = any_attribute {
            self.wildcards.push(wildcard);
        }
        for group_name in groups {
            let Some(group) = schema.attribute_groups.get(group_name) else {
                self.missing_groups.push(group_name);
                continue;
            };
            if !seen.insert(&group.name) {
                tracing::trace!(group = %group.name, "attribute group cycle");
                self.circular_groups.push(group_name);
                continue;
            }
            self.absorb(
                schema,
                &group.attributes,
                &group.attribute_groups,
                group.any_attribute.as_ref(),
                seen,
            );
            seen.remove(&group.name);
        }
    }

    /// Intersection of the local wildcards
    fn wildcard(&self) -> Result<Option<Wildcard>, SchemaError> {
        let mut wildcards = self.wildcards.iter();
        let Some(first) = wildcards.next() else {
            return Ok(None);
        };
        let mut complete = (*first).clone();
        for wildcard in wildcards {
            complete = complete.intersection(wildcard)?;
        }
        Ok(Some(complete))
    }
}

/// Effective attribute uses of any type.
///
/// Simple types have none; `xs:anyType` admits any attribute laxly.
/// Restrictions inherit the base uses unless prohibited and intersect the
/// wildcard, extensions add uses and unite the wildcard.
pub fn effective_uses<'a>(schema: &'a Schema, handle: TypeHandle<'a>) -> AttributeUses<'a> {
    let mut chain = handle.ancestors(schema);
    chain.reverse();
    let mut result = AttributeUses::default();
    for t in chain {
        match t {
            TypeHandle::AnyType => {
                result.wildcard = Some(Wildcard::new(NamespaceConstraint::Any, ProcessContents::Lax));
            }
            TypeHandle::Builtin(_) | TypeHandle::Simple(_) => {
                result = AttributeUses::default();
            }
            TypeHandle::Complex(ct) => result = derive_uses(schema, ct, result),
        }
    }
    result
}

fn derive_uses<'a>(schema: &'a Schema, ct: &'a ComplexType, base: AttributeUses<'a>) -> AttributeUses<'a> {
    let local = LocalUses::collect(schema, &ct.attributes, &ct.attribute_groups, ct.any_attribute.as_ref(), None);
    let local_wildcard = local.wildcard().unwrap_or_else(|e| {
        tracing::trace!(error = %e, "falling back to the first attribute wildcard");
        local.wildcards.first().map(|w| (*w).clone())
    });
    let mut uses = base.uses;
    match ct.derivation_method() {
        Some(DerivationMethod::Extension) => {
            for (name, attribute_use) in local.uses {
                if attribute_use.use_() != Use::Prohibited {
                    uses.entry(name).or_insert(attribute_use);
                }
            }
            let wildcard = match (local_wildcard, base.wildcard) {
                (Some(own), Some(inherited)) => own.union(&inherited).ok().or(Some(own)),
                (own, inherited) => own.or(inherited),
            };
            AttributeUses { uses, wildcard }
        }
        _ => {
            for (name, attribute_use) in local.uses {
                if attribute_use.use_() == Use::Prohibited && attribute_use.fixed().is_none() {
                    uses.shift_remove(&name);
                } else {
                    uses.insert(name, attribute_use);
                }
            }
            let wildcard = match (local_wildcard, base.wildcard) {
                (Some(own), Some(inherited)) => own.intersection(&inherited).ok().or(Some(own)),
                (own, _) => own,
            };
            AttributeUses { uses, wildcard }
        }
    }
}

// =============================================================================
// Declaration checks
// =============================================================================

/// Check a global or local attribute declaration, or an attribute use
pub fn check_attribute_decl(cx: &Context<'_>, decl: &AttributeDecl, errors: &mut Vec<SchemaError>) {
    let schema = cx.schema;
    if decl.reference {
        match schema.attributes.get(&decl.name) {
            None => errors.push(schema_error(
                ErrorKind::NotFound,
                format!("referenced attribute '{}' not found", decl.name),
            )),
            Some(target) => {
                if let (Some(own), Some(fixed)) = (&decl.fixed, &target.fixed) {
                    if own != fixed {
                        errors.push(schema_error(
                            ErrorKind::ValueConstraint,
                            format!(
                                "fixed value '{}' of the use of attribute '{}' differs from its declaration's '{}'",
                                own, decl.name, fixed
                            ),
                        ));
                    }
                }
                check_value_constraint(cx, decl, target, errors);
            }
        }
        return;
    }

    let name = decl.effective_name(schema.attribute_form_default);
    if let Err(e) = validate_attribute_name(&name.local_name, &name.namespace) {
        errors.push(schema_error(ErrorKind::InvalidName, e.to_string()));
    }

    match &decl.type_def {
        Some(SimpleTypeRef::Named(type_name)) => match schema.lookup_type(type_name) {
            None => errors.push(schema_error(
                ErrorKind::NotFound,
                format!("type '{}' of attribute '{}' not found", type_name, decl.name),
            )),
            Some(handle) if handle.is_complex() => errors.push(schema_error(
                ErrorKind::SimpleTypeBaseInvalid,
                format!("attribute '{}' has complex type {}", decl.name, handle.display_name()),
            )),
            Some(_) => {}
        },
        Some(SimpleTypeRef::Inline(st)) => {
            let mut inline = Vec::new();
            check_simple_type(cx, st, &mut inline);
            errors.extend(inline.into_iter().map(|e| e.in_context(format!("attribute '{}'", decl.name))));
        }
        None => {}
    }

    check_value_constraint(cx, decl, decl, errors);
}

fn check_value_constraint(cx: &Context<'_>, decl: &AttributeDecl, target: &AttributeDecl, errors: &mut Vec<SchemaError>) {
    if decl.default.is_some() && decl.fixed.is_some() {
        errors.push(schema_error(
            ErrorKind::ValueConstraint,
            format!("attribute '{}' has both 'default' and 'fixed'", decl.name),
        ));
        return;
    }
    if decl.default.is_some() {
        match decl.use_ {
            Use::Required => {
                errors.push(schema_error(
                    ErrorKind::ValueConstraint,
                    format!("required attribute '{}' may not have a default value", decl.name),
                ));
                return;
            }
            Use::Prohibited => {
                errors.push(schema_error(
                    ErrorKind::ValueConstraint,
                    format!("prohibited attribute '{}' may not have a default value", decl.name),
                ));
                return;
            }
            Use::Optional => {}
        }
    }
    let Some(value) = decl.fixed.as_deref().or(decl.default.as_deref()) else {
        return;
    };
    let attribute_use = AttributeUse { decl, target };
    let Some(handle) = attribute_use.type_handle(cx.schema) else {
        return;
    };
    if handle.is_complex() {
        return;
    }
    if attribute_use.is_id(cx.schema) {
        errors.push(schema_error(
            ErrorKind::ValueConstraint,
            format!("attribute '{}' of an ID type may not have a value constraint", decl.name),
        ));
        return;
    }
    if let Err(reason) = validate_value(cx.schema, handle, value) {
        errors.push(schema_error(
            ErrorKind::ValueConstraint,
            format!("invalid value constraint '{}' on attribute '{}': {}", value, decl.name, reason),
        ));
    }
}

/// Check a named attribute group
pub fn check_attribute_group(cx: &Context<'_>, group: &AttributeGroup, errors: &mut Vec<SchemaError>) {
    if let Err(e) = validate_ncname(&group.name.local_name) {
        errors.push(schema_error(ErrorKind::InvalidName, e.to_string()));
    }
    for decl in &group.attributes {
        check_attribute_decl(cx, decl, errors);
    }
    let local = LocalUses::collect(
        cx.schema,
        &group.attributes,
        &group.attribute_groups,
        group.any_attribute.as_ref(),
        Some(&group.name),
    );
    if local.circular_groups.iter().any(|name| **name == group.name) {
        errors.push(schema_error(
            ErrorKind::CircularDerivation,
            format!("attribute group '{}' refers to itself", group.name),
        ));
    }
    check_local_uses(cx, &local, errors);
}

/// Missing groups, duplicate names and ID uses of one local collection
fn check_local_uses(cx: &Context<'_>, local: &LocalUses<'_>, errors: &mut Vec<SchemaError>) {
    for name in &local.missing_groups {
        errors.push(schema_error(
            ErrorKind::NotFound,
            format!("referenced attribute group '{}' not found", name),
        ));
    }
    let mut names = HashSet::new();
    for (name, _) in &local.uses {
        if !names.insert(name) {
            errors.push(schema_error(
                ErrorKind::DuplicateAttribute,
                format!("duplicate attribute '{}'", name),
            ));
        }
    }
    let ids: Vec<&QName> = local
        .uses
        .iter()
        .filter(|(_, u)| u.use_() != Use::Prohibited && u.is_id(cx.schema))
        .map(|(name, _)| name)
        .collect();
    if ids.len() > 1 {
        errors.push(multiple_ids(&ids));
    }
    if let Err(e) = local.wildcard() {
        errors.push(e);
    }
}

fn multiple_ids(ids: &[&QName]) -> SchemaError {
    let names: Vec<String> = ids.iter().map(|q| format!("'{}'", q)).collect();
    schema_error(
        ErrorKind::MultipleIdAttributes,
        format!("more than one attribute of type ID: {}", names.join(", ")),
    )
}

// =============================================================================
// Complex type attribute checks
// =============================================================================

/// Check the attribute uses of a complex type, including the derivation
/// rules against its base type's uses
pub fn check_type_attributes(cx: &Context<'_>, ct: &ComplexType, errors: &mut Vec<SchemaError>) {
    let schema = cx.schema;
    for decl in &ct.attributes {
        check_attribute_decl(cx, decl, errors);
    }
    let local = LocalUses::collect(schema, &ct.attributes, &ct.attribute_groups, ct.any_attribute.as_ref(), None);
    for name in &local.circular_groups {
        tracing::warn!(group = %name, "attribute group cycle skipped");
    }
    check_local_uses(cx, &local, errors);

    let handle = TypeHandle::Complex(ct);
    let ids = effective_uses(schema, handle);
    let id_names = ids.id_uses(schema);
    if id_names.len() > 1 && local.uses.iter().filter(|(_, u)| u.is_id(schema)).count() <= 1 {
        errors.push(multiple_ids(&id_names));
    }

    let Some(base) = handle.base(schema) else {
        return;
    };
    if base.is_any_type() || base.is_simple() {
        return;
    }
    let base_uses = effective_uses(schema, base);
    let own_wildcard = local.wildcard().ok().flatten();
    match ct.derivation_method() {
        Some(DerivationMethod::Extension) => check_extension_uses(&local, &base_uses, own_wildcard.as_ref(), errors),
        Some(DerivationMethod::Restriction) => {
            check_restriction_uses(cx, &local, &base_uses, errors);
            if let Some(own) = &own_wildcard {
                match &base_uses.wildcard {
                    None => errors.push(schema_error(
                        ErrorKind::AnyAttributeDerivation,
                        format!(
                            "attribute wildcard {} is not allowed: base type {} has none",
                            own.namespace,
                            base.display_name()
                        ),
                    )),
                    Some(inherited) => {
                        if let Err(e) = own.check_restriction_of(inherited, ErrorKind::AnyAttributeDerivation) {
                            errors.push(e);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn check_extension_uses(
    local: &LocalUses<'_>,
    base_uses: &AttributeUses<'_>,
    own_wildcard: Option<&Wildcard>,
    errors: &mut Vec<SchemaError>,
) {
    for (name, attribute_use) in &local.uses {
        if attribute_use.use_() != Use::Prohibited && base_uses.uses.contains_key(name) {
            errors.push(schema_error(
                ErrorKind::DuplicateAttribute,
                format!("extension redeclares base attribute '{}'", name),
            ));
        }
    }
    if let (Some(own), Some(inherited)) = (own_wildcard, &base_uses.wildcard) {
        if let Err(e) = own.union(inherited) {
            errors.push(e);
        }
    }
}

fn check_restriction_uses(
    cx: &Context<'_>,
    local: &LocalUses<'_>,
    base_uses: &AttributeUses<'_>,
    errors: &mut Vec<SchemaError>,
) {
    let schema = cx.schema;
    let restriction_only = DerivationSet::of(&[DerivationMethod::Extension]);
    for (name, own) in &local.uses {
        let Some(inherited) = base_uses.get(name) else {
            if own.use_() != Use::Prohibited && !base_uses.admits(name) {
                errors.push(schema_error(
                    ErrorKind::ParticleRestrictionInvalid,
                    format!("attribute '{}' is neither declared in the base type nor allowed by its wildcard", name),
                ));
            }
            continue;
        };
        if inherited.use_() == Use::Required
            && own.use_() != Use::Required
            && inherited.fixed().is_none()
            && own.fixed().is_none()
        {
            errors.push(schema_error(
                ErrorKind::ParticleRestrictionInvalid,
                format!("required attribute '{}' cannot be relaxed to {}", name, own.use_()),
            ));
            continue;
        }
        if own.use_() == Use::Prohibited {
            continue;
        }
        let (Some(own_type), Some(base_type)) = (own.type_handle(schema), inherited.type_handle(schema)) else {
            continue;
        };
        if !own_type.is_derived_from(&base_type, restriction_only, schema) {
            errors.push(schema_error(
                ErrorKind::ParticleRestrictionInvalid,
                format!(
                    "type {} of attribute '{}' is not a restriction of base type {}",
                    own_type.display_name(),
                    name,
                    base_type.display_name()
                ),
            ));
            continue;
        }
        if let Some(base_fixed) = inherited.fixed() {
            let matches = own.fixed().map_or(false, |own_fixed| {
                normalize_value(schema, base_type, own_fixed) == normalize_value(schema, base_type, base_fixed)
            });
            if !matches {
                errors.push(schema_error(
                    ErrorKind::ParticleRestrictionInvalid,
                    format!("attribute '{}' must keep the base fixed value '{}'", name, base_fixed),
                ));
            }
        }
    }
}
