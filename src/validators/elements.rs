//! XSD element declarations
//!
//! Element declarations appear globally and as particles. A particle that
//! refers to a global declaration is an [`ElementDecl`] with `reference`
//! set: its `name` is the referenced name and only its occurrence is its own.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cElement_Declarations

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::names::validate_ncname;
use crate::namespaces::{NamespaceContext, QName};

use super::builtins::XSD_ID;
use super::globals::Context;
use super::identities::{check_identity_constraint, IdentityConstraint};
use super::particles::Occurrence;
use super::restrictions::validate_value;
use super::types::{DerivationMethod, DerivationSet, Form, TypeDefinition, TypeHandle, TypeSlot};
use super::{complex_types, simple_types};

fn is_false(value: &bool) -> bool {
    !*value
}

/// XSD Element declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDecl {
    /// Element name; the namespace is the declaring document's target
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
    /// Declared type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_def: Option<TypeSlot>,
    /// Occurrence bounds (local declarations and references)
    #[serde(flatten)]
    pub occurs: Occurrence,
    /// `nillable`
    #[serde(default, skip_serializing_if = "is_false")]
    pub nillable: bool,
    /// `abstract`
    #[serde(default, rename = "abstract", skip_serializing_if = "is_false")]
    pub abstract_: bool,
    /// `default` value constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// `fixed` value constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
    /// `block`
    #[serde(default, skip_serializing_if = "DerivationSet::is_empty")]
    pub block: DerivationSet,
    /// `final`
    #[serde(default, rename = "final", skip_serializing_if = "DerivationSet::is_empty")]
    pub final_: DerivationSet,
    /// Substitution group head
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution_group: Option<QName>,
    /// Identity constraints declared on this element
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identity_constraints: Vec<IdentityConstraint>,
    /// In-scope namespaces for QName-valued constraints
    #[serde(default, skip_serializing_if = "NamespaceContext::is_empty")]
    pub namespaces: NamespaceContext,
}

impl ElementDecl {
    /// Create a new local element declaration without a type
    pub fn new(name: QName) -> Self {
        Self {
            name,
            form: Form::Default,
            global: false,
            reference: false,
            type_def: None,
            occurs: Occurrence::once(),
            nillable: false,
            abstract_: false,
            default: None,
            fixed: None,
            block: DerivationSet::EMPTY,
            final_: DerivationSet::EMPTY,
            substitution_group: None,
            identity_constraints: Vec::new(),
            namespaces: NamespaceContext::new(),
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

    /// The value constraint, if any
    pub fn value_constraint(&self) -> Option<&str> {
        self.fixed.as_deref().or(self.default.as_deref())
    }
}

// =============================================================================
// Element checks
// =============================================================================

/// Check a global element declaration or a local declaration found in a
/// content model
pub fn check_element(cx: &Context<'_>, decl: &ElementDecl, errors: &mut Vec<SchemaError>) {
    let schema = cx.schema;
    if decl.reference {
        if !schema.elements.contains_key(&decl.name) {
            errors.push(schema_error(
                ErrorKind::NotFound,
                format!("referenced element '{}' not found", decl.name),
            ));
        }
        return;
    }

    if let Err(e) = validate_ncname(&decl.name.local_name) {
        errors.push(schema_error(ErrorKind::InvalidName, e.to_string()));
    }

    match &decl.type_def {
        Some(TypeSlot::Named(name)) if schema.lookup_type(name).is_none() => {
            errors.push(schema_error(
                ErrorKind::NotFound,
                format!("type '{}' of element '{}' not found", name, decl.name),
            ));
        }
        Some(TypeSlot::Inline(definition)) => {
            let mut inline = Vec::new();
            match definition.as_ref() {
                TypeDefinition::Simple(st) => simple_types::check_simple_type(cx, st, &mut inline),
                TypeDefinition::Complex(ct) => complex_types::check_complex_type(cx, ct, &mut inline),
            }
            errors.extend(inline.into_iter().map(|e| e.in_context("anonymous type")));
        }
        _ => {}
    }

    check_value_constraint(cx, decl, errors);

    if decl.global {
        check_substitution_group(cx, decl, errors);
    }

    for constraint in &decl.identity_constraints {
        check_identity_constraint(cx, decl, constraint, errors);
    }
}

fn check_value_constraint(cx: &Context<'_>, decl: &ElementDecl, errors: &mut Vec<SchemaError>) {
    if decl.default.is_some() && decl.fixed.is_some() {
        errors.push(schema_error(
            ErrorKind::ValueConstraint,
            format!("element '{}' has both 'default' and 'fixed'", decl.name),
        ));
        return;
    }
    let Some(value) = decl.value_constraint() else {
        return;
    };
    let Some(element_type) = cx.schema.element_type(decl) else {
        return;
    };
    let simple = match element_type {
        TypeHandle::Complex(ct) if element_type.content_simple_type(cx.schema).is_none() => {
            if !ct.is_mixed() || !complex_types::content_is_emptiable(cx, ct) {
                errors.push(schema_error(
                    ErrorKind::ValueConstraint,
                    format!(
                        "element '{}' has a value constraint but its type has neither simple nor emptiable mixed content",
                        decl.name
                    ),
                ));
            }
            return;
        }
        TypeHandle::AnyType => return,
        other => other.content_simple_type(cx.schema),
    };
    let Some(simple) = simple else {
        return;
    };
    if let Some(builtin) = simple.builtin_ancestor(cx.schema) {
        if builtin.is_derived_from(XSD_ID) {
            errors.push(schema_error(
                ErrorKind::ValueConstraint,
                format!("element '{}' of an ID type may not have a value constraint", decl.name),
            ));
            return;
        }
    }
    if let Err(reason) = validate_value(cx.schema, simple, value) {
        errors.push(schema_error(
            ErrorKind::ValueConstraint,
            format!("invalid value constraint '{}' on element '{}': {}", value, decl.name, reason),
        ));
    }
}

fn check_substitution_group(cx: &Context<'_>, decl: &ElementDecl, errors: &mut Vec<SchemaError>) {
    let schema = cx.schema;
    let Some(head_name) = &decl.substitution_group else {
        return;
    };
    let Some(head) = schema.elements.get(head_name) else {
        errors.push(schema_error(
            ErrorKind::NotFound,
            format!("substitution group head '{}' of element '{}' not found", head_name, decl.name),
        ));
        return;
    };

    let mut seen = HashSet::new();
    let mut current = Some(head);
    while let Some(element) = current {
        if element.name == decl.name {
            errors.push(schema_error(
                ErrorKind::CircularDerivation,
                format!("circular substitution group through element '{}'", decl.name),
            ));
            return;
        }
        if !seen.insert(&element.name) {
            tracing::trace!(element = %element.name, "substitution group cycle not involving this element");
            break;
        }
        current = element.substitution_group.as_ref().and_then(|h| schema.elements.get(h));
    }

    if decl.type_def.is_none() {
        return;
    }
    let (Some(member_type), Some(head_type)) = (schema.element_type(decl), schema.element_type(head)) else {
        return;
    };
    if !member_type.is_derived_from(&head_type, DerivationSet::EMPTY, schema) {
        errors.push(schema_error(
            ErrorKind::SubstitutionGroup,
            format!(
                "type {} of element '{}' is not derived from type {} of substitution group head '{}'",
                member_type.display_name(),
                decl.name,
                head_type.display_name(),
                head_name
            ),
        ));
        return;
    }
    let mut head_final = DerivationSet::EMPTY;
    for method in [DerivationMethod::Restriction, DerivationMethod::Extension] {
        if head.final_.contains(method) {
            head_final.insert(method);
        }
    }
    if !head_final.is_empty() && !member_type.is_derived_from(&head_type, head_final, schema) {
        errors.push(schema_error(
            ErrorKind::FinalViolation,
            format!(
                "substitution group head '{}' has final='{}' which bars element '{}'",
                head_name, head.final_, decl.name
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::validators::builders::{element, SchemaBuilder};

    fn check(schema: &crate::validators::globals::Schema, name: &str) -> Vec<SchemaError> {
        let limits = Limits::default();
        let cx = Context::new(schema, &limits);
        let mut errors = Vec::new();
        check_element(&cx, &schema.elements[&QName::new("urn:x", name)], &mut errors);
        errors
    }

    #[test]
    fn test_effective_name() {
        let local = ElementDecl::new(QName::new("urn:x", "a"));
        assert_eq!(local.effective_name(Form::Unqualified), QName::local("a"));
        assert_eq!(local.effective_name(Form::Qualified), QName::new("urn:x", "a"));
        let mut global = local.clone();
        global.global = true;
        assert_eq!(global.effective_name(Form::Unqualified), QName::new("urn:x", "a"));
    }

    #[test]
    fn test_default_and_fixed_exclusive() {
        let schema = SchemaBuilder::new("urn:x")
            .element(element("urn:x", "e").typed(QName::xsd("int")).default_value("1").fixed_value("1"))
            .build();
        let errors = check(&schema, "e");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::ValueConstraint);
    }

    #[test]
    fn test_invalid_default() {
        let schema = SchemaBuilder::new("urn:x")
            .element(element("urn:x", "e").typed(QName::xsd("int")).default_value("abc"))
            .element(element("urn:x", "f").typed(QName::xsd("ID")).default_value("abc"))
            .element(element("urn:x", "g").typed(QName::xsd("byte")).fixed_value(" 12 "))
            .build();
        assert_eq!(check(&schema, "e")[0].kind, ErrorKind::ValueConstraint);
        assert_eq!(check(&schema, "f")[0].kind, ErrorKind::ValueConstraint);
        assert!(check(&schema, "g").is_empty());
    }

    #[test]
    fn test_missing_type() {
        let schema = SchemaBuilder::new("urn:x")
            .element(element("urn:x", "e").typed(QName::new("urn:x", "Nope")))
            .build();
        let errors = check(&schema, "e");
        assert_eq!(errors[0].kind, ErrorKind::NotFound);
        assert!(errors[0].message.contains("{urn:x}Nope"));
    }

    #[test]
    fn test_substitution_group_checks() {
        let schema = SchemaBuilder::new("urn:x")
            .element(element("urn:x", "head").typed(QName::xsd("decimal")).final_set(DerivationSet::of(&[DerivationMethod::Restriction])))
            .element(element("urn:x", "good").typed(QName::xsd("decimal")).substitutes(QName::new("urn:x", "head")))
            .element(element("urn:x", "barred").typed(QName::xsd("int")).substitutes(QName::new("urn:x", "head")))
            .element(element("urn:x", "alien").typed(QName::xsd("string")).substitutes(QName::new("urn:x", "head")))
            .element(element("urn:x", "orphan").substitutes(QName::new("urn:x", "missing")))
            .element(element("urn:x", "a").substitutes(QName::new("urn:x", "b")))
            .element(element("urn:x", "b").substitutes(QName::new("urn:x", "a")))
            .build();
        assert!(check(&schema, "good").is_empty());
        assert_eq!(check(&schema, "barred")[0].kind, ErrorKind::FinalViolation);
        assert_eq!(check(&schema, "alien")[0].kind, ErrorKind::SubstitutionGroup);
        assert_eq!(check(&schema, "orphan")[0].kind, ErrorKind::NotFound);
        assert_eq!(check(&schema, "a")[0].kind, ErrorKind::CircularDerivation);
    }
}
