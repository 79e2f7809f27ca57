//! XSD Identity Constraints
//!
//! This module implements identity constraints for XML Schema:
//! - xs:unique - Ensures values are unique within scope
//! - xs:key - Like unique, but all field values must be present
//! - xs:keyref - References a key/unique constraint (foreign key)
//!
//! Besides the declaration checks, the field/selector resolver statically
//! follows the selector and field XPaths through the content model of the
//! element carrying the constraint and reports the simple type each field
//! reaches. Wildcards on the way make a path *unresolvable*: that outcome is
//! soft and only surfaces when no union branch resolves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::names::validate_ncname;
use crate::namespaces::{NamespaceContext, QName};
use crate::xpath::{parse_field, parse_selector, NodeTest, XPathAxis, XPathPath};

use super::attributes::{effective_uses, Use};
use super::complex_types::{ComplexType, Content};
use super::elements::ElementDecl;
use super::globals::{Context, Schema};
use super::groups::ModelGroup;
use super::particles::Particle;
use super::types::{DerivationMethod, DerivationSet, TypeDefinition, TypeHandle, TypeKey, TypeSlot};

/// Type of identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityConstraintKind {
    /// xs:unique - values must be unique, but fields can be missing
    Unique,
    /// xs:key - values must be unique AND all fields must be present
    Key,
    /// xs:keyref - references a key or unique constraint
    Keyref,
}

impl fmt::Display for IdentityConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique => write!(f, "unique"),
            Self::Key => write!(f, "key"),
            Self::Keyref => write!(f, "keyref"),
        }
    }
}

/// An identity constraint declared on an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConstraint {
    /// Constraint name, in the target namespace
    pub name: QName,
    /// Kind of constraint
    pub kind: IdentityConstraintKind,
    /// Referenced key or unique (keyref only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refer: Option<QName>,
    /// Selector XPath
    pub selector: String,
    /// Field XPaths
    #[serde(default)]
    pub fields: Vec<String>,
    /// Namespace bindings in scope for the XPaths
    #[serde(default, skip_serializing_if = "NamespaceContext::is_empty")]
    pub namespaces: NamespaceContext,
}

impl IdentityConstraint {
    /// Create a new identity constraint without fields
    pub fn new(name: QName, kind: IdentityConstraintKind, selector: impl Into<String>) -> Self {
        Self {
            name,
            kind,
            refer: None,
            selector: selector.into(),
            fields: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Create a unique constraint
    pub fn unique(name: QName, selector: impl Into<String>) -> Self {
        Self::new(name, IdentityConstraintKind::Unique, selector)
    }

    /// Create a key constraint
    pub fn key(name: QName, selector: impl Into<String>) -> Self {
        Self::new(name, IdentityConstraintKind::Key, selector)
    }

    /// Create a keyref constraint
    pub fn keyref(name: QName, selector: impl Into<String>, refer: QName) -> Self {
        let mut identity = Self::new(name, IdentityConstraintKind::Keyref, selector);
        identity.refer = Some(refer);
        identity
    }

    /// Add a field XPath
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Set the namespace bindings for the XPaths
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Check if this is a keyref constraint
    pub fn is_keyref(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Keyref)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// All identity constraints of a schema in document order: global
/// elements, then local elements inside named types and groups
pub fn collect_identity_constraints(schema: &Schema) -> Vec<&IdentityConstraint> {
    let mut collector = IdentityCollector { found: Vec::new() };
    for element in schema.elements.values() {
        collector.element(element);
    }
    for definition in schema.types.values() {
        collector.definition(definition);
    }
    for group in schema.groups.values() {
        collector.group(&group.group);
    }
    collector.found
}

struct IdentityCollector<'a> {
    found: Vec<&'a IdentityConstraint>,
}

impl<'a> IdentityCollector<'a> {
    fn element(&mut self, decl: &'a ElementDecl) {
        if decl.reference {
            return;
        }
        self.found.extend(decl.identity_constraints.iter());
        if let Some(TypeSlot::Inline(definition)) = &decl.type_def {
            self.definition(definition);
        }
    }

    fn definition(&mut self, definition: &'a TypeDefinition) {
        if let TypeDefinition::Complex(ct) = definition {
            match &ct.content {
                Content::Element { particle } => self.particle(particle),
                Content::Complex(cc) => {
                    if let Some(particle) = &cc.particle {
                        self.particle(particle);
                    }
                }
                Content::Empty | Content::Simple(_) => {}
            }
        }
    }

    fn group(&mut self, group: &'a ModelGroup) {
        for particle in &group.particles {
            self.particle(particle);
        }
    }

    fn particle(&mut self, particle: &'a Particle) {
        match particle {
            Particle::Element(decl) => self.element(decl),
            Particle::Group(group) => self.group(group),
            Particle::GroupRef(_) | Particle::Any(_) => {}
        }
    }
}

/// Report identity constraint names used more than once in the schema
pub fn check_identity_names(schema: &Schema, errors: &mut Vec<SchemaError>) {
    let mut seen = HashSet::new();
    for constraint in collect_identity_constraints(schema) {
        if !seen.insert(&constraint.name) {
            errors.push(schema_error(
                ErrorKind::IdentityConstraint,
                format!("duplicate identity constraint name '{}'", constraint.name),
            ));
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Failure of a static XPath resolution
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// A wildcard was met on the way (soft)
    Unresolvable(SchemaError),
    /// The path reaches no declaration
    NotFound(SchemaError),
    /// The path reaches something a field may not select
    Invalid(SchemaError),
}

impl ResolveError {
    fn unresolvable(message: impl Into<String>) -> Self {
        Self::Unresolvable(schema_error(ErrorKind::XPathUnresolvable, message))
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(schema_error(ErrorKind::FieldXPathUnresolved, message))
    }

    /// Check whether a union may drop this branch
    pub fn is_soft(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }

    /// The underlying diagnostic
    pub fn into_error(self) -> SchemaError {
        match self {
            Self::Unresolvable(e) | Self::NotFound(e) | Self::Invalid(e) => e,
        }
    }

    fn in_context(self, context: impl fmt::Display) -> Self {
        match self {
            Self::Unresolvable(e) => Self::Unresolvable(e.in_context(context)),
            Self::NotFound(e) => Self::NotFound(e.in_context(context)),
            Self::Invalid(e) => Self::Invalid(e.in_context(context)),
        }
    }

    /// Keep the first soft failure, but let unresolvability win over a
    /// plain miss
    fn prefer(current: Option<Self>, other: Self) -> Option<Self> {
        match current {
            Some(Self::NotFound(_)) if matches!(other, Self::Unresolvable(_)) => Some(other),
            None => Some(other),
            kept => kept,
        }
    }
}

/// How union branches that fail softly are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchMode {
    /// Drop failing branches as long as one branch resolves
    #[default]
    AnyBranch,
    /// Report every failing branch
    EveryBranch,
}

/// Simple type reached by a field
#[derive(Debug, Clone)]
pub enum FieldType<'a> {
    /// A single type
    Single(TypeHandle<'a>),
    /// Synthetic union of compatible types
    Union(Vec<TypeHandle<'a>>),
}

impl<'a> FieldType<'a> {
    /// Member types
    pub fn members(&self) -> Vec<TypeHandle<'a>> {
        match self {
            Self::Single(handle) => vec![*handle],
            Self::Union(members) => members.clone(),
        }
    }

    /// Name for diagnostics
    pub fn display_name(&self) -> String {
        match self {
            Self::Single(handle) => handle.display_name(),
            Self::Union(members) => format!(
                "union of {}",
                members.iter().map(TypeHandle::display_name).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

/// Outcome of resolving one field
#[derive(Debug, Clone, Default)]
pub struct FieldResolution<'a> {
    /// Resolved type, if any branch resolved to compatible types
    pub field_type: Option<FieldType<'a>>,
    /// Diagnostics, including soft ones (`XPathUnresolvable`,
    /// `FieldSelectsNillable`)
    pub errors: Vec<SchemaError>,
}

enum Search<'a> {
    Found(Vec<&'a ElementDecl>),
    Unresolvable(String),
    Missing,
}

impl<'a> Search<'a> {
    fn or_else(self, next: impl FnOnce() -> Search<'a>) -> Search<'a> {
        match self {
            Search::Found(_) => self,
            Search::Unresolvable(reason) => match next() {
                found @ Search::Found(_) => found,
                _ => Search::Unresolvable(reason),
            },
            Search::Missing => next(),
        }
    }
}

struct Resolver<'a> {
    schema: &'a Schema,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    /// Element declarations reached by the element steps of a path
    fn select(&self, root: &'a ElementDecl, path: &XPathPath) -> Result<Vec<&'a ElementDecl>, ResolveError> {
        let mut current = vec![root];
        let mut descend = false;
        for step in &path.steps {
            match step.axis {
                XPathAxis::DescendantOrSelf => descend = true,
                XPathAxis::Self_ => {
                    if let NodeTest::Name(name) = &step.node_test {
                        current.retain(|decl| &self.schema.element_name(decl) == name);
                        if current.is_empty() {
                            return Err(ResolveError::not_found(format!("self step does not match '{}'", name)));
                        }
                    }
                }
                XPathAxis::Child | XPathAxis::Attribute => {
                    let NodeTest::Name(name) = &step.node_test else {
                        return Err(ResolveError::unresolvable(format!(
                            "wildcard step '{}' cannot be resolved statically",
                            step.node_test
                        )));
                    };
                    let mut next: Vec<&'a ElementDecl> = Vec::new();
                    let mut reason = None;
                    for decl in &current {
                        match self.find_child(decl, name, descend) {
                            Search::Found(found) => {
                                for decl in found {
                                    if !next.iter().any(|n| std::ptr::eq(*n, decl)) {
                                        next.push(decl);
                                    }
                                }
                            }
                            Search::Unresolvable(r) => reason = Some(r),
                            Search::Missing => {}
                        }
                    }
                    if next.is_empty() {
                        return Err(match reason {
                            Some(reason) => ResolveError::unresolvable(reason),
                            None => ResolveError::not_found(format!("no element '{}' in the content model", name)),
                        });
                    }
                    current = next;
                    descend = false;
                }
            }
        }
        Ok(current)
    }

    fn find_child(&self, decl: &'a ElementDecl, name: &QName, descend: bool) -> Search<'a> {
        let Some(handle) = self.schema.element_type(decl) else {
            tracing::warn!(element = %decl.name, "element type not found, skipping XPath step");
            return Search::Missing;
        };
        let mut visited = HashSet::new();
        self.search_type(handle, name, descend, &mut visited, 0)
    }

    fn search_type(
        &self,
        handle: TypeHandle<'a>,
        name: &QName,
        descend: bool,
        visited: &mut HashSet<TypeKey>,
        depth: usize,
    ) -> Search<'a> {
        if depth > self.max_depth {
            return Search::Unresolvable(format!("content model deeper than {}", self.max_depth));
        }
        match handle {
            TypeHandle::AnyType => Search::Unresolvable("the content of xs:anyType admits any element".to_string()),
            TypeHandle::Builtin(_) | TypeHandle::Simple(_) => Search::Missing,
            TypeHandle::Complex(ct) => {
                if !visited.insert(handle.key()) {
                    tracing::trace!(type_name = %handle.display_name(), "type already searched");
                    return Search::Missing;
                }
                self.search_complex(ct, name, descend, visited, depth)
            }
        }
    }

    fn search_complex(
        &self,
        ct: &'a ComplexType,
        name: &QName,
        descend: bool,
        visited: &mut HashSet<TypeKey>,
        depth: usize,
    ) -> Search<'a> {
        match &ct.content {
            Content::Empty | Content::Simple(_) => Search::Missing,
            Content::Element { particle } => self.search_particle(particle, name, descend, visited, depth),
            Content::Complex(cc) => {
                let inherited = if cc.derivation == DerivationMethod::Extension {
                    match self.schema.lookup_type(&cc.base) {
                        Some(base) => self.search_type(base, name, descend, visited, depth + 1),
                        None => Search::Missing,
                    }
                } else {
                    Search::Missing
                };
                inherited.or_else(|| match &cc.particle {
                    Some(particle) => self.search_particle(particle, name, descend, visited, depth),
                    None => Search::Missing,
                })
            }
        }
    }

    fn search_group(
        &self,
        group: &'a ModelGroup,
        name: &QName,
        descend: bool,
        visited: &mut HashSet<TypeKey>,
        depth: usize,
    ) -> Search<'a> {
        let mut outcome = Search::Missing;
        for child in &group.particles {
            match self.search_particle(child, name, descend, visited, depth + 1) {
                found @ Search::Found(_) => return found,
                Search::Unresolvable(reason) => outcome = Search::Unresolvable(reason),
                Search::Missing => {}
            }
        }
        outcome
    }

    fn search_particle(
        &self,
        particle: &'a Particle,
        name: &QName,
        descend: bool,
        visited: &mut HashSet<TypeKey>,
        depth: usize,
    ) -> Search<'a> {
        if depth > self.max_depth {
            return Search::Unresolvable(format!("content model deeper than {}", self.max_depth));
        }
        match particle {
            Particle::Element(decl) => {
                if decl.occurs.is_empty() {
                    return Search::Missing;
                }
                let Some(target) = self.schema.effective_element(decl) else {
                    return Search::Missing;
                };
                let element_name = self.schema.element_name(decl);
                if &element_name == name {
                    return Search::Found(vec![target]);
                }
                let members: Vec<&'a ElementDecl> = self
                    .schema
                    .substitutes(&element_name)
                    .into_iter()
                    .filter(|member| &member.name == name)
                    .collect();
                if !members.is_empty() {
                    return Search::Found(members);
                }
                if !descend {
                    return Search::Missing;
                }
                match self.schema.element_type(target) {
                    Some(handle) => self.search_type(handle, name, descend, visited, depth + 1),
                    None => Search::Missing,
                }
            }
            Particle::Any(any) => {
                if descend || any.is_namespace_allowed(&name.namespace) {
                    Search::Unresolvable(format!("element '{}' may be matched by a wildcard", name))
                } else {
                    Search::Missing
                }
            }
            Particle::Group(group) => self.search_group(group, name, descend, visited, depth),
            Particle::GroupRef(group_ref) => match self.schema.groups.get(&group_ref.name) {
                Some(named) => self.search_group(&named.group, name, descend, visited, depth + 1),
                None => Search::Missing,
            },
        }
    }

    /// Child element declarations of a type, flattened; `true` when the
    /// content also has a wildcard
    fn child_elements(&self, handle: TypeHandle<'a>, out: &mut Vec<&'a ElementDecl>) -> bool {
        fn walk<'a>(schema: &'a Schema, particle: &'a Particle, out: &mut Vec<&'a ElementDecl>, groups: &mut HashSet<&'a QName>) -> bool {
            match particle {
                Particle::Element(decl) if !decl.occurs.is_empty() => {
                    if let Some(target) = schema.effective_element(decl) {
                        out.push(target);
                    }
                    false
                }
                Particle::Element(_) => false,
                Particle::Any(_) => true,
                Particle::Group(group) => group
                    .particles
                    .iter()
                    .fold(false, |wild, p| walk(schema, p, out, groups) || wild),
                Particle::GroupRef(group_ref) => match schema.groups.get(&group_ref.name) {
                    Some(named) if groups.insert(&group_ref.name) => named
                        .group
                        .particles
                        .iter()
                        .fold(false, |wild, p| walk(schema, p, out, groups) || wild),
                    _ => false,
                },
            }
        }

        let mut groups = HashSet::new();
        let mut wild = false;
        for t in handle.ancestors(self.schema) {
            match t {
                TypeHandle::AnyType => return true,
                TypeHandle::Complex(ct) => {
                    if let Some(particle) = ct.own_particle() {
                        wild |= walk(self.schema, particle, out, &mut groups);
                    }
                    if ct.derivation_method() != Some(DerivationMethod::Extension) {
                        break;
                    }
                }
                TypeHandle::Builtin(_) | TypeHandle::Simple(_) => break,
            }
        }
        wild
    }

    /// Type of an attribute of an element
    fn attribute_type(&self, target: &'a ElementDecl, test: &NodeTest) -> Result<TypeHandle<'a>, ResolveError> {
        let NodeTest::Name(attribute) = test else {
            return Err(ResolveError::unresolvable(format!(
                "attribute wildcard '@{}' cannot be resolved statically",
                test
            )));
        };
        let element_name = self.schema.element_name(target);
        let Some(handle) = self.schema.element_type(target) else {
            return Err(ResolveError::not_found(format!("type of element '{}' not found", element_name)));
        };
        let uses = effective_uses(self.schema, handle);
        match uses.get(attribute) {
            Some(attribute_use) if attribute_use.use_() != Use::Prohibited => {
                attribute_use.type_handle(self.schema).ok_or_else(|| {
                    ResolveError::not_found(format!("type of attribute '{}' not found", attribute))
                })
            }
            _ if uses.admits(attribute) => Err(ResolveError::unresolvable(format!(
                "attribute '{}' of element '{}' may be matched by a wildcard",
                attribute, element_name
            ))),
            _ => Err(ResolveError::not_found(format!(
                "element '{}' has no attribute '{}'",
                element_name, attribute
            ))),
        }
    }

    /// Depth-first search for an attribute below a selected element
    fn search_attribute(
        &self,
        decl: &'a ElementDecl,
        test: &NodeTest,
        visited: &mut HashSet<TypeKey>,
        depth: usize,
    ) -> Result<TypeHandle<'a>, ResolveError> {
        let mut failure = match self.attribute_type(decl, test) {
            Ok(found) => return Ok(found),
            Err(e) if e.is_soft() => Some(e),
            Err(e) => return Err(e),
        };
        let Some(handle) = self.schema.element_type(decl) else {
            return Err(failure.unwrap_or_else(|| ResolveError::not_found("element type not found")));
        };
        if depth >= self.max_depth || !visited.insert(handle.key()) {
            return Err(failure.unwrap_or_else(|| ResolveError::not_found("attribute not found")));
        }
        let mut children = Vec::new();
        if self.child_elements(handle, &mut children) {
            failure = ResolveError::prefer(
                failure,
                ResolveError::unresolvable("an element wildcard may contain the attribute"),
            );
        }
        for child in children {
            match self.search_attribute(child, test, visited, depth + 1) {
                Ok(found) => return Ok(found),
                Err(e) if e.is_soft() => failure = ResolveError::prefer(failure, e),
                Err(e) => return Err(e),
            }
        }
        Err(failure.unwrap_or_else(|| ResolveError::not_found(format!("no attribute matches '@{}'", test))))
    }

    /// Simple type of the text of a field's target element
    fn element_value_type(
        &self,
        target: &'a ElementDecl,
        warnings: &mut Vec<SchemaError>,
    ) -> Result<TypeHandle<'a>, ResolveError> {
        let element_name = self.schema.element_name(target);
        let Some(handle) = self.schema.element_type(target) else {
            return Err(ResolveError::not_found(format!("type of element '{}' not found", element_name)));
        };
        let Some(simple) = handle.content_simple_type(self.schema) else {
            return Err(ResolveError::Invalid(schema_error(
                ErrorKind::FieldSelectsComplexContent,
                format!(
                    "field selects element '{}' whose type {} has complex content",
                    element_name,
                    handle.display_name()
                ),
            )));
        };
        if target.nillable {
            warnings.push(schema_error(
                ErrorKind::FieldSelectsNillable,
                format!("field selects nillable element '{}'", element_name),
            ));
        }
        Ok(simple)
    }

    /// Types reached by one field branch from one selected element
    fn field_types(
        &self,
        decl: &'a ElementDecl,
        path: &XPathPath,
        warnings: &mut Vec<SchemaError>,
    ) -> Result<Vec<TypeHandle<'a>>, ResolveError> {
        let searches_descendants = path.steps.iter().any(|s| s.axis == XPathAxis::DescendantOrSelf);
        if let Some(test) = &path.attribute {
            if path.is_descendant_only() && searches_descendants {
                let mut visited = HashSet::new();
                return self.search_attribute(decl, test, &mut visited, 0).map(|t| vec![t]);
            }
            let targets = self.select(decl, path)?;
            let mut types = Vec::new();
            let mut failure = None;
            for target in targets {
                match self.attribute_type(target, test) {
                    Ok(found) => types.push(found),
                    Err(e) if e.is_soft() => failure = ResolveError::prefer(failure, e),
                    Err(e) => return Err(e),
                }
            }
            return match (types.is_empty(), failure) {
                (true, Some(e)) => Err(e),
                _ => Ok(types),
            };
        }
        let targets = self.select(decl, path)?;
        targets
            .into_iter()
            .map(|target| self.element_value_type(target, warnings))
            .collect()
    }
}

fn compatible(schema: &Schema, a: &TypeHandle<'_>, b: &TypeHandle<'_>) -> bool {
    if a.name().is_some() && a.name() == b.name() {
        return true;
    }
    if a.is_derived_from(b, DerivationSet::EMPTY, schema) || b.is_derived_from(a, DerivationSet::EMPTY, schema) {
        return true;
    }
    match (a.primitive(schema), b.primitive(schema)) {
        (Some(p), Some(q)) => std::ptr::eq(p, q),
        _ => false,
    }
}

/// Resolve the simple type a field of an identity constraint reaches, for
/// the constraint declared on `element`
pub fn resolve_field_type<'a>(
    cx: &Context<'a>,
    element: &'a ElementDecl,
    constraint: &IdentityConstraint,
    field: &str,
    mode: BranchMode,
) -> FieldResolution<'a> {
    let mut resolution = FieldResolution::default();
    let selector = match parse_selector(&constraint.selector, &constraint.namespaces) {
        Ok(parsed) => parsed,
        Err(e) => {
            resolution.errors.push(e);
            return resolution;
        }
    };
    let field_xpath = match parse_field(field, &constraint.namespaces) {
        Ok(parsed) => parsed,
        Err(e) => {
            resolution.errors.push(e);
            return resolution;
        }
    };
    let resolver = Resolver {
        schema: cx.schema,
        max_depth: cx.limits.max_depth,
    };

    let mut selected: Vec<&'a ElementDecl> = Vec::new();
    let mut failure = None;
    for (index, path) in selector.paths.iter().enumerate() {
        match resolver.select(element, path) {
            Ok(found) => {
                for decl in found {
                    if !selected.iter().any(|s| std::ptr::eq(*s, decl)) {
                        selected.push(decl);
                    }
                }
            }
            Err(e) => {
                let e = e.in_context(format!("selector '{}' branch {}", constraint.selector, index + 1));
                if mode == BranchMode::EveryBranch || !e.is_soft() {
                    resolution.errors.push(e.into_error());
                } else {
                    tracing::trace!(selector = %constraint.selector, branch = index + 1, "selector branch dropped");
                    failure = ResolveError::prefer(failure, e);
                }
            }
        }
    }
    if selected.is_empty() {
        if let Some(e) = failure {
            resolution.errors.push(e.into_error());
        }
        return resolution;
    }

    let mut types: Vec<TypeHandle<'a>> = Vec::new();
    let mut failure = None;
    for decl in selected {
        for (index, path) in field_xpath.paths.iter().enumerate() {
            let mut warnings = Vec::new();
            let branch = format!("field '{}' branch {}", field, index + 1);
            match resolver.field_types(decl, path, &mut warnings) {
                Ok(found) => {
                    for handle in found {
                        if !types.iter().any(|t| t.same(&handle)) {
                            types.push(handle);
                        }
                    }
                }
                Err(e) if e.is_soft() && mode == BranchMode::AnyBranch => {
                    tracing::trace!(field = field, branch = index + 1, "field branch dropped");
                    failure = ResolveError::prefer(failure, e.in_context(&branch));
                }
                Err(e) => resolution.errors.push(e.into_error().in_context(&branch)),
            }
            resolution
                .errors
                .extend(warnings.into_iter().map(|w| w.in_context(&branch)));
        }
    }

    match types.len() {
        0 => {
            if let Some(e) = failure {
                resolution.errors.push(e.into_error());
            }
        }
        1 => resolution.field_type = Some(FieldType::Single(types[0])),
        _ => {
            let incompatible = types
                .iter()
                .enumerate()
                .flat_map(|(i, a)| types[i + 1..].iter().map(move |b| (a, b)))
                .find(|(a, b)| !compatible(cx.schema, a, b));
            match incompatible {
                Some((a, b)) => resolution.errors.push(schema_error(
                    ErrorKind::IncompatibleFieldTypes,
                    format!(
                        "field '{}' resolves to incompatible types {} and {}",
                        field,
                        a.display_name(),
                        b.display_name()
                    ),
                )),
                None => resolution.field_type = Some(FieldType::Union(types)),
            }
        }
    }
    resolution
}

// =============================================================================
// Declaration checks
// =============================================================================

/// Check an identity constraint declared on `decl`
pub fn check_identity_constraint(
    cx: &Context<'_>,
    decl: &ElementDecl,
    constraint: &IdentityConstraint,
    errors: &mut Vec<SchemaError>,
) {
    let context = format!("{} '{}'", constraint.kind, constraint.name);
    let mut local = Vec::new();

    if let Err(e) = validate_ncname(&constraint.name.local_name) {
        local.push(schema_error(ErrorKind::InvalidName, e.to_string()));
    }
    if constraint.fields.is_empty() {
        local.push(schema_error(ErrorKind::IdentityConstraint, "at least one field is required"));
    }
    if constraint.is_keyref() {
        check_keyref(cx.schema, constraint, &mut local);
    }

    let mut parsed = true;
    if let Err(e) = parse_selector(&constraint.selector, &constraint.namespaces) {
        local.push(e);
        parsed = false;
    }
    for field in &constraint.fields {
        if let Err(e) = parse_field(field, &constraint.namespaces) {
            local.push(e);
            parsed = false;
        }
    }

    if parsed {
        for field in &constraint.fields {
            let resolution = resolve_field_type(cx, decl, constraint, field, BranchMode::AnyBranch);
            for e in resolution.errors {
                if e.is(ErrorKind::XPathUnresolvable) {
                    tracing::trace!(constraint = %constraint.name, error = %e, "field not statically resolvable");
                } else {
                    local.push(e);
                }
            }
        }
    }

    errors.extend(local.into_iter().map(|e| e.in_context(&context)));
}

fn check_keyref(schema: &Schema, constraint: &IdentityConstraint, errors: &mut Vec<SchemaError>) {
    let Some(refer) = &constraint.refer else {
        errors.push(schema_error(ErrorKind::IdentityConstraint, "keyref requires a 'refer'"));
        return;
    };
    let registry: IndexMap<&QName, &IdentityConstraint> = collect_identity_constraints(schema)
        .into_iter()
        .rev()
        .map(|c| (&c.name, c))
        .collect();
    match registry.get(refer) {
        None => errors.push(schema_error(
            ErrorKind::NotFound,
            format!("referenced key '{}' not found", refer),
        )),
        Some(target) if target.is_keyref() => errors.push(schema_error(
            ErrorKind::IdentityConstraint,
            format!("refer '{}' names a keyref, not a key or unique", refer),
        )),
        Some(target) if target.fields.len() != constraint.fields.len() => errors.push(schema_error(
            ErrorKind::IdentityConstraint,
            format!(
                "keyref has {} field(s) but the referenced {} '{}' has {}",
                constraint.fields.len(),
                target.kind,
                refer,
                target.fields.len()
            ),
        )),
        Some(_) => {}
    }
}
