//! Schema driver
//!
//! Runs every per-declaration check over a raw [`Schema`] in a fixed order
//! (elements, attributes, types, groups, attribute groups, notations,
//! identity-constraint names), accumulating diagnostics without aborting on
//! the first failure. An accepted schema is returned as a [`ResolvedSchema`].

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::limits::Limits;
use crate::names::validate_ncname;
use crate::namespaces::QName;

use super::attributes::{check_attribute_decl, check_attribute_group};
use super::complex_types::{check_complex_type, Content};
use super::elements::check_element;
use super::facets::{Facet, FacetEntry};
use super::globals::{Context, Notation, Schema};
use super::groups::check_named_group;
use super::identities::check_identity_names;
use super::restrictions::materialize;
use super::simple_types::{check_simple_type, SimpleDerivation};
use super::types::{TypeDefinition, TypeHandle};

/// Check a raw schema with default limits, returning every diagnostic in
/// declaration order
pub fn validate_structure(schema: &Schema) -> Vec<SchemaError> {
    let limits = Limits::default();
    SchemaChecker::new(limits).diagnose(schema)
}

/// Schema checker with configurable traversal limits
#[derive(Debug, Clone, Default)]
pub struct SchemaChecker {
    limits: Limits,
}

impl SchemaChecker {
    /// Create a checker
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Configured limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Check a schema, consuming it into a [`ResolvedSchema`] when no
    /// diagnostic is found
    pub fn check(&self, schema: Schema) -> Result<ResolvedSchema, Vec<SchemaError>> {
        let errors = self.diagnose(&schema);
        if errors.is_empty() {
            Ok(ResolvedSchema::resolve(schema))
        } else {
            Err(errors)
        }
    }

    /// All diagnostics for a schema
    pub fn diagnose(&self, schema: &Schema) -> Vec<SchemaError> {
        let cx = Context::new(schema, &self.limits);
        let mut pass = Pass {
            errors: Vec::new(),
            limits: &self.limits,
        };

        tracing::debug!(count = schema.elements.len(), "checking element declarations");
        for element in schema.elements.values() {
            pass.run("element", &element.name, |errors| check_element(&cx, element, errors));
        }

        tracing::debug!(count = schema.attributes.len(), "checking attribute declarations");
        for attribute in schema.attributes.values() {
            pass.run("attribute", &attribute.name, |errors| check_attribute_decl(&cx, attribute, errors));
        }

        tracing::debug!(count = schema.types.len(), "checking type definitions");
        for (name, definition) in &schema.types {
            pass.run("type", name, |errors| match definition {
                TypeDefinition::Simple(st) => check_simple_type(&cx, st, errors),
                TypeDefinition::Complex(ct) => check_complex_type(&cx, ct, errors),
            });
        }

        tracing::debug!(count = schema.groups.len(), "checking model groups");
        for group in schema.groups.values() {
            pass.run("group", &group.name, |errors| check_named_group(&cx, group, errors));
        }

        tracing::debug!(count = schema.attribute_groups.len(), "checking attribute groups");
        for group in schema.attribute_groups.values() {
            pass.run("attribute group", &group.name, |errors| check_attribute_group(&cx, group, errors));
        }

        tracing::debug!(count = schema.notations.len(), "checking notations");
        for notation in schema.notations.values() {
            pass.run("notation", &notation.name, |errors| check_notation(notation, errors));
        }

        pass.run_unscoped(|errors| check_identity_names(schema, errors));

        tracing::debug!(errors = pass.errors.len(), "schema check finished");
        pass.errors
    }
}

/// Error accumulator honoring `max_errors`
struct Pass<'l> {
    errors: Vec<SchemaError>,
    limits: &'l Limits,
}

impl Pass<'_> {
    fn run(&mut self, kind: &str, name: &QName, check: impl FnOnce(&mut Vec<SchemaError>)) {
        let mut local = Vec::new();
        check(&mut local);
        if !local.is_empty() {
            tracing::debug!(kind, name = %name, errors = local.len(), "declaration rejected");
        }
        self.absorb(local);
    }

    fn run_unscoped(&mut self, check: impl FnOnce(&mut Vec<SchemaError>)) {
        let mut local = Vec::new();
        check(&mut local);
        self.absorb(local);
    }

    fn absorb(&mut self, local: Vec<SchemaError>) {
        for error in local {
            if !self.limits.accepts_error(self.errors.len()) {
                tracing::warn!(max_errors = self.limits.max_errors, "error limit reached, dropping diagnostics");
                return;
            }
            self.errors.push(error);
        }
    }
}

fn check_notation(notation: &Notation, errors: &mut Vec<SchemaError>) {
    if let Err(e) = validate_ncname(&notation.name.local_name) {
        errors.push(schema_error(ErrorKind::InvalidName, format!("notation: {}", e)));
    }
    if notation.public.is_none() && notation.system.is_none() {
        errors.push(schema_error(
            ErrorKind::NotationDeclaration,
            format!("notation '{}' has neither a public nor a system identifier", notation.name),
        ));
    }
}

// =============================================================================
// Resolved schema
// =============================================================================

/// A schema that passed every check.
///
/// Deferred facets of named types are replaced by typed facets and the base
/// of every named derived type is recorded next to it.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSchema {
    schema: Schema,
    bases: IndexMap<QName, QName>,
    #[serde(skip)]
    facets: IndexMap<QName, Vec<Facet>>,
}

impl ResolvedSchema {
    fn resolve(mut schema: Schema) -> Self {
        let mut bases = IndexMap::new();
        let mut facets = IndexMap::new();
        for (name, definition) in &schema.types {
            let handle = definition.handle();
            if let Some(base_name) = handle.base(&schema).and_then(|b| b.name()) {
                bases.insert(name.clone(), base_name);
            }
            if let Some(bound) = bind_facets(&schema, definition) {
                facets.insert(name.clone(), bound);
            }
        }
        for (name, bound) in &facets {
            if let Some(entries) = schema.types.get_mut(name).and_then(facet_entries_mut) {
                *entries = bound.iter().cloned().map(FacetEntry::Typed).collect();
            }
        }
        tracing::debug!(types = bases.len(), "schema resolved");
        Self { schema, bases, facets }
    }

    /// The checked schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Give back the checked schema
    pub fn into_schema(self) -> Schema {
        self.schema
    }

    /// Base of a named derived type
    pub fn resolved_base(&self, name: &QName) -> Option<TypeHandle<'_>> {
        self.bases.get(name).and_then(|base| self.schema.lookup_type(base))
    }

    /// Typed facets of a named restriction, in source order
    pub fn facets(&self, name: &QName) -> &[Facet] {
        self.facets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn bind_facets(schema: &Schema, definition: &TypeDefinition) -> Option<Vec<Facet>> {
    let (base, entries) = match definition {
        TypeDefinition::Simple(st) => match &st.derivation {
            SimpleDerivation::Restriction { base, facets } if !facets.is_empty() => {
                (schema.resolve_simple_ref(base)?, facets)
            }
            _ => return None,
        },
        TypeDefinition::Complex(ct) => match &ct.content {
            Content::Simple(sc) if !sc.facets.is_empty() => {
                let base = schema.lookup_type(&sc.base)?.content_simple_type(schema)?;
                (base, &sc.facets)
            }
            _ => return None,
        },
    };
    entries.iter().map(|entry| materialize(schema, base, entry).ok()).collect()
}

fn facet_entries_mut(definition: &mut TypeDefinition) -> Option<&mut Vec<FacetEntry>> {
    match definition {
        TypeDefinition::Simple(st) => match &mut st.derivation {
            SimpleDerivation::Restriction { facets, .. } => Some(facets),
            _ => None,
        },
        TypeDefinition::Complex(ct) => match &mut ct.content {
            Content::Simple(sc) => Some(&mut sc.facets),
            _ => None,
        },
    }
}
