//! Content model analysis
//!
//! Element Declarations Consistent and Unique Particle Attribution, both run
//! on a content model whose group references have been expanded.
//!
//! UPA works on leaf particles (element declarations and wildcards). For
//! every group the first and last leaf sets of its children are compared:
//! choice and all children pairwise, sequence children in order, where a
//! required particle between two children separates them. Repeating
//! particles are also compared with themselves, since after one complete
//! occurrence the next may start.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cos-nonambig

use indexmap::IndexMap;
use std::ptr;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::namespaces::QName;

use super::elements::ElementDecl;
use super::globals::{Context, Schema};
use super::groups::{expand_group_refs, is_emptiable, GroupKind, ModelGroup};
use super::particles::{Occurs, Particle};
use super::types::TypeHandle;
use super::wildcards::Wildcard;

// =============================================================================
// Element Declarations Consistent
// =============================================================================

/// Check that element declarations sharing a name within a content model
/// have the same type
pub fn check_element_consistency(cx: &Context<'_>, particle: &Particle, errors: &mut Vec<SchemaError>) {
    let expanded = expand_group_refs(cx, particle);
    let mut declared: IndexMap<QName, TypeHandle<'_>> = IndexMap::new();
    let mut reported = Vec::new();
    visit_elements(&expanded, &mut |decl| {
        if decl.occurs.is_empty() {
            return;
        }
        let name = cx.schema.element_name(decl);
        let Some(element_type) = cx.schema.element_type(decl) else {
            return;
        };
        match declared.get(&name) {
            None => {
                declared.insert(name, element_type);
            }
            Some(first) if first.same(&element_type) => {}
            Some(first) => {
                if !reported.contains(&name) {
                    errors.push(schema_error(
                        ErrorKind::ElementDeclarationsInconsistent,
                        format!(
                            "element '{}' is declared with type {} and with type {}",
                            name,
                            first.display_name(),
                            element_type.display_name()
                        ),
                    ));
                    reported.push(name);
                }
            }
        }
    });
}

fn visit_elements<'p>(particle: &'p Particle, visit: &mut impl FnMut(&'p ElementDecl)) {
    match particle {
        Particle::Element(decl) => visit(decl),
        Particle::Group(group) => {
            for child in &group.particles {
                visit_elements(child, visit);
            }
        }
        Particle::GroupRef(_) | Particle::Any(_) => {}
    }
}

// =============================================================================
// Unique Particle Attribution
// =============================================================================

/// A leaf of the expanded content model
#[derive(Debug, Clone, Copy)]
enum Leaf<'p> {
    Element(&'p ElementDecl),
    Wildcard(&'p Wildcard),
}

impl<'p> Leaf<'p> {
    fn same(&self, other: &Leaf<'_>) -> bool {
        match (self, other) {
            (Leaf::Element(a), Leaf::Element(b)) => ptr::eq(*a, *b),
            (Leaf::Wildcard(a), Leaf::Wildcard(b)) => ptr::eq(*a, *b),
            _ => false,
        }
    }

    fn describe(&self, schema: &Schema) -> String {
        match self {
            Leaf::Element(decl) => format!("element '{}'", schema.element_name(decl)),
            Leaf::Wildcard(wildcard) => format!("wildcard {}", wildcard.namespace),
        }
    }
}

/// Check whether two leaves can match the same element
fn leaves_conflict(schema: &Schema, a: &Leaf<'_>, b: &Leaf<'_>) -> bool {
    match (a, b) {
        (Leaf::Element(x), Leaf::Element(y)) => {
            let x_name = schema.element_name(x);
            let y_name = schema.element_name(y);
            x_name == y_name || schema.is_substitutable(&x_name, &y_name) || schema.is_substitutable(&y_name, &x_name)
        }
        (Leaf::Element(decl), Leaf::Wildcard(wildcard)) | (Leaf::Wildcard(wildcard), Leaf::Element(decl)) => {
            wildcard.is_namespace_allowed(&schema.element_name(decl).namespace)
        }
        (Leaf::Wildcard(x), Leaf::Wildcard(y)) => x.namespace.overlaps(&y.namespace),
    }
}

struct UpaChecker<'c> {
    cx: &'c Context<'c>,
    errors: Vec<SchemaError>,
    truncated: bool,
}

impl<'c> UpaChecker<'c> {
    fn new(cx: &'c Context<'c>) -> Self {
        Self {
            cx,
            errors: Vec::new(),
            truncated: false,
        }
    }

    fn emptiable(&self, particle: &Particle) -> bool {
        is_emptiable(self.cx.schema, particle)
    }

    fn cap<'p>(&mut self, leaves: &mut Vec<Leaf<'p>>) {
        if let Err(e) = self.cx.limits.check_leaves(leaves.len()) {
            if !self.truncated {
                tracing::warn!(error = %e, "leaf set truncated during UPA check");
            }
            self.truncated = true;
            leaves.truncate(self.cx.limits.max_leaves);
        }
    }

    /// Leaves that can match the first element of a particle
    fn first<'p>(&mut self, particle: &'p Particle) -> Vec<Leaf<'p>> {
        let mut leaves = Vec::new();
        self.collect_first(particle, &mut leaves);
        self.cap(&mut leaves);
        leaves
    }

    fn collect_first<'p>(&self, particle: &'p Particle, leaves: &mut Vec<Leaf<'p>>) {
        if particle.occurs().is_empty() || leaves.len() > self.cx.limits.max_leaves {
            return;
        }
        match particle {
            Particle::Element(decl) => leaves.push(Leaf::Element(decl)),
            Particle::Any(any) => leaves.push(Leaf::Wildcard(&any.wildcard)),
            Particle::GroupRef(_) => {}
            Particle::Group(group) => match group.kind {
                GroupKind::Sequence => {
                    for child in &group.particles {
                        self.collect_first(child, leaves);
                        if !self.emptiable(child) {
                            break;
                        }
                    }
                }
                GroupKind::Choice | GroupKind::All => {
                    for child in &group.particles {
                        self.collect_first(child, leaves);
                    }
                }
            },
        }
    }

    /// Leaves that can still match once the particle may have completed
    fn tail<'p>(&mut self, particle: &'p Particle) -> Vec<Leaf<'p>> {
        let mut leaves = Vec::new();
        self.collect_tail(particle, &mut leaves);
        self.cap(&mut leaves);
        leaves
    }

    fn collect_tail<'p>(&self, particle: &'p Particle, leaves: &mut Vec<Leaf<'p>>) {
        let occurs = particle.occurs();
        if occurs.is_empty() || leaves.len() > self.cx.limits.max_leaves {
            return;
        }
        if occurs.max > Occurs::ONE {
            self.collect_first(particle, leaves);
        }
        let Particle::Group(group) = particle else {
            return;
        };
        self.collect_group_tail(group, leaves);
    }

    fn collect_group_tail<'p>(&self, group: &'p ModelGroup, leaves: &mut Vec<Leaf<'p>>) {
        match group.kind {
            GroupKind::Sequence => {
                for child in group.particles.iter().rev() {
                    self.collect_tail(child, leaves);
                    if !self.emptiable(child) {
                        break;
                    }
                    self.collect_first(child, leaves);
                }
            }
            GroupKind::Choice => {
                for child in &group.particles {
                    self.collect_tail(child, leaves);
                }
            }
            GroupKind::All => {
                for child in &group.particles {
                    self.collect_tail(child, leaves);
                    if self.emptiable(child) {
                        self.collect_first(child, leaves);
                    }
                }
            }
        }
    }

    fn report<'p>(&mut self, a: &[Leaf<'p>], b: &[Leaf<'p>]) -> bool {
        let schema = self.cx.schema;
        for x in a {
            for y in b {
                if x.same(y) || !leaves_conflict(schema, x, y) {
                    continue;
                }
                self.errors.push(schema_error(
                    ErrorKind::UpaViolation,
                    format!(
                        "ambiguous content model: {} and {} can match the same element",
                        x.describe(schema),
                        y.describe(schema)
                    ),
                ));
                return true;
            }
        }
        false
    }

    fn pair_check<'p>(&mut self, p1: &'p Particle, p2: &'p Particle) {
        if p1.occurs().is_empty() || p2.occurs().is_empty() {
            return;
        }
        let first1 = self.first(p1);
        let first2 = self.first(p2);
        self.report(&first1, &first2);
    }

    /// Children `i < j` of a sequence compete only when everything between
    /// them is emptiable; the open tail of `i` is then matched against `j`
    fn sequence_pair_check<'p>(&mut self, children: &'p [Particle], i: usize, j: usize) {
        let (pi, pj) = (&children[i], &children[j]);
        if pi.occurs().is_empty() || pj.occurs().is_empty() {
            return;
        }
        if children[i + 1..j].iter().any(|between| !self.emptiable(between)) {
            return;
        }
        let mut open = self.tail(pi);
        if self.emptiable(pi) {
            open.extend(self.first(pi));
        }
        if open.is_empty() {
            return;
        }
        let first = self.first(pj);
        self.report(&open, &first);
    }

    fn check<'p>(&mut self, particle: &'p Particle) {
        if particle.occurs().is_empty() {
            return;
        }
        if particle.occurs().max > Occurs::ONE {
            if let Particle::Group(group) = particle {
                let mut inner = Vec::new();
                self.collect_group_tail(group, &mut inner);
                self.cap(&mut inner);
                let first = self.first(particle);
                self.report(&inner, &first);
            }
        }
        let Particle::Group(group) = particle else {
            return;
        };
        let children = &group.particles;
        match group.kind {
            GroupKind::Choice | GroupKind::All => {
                for i in 0..children.len() {
                    for j in i + 1..children.len() {
                        self.pair_check(&children[i], &children[j]);
                    }
                }
            }
            GroupKind::Sequence => {
                for i in 0..children.len() {
                    for j in i + 1..children.len() {
                        self.sequence_pair_check(children, i, j);
                    }
                }
            }
        }
        for child in children {
            self.check(child);
        }
    }
}

/// Check Unique Particle Attribution on a content model
pub fn check_upa(cx: &Context<'_>, particle: &Particle, errors: &mut Vec<SchemaError>) {
    let expanded = expand_group_refs(cx, particle);
    let mut checker = UpaChecker::new(cx);
    checker.check(&expanded);
    errors.extend(checker.errors);
}
