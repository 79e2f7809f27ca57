//! XSD Model Groups
//!
//! This module implements model groups for XSD content models:
//! - xs:sequence - ordered content
//! - xs:choice - alternative content
//! - xs:all - unordered content (elements only, at most once each)
//!
//! It also carries the structural particle checks (occurrence bounds and the
//! `xs:all` rules), emptiability, effective occurrence ranges and the
//! expansion of named group references used by the UPA and derivation
//! engines.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Model_Groups

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::names::validate_ncname;
use crate::namespaces::QName;

use super::elements::check_element;
use super::globals::{Context, Schema};
use super::particles::{Occurrence, Occurs, Particle};

/// Model group compositor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of particles
    All,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// A sequence, choice or all group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGroup {
    /// Compositor
    pub kind: GroupKind,
    /// Child particles in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub particles: Vec<Particle>,
    /// Occurrence bounds
    #[serde(flatten)]
    pub occurs: Occurrence,
}

impl ModelGroup {
    /// Create a new group occurring once
    pub fn new(kind: GroupKind, particles: Vec<Particle>) -> Self {
        Self {
            kind,
            particles,
            occurs: Occurrence::once(),
        }
    }

    /// `xs:sequence`
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self::new(GroupKind::Sequence, particles)
    }

    /// `xs:choice`
    pub fn choice(particles: Vec<Particle>) -> Self {
        Self::new(GroupKind::Choice, particles)
    }

    /// `xs:all`
    pub fn all(particles: Vec<Particle>) -> Self {
        Self::new(GroupKind::All, particles)
    }

    /// Builder-style occurrence
    pub fn with_occurs(mut self, occurs: Occurrence) -> Self {
        self.occurs = occurs;
        self
    }

    /// Check if the group has no particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// A named model group definition (`xs:group name=...`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedGroup {
    /// Group name
    pub name: QName,
    /// The group's compositor
    #[serde(flatten)]
    pub group: ModelGroup,
}

impl NamedGroup {
    /// Create a new named group
    pub fn new(name: QName, group: ModelGroup) -> Self {
        Self { name, group }
    }
}

// =============================================================================
// Emptiability and effective occurrence
// =============================================================================

/// Check if a particle can match an empty sequence of elements.
///
/// Unresolvable and circular group references count as not emptiable.
pub fn is_emptiable(schema: &Schema, particle: &Particle) -> bool {
    emptiable_guarded(schema, particle, &mut HashSet::new())
}

fn emptiable_guarded<'a>(schema: &'a Schema, particle: &'a Particle, seen: &mut HashSet<&'a QName>) -> bool {
    let occurs = particle.occurs();
    if occurs.is_emptiable() || occurs.is_empty() {
        return true;
    }
    match particle {
        Particle::Element(_) | Particle::Any(_) => false,
        Particle::Group(group) => group_emptiable(schema, group, seen),
        Particle::GroupRef(group_ref) => {
            let Some(named) = schema.groups.get(&group_ref.name) else {
                return false;
            };
            if !seen.insert(&named.name) {
                tracing::trace!(group = %named.name, "group reference cycle");
                return false;
            }
            let result = group_emptiable(schema, &named.group, seen);
            seen.remove(&named.name);
            result
        }
    }
}

fn group_emptiable<'a>(schema: &'a Schema, group: &'a ModelGroup, seen: &mut HashSet<&'a QName>) -> bool {
    match group.kind {
        GroupKind::Sequence | GroupKind::All => group.particles.iter().all(|p| emptiable_guarded(schema, p, seen)),
        GroupKind::Choice => group.is_empty() || group.particles.iter().any(|p| emptiable_guarded(schema, p, seen)),
    }
}

/// Effective total range of a particle.
///
/// For a sequence or all group this is the group range times the sum of
/// the children's ranges; for a choice the minimum is taken over the
/// children that can occur and the maximum over all children.
pub fn effective_occurrence(schema: &Schema, particle: &Particle) -> Occurrence {
    effective_guarded(schema, particle, &mut HashSet::new())
}

fn effective_guarded<'a>(schema: &'a Schema, particle: &'a Particle, seen: &mut HashSet<&'a QName>) -> Occurrence {
    match particle {
        Particle::Element(_) | Particle::Any(_) => particle.occurs(),
        Particle::Group(group) => group_effective(schema, group, group.occurs, seen),
        Particle::GroupRef(group_ref) => {
            let Some(named) = schema.groups.get(&group_ref.name) else {
                return group_ref.occurs;
            };
            if !seen.insert(&named.name) {
                return group_ref.occurs;
            }
            let result = group_effective(schema, &named.group, group_ref.occurs, seen);
            seen.remove(&named.name);
            result
        }
    }
}

fn group_effective<'a>(
    schema: &'a Schema,
    group: &'a ModelGroup,
    occurs: Occurrence,
    seen: &mut HashSet<&'a QName>,
) -> Occurrence {
    let children: Vec<Occurrence> = group.particles.iter().map(|p| effective_guarded(schema, p, seen)).collect();
    let (min, max) = match group.kind {
        GroupKind::Sequence | GroupKind::All => children.iter().fold((Occurs::ZERO, Occurs::ZERO), |(min, max), c| {
            (min.add(c.min_occurs()), max.add(c.max))
        }),
        GroupKind::Choice => {
            let min = children
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.min_occurs())
                .min()
                .unwrap_or(Occurs::ZERO);
            let max = children.iter().map(|c| c.max).max().unwrap_or(Occurs::ZERO);
            (min, max)
        }
    };
    Occurrence {
        min: occurs.min_occurs().mul(min).count().unwrap_or(u64::MAX),
        max: occurs.max.mul(max),
    }
}

// =============================================================================
// Group reference expansion
// =============================================================================

/// Replace every group reference by a copy of the referenced group, with the
/// reference's occurrence.
///
/// Circular references expand to an empty group at the point the cycle
/// closes; unresolvable references are kept as they are.
pub fn expand_group_refs(cx: &Context<'_>, particle: &Particle) -> Particle {
    let mut stack = Vec::new();
    expand_guarded(cx, particle, &mut stack)
}

fn expand_guarded(cx: &Context<'_>, particle: &Particle, stack: &mut Vec<QName>) -> Particle {
    match particle {
        Particle::Group(group) => {
            if stack.len() > cx.limits.max_depth {
                tracing::warn!(depth = stack.len(), "group expansion depth limit reached");
                return Particle::Group(ModelGroup::new(group.kind, Vec::new()).with_occurs(group.occurs));
            }
            Particle::Group(ModelGroup {
                kind: group.kind,
                particles: group.particles.iter().map(|p| expand_guarded(cx, p, stack)).collect(),
                occurs: group.occurs,
            })
        }
        Particle::GroupRef(group_ref) => {
            let Some(named) = cx.schema.groups.get(&group_ref.name) else {
                return particle.clone();
            };
            if stack.contains(&named.name) || stack.len() > cx.limits.max_depth {
                tracing::trace!(group = %named.name, "circular group reference not expanded");
                return Particle::Group(ModelGroup::new(named.group.kind, Vec::new()).with_occurs(group_ref.occurs));
            }
            stack.push(named.name.clone());
            let expanded = Particle::Group(ModelGroup {
                kind: named.group.kind,
                particles: named.group.particles.iter().map(|p| expand_guarded(cx, p, stack)).collect(),
                occurs: group_ref.occurs,
            });
            stack.pop();
            expanded
        }
        Particle::Element(_) | Particle::Any(_) => particle.clone(),
    }
}

// =============================================================================
// Structural checks
// =============================================================================

/// Check a named model group definition
pub fn check_named_group(cx: &Context<'_>, named: &NamedGroup, errors: &mut Vec<SchemaError>) {
    if let Err(e) = validate_ncname(&named.name.local_name) {
        errors.push(schema_error(ErrorKind::InvalidName, e.to_string()));
    }
    if !named.group.occurs.is_once() {
        errors.push(schema_error(
            ErrorKind::ParticleOccurrence,
            format!(
                "named group '{}' must occur exactly once, got {}",
                named.name, named.group.occurs
            ),
        ));
    }
    if refers_to_itself(cx.schema, &named.name) {
        errors.push(schema_error(
            ErrorKind::CircularDerivation,
            format!("group '{}' refers to itself", named.name),
        ));
        return;
    }
    check_group(cx, &named.group, None, 0, errors);
}

/// Check whether a named group reaches a reference to itself through
/// nested groups and group references
fn refers_to_itself(schema: &Schema, name: &QName) -> bool {
    let Some(start) = schema.groups.get(name) else {
        return false;
    };
    let mut seen = HashSet::new();
    let mut stack: Vec<&ModelGroup> = vec![&start.group];
    while let Some(group) = stack.pop() {
        for particle in &group.particles {
            match particle {
                Particle::Group(nested) => stack.push(nested),
                Particle::GroupRef(group_ref) => {
                    if &group_ref.name == name {
                        return true;
                    }
                    if seen.insert(&group_ref.name) {
                        if let Some(target) = schema.groups.get(&group_ref.name) {
                            stack.push(&target.group);
                        }
                    }
                }
                Particle::Element(_) | Particle::Any(_) => {}
            }
        }
    }
    false
}

/// Check a particle of a content model. `parent` is the compositor of the
/// enclosing group, `None` at the top of a content model.
pub fn check_particle(
    cx: &Context<'_>,
    particle: &Particle,
    parent: Option<GroupKind>,
    depth: usize,
    errors: &mut Vec<SchemaError>,
) {
    if let Err(reason) = particle.occurs().check() {
        errors.push(schema_error(
            ErrorKind::ParticleOccurrence,
            format!("{}: {}", particle.describe(), reason),
        ));
    }
    match particle {
        Particle::Element(decl) => {
            let mut found = Vec::new();
            check_element(cx, decl, &mut found);
            errors.extend(found.into_iter().map(|e| e.in_context(format!("local element '{}'", decl.name))));
        }
        Particle::Any(_) => {}
        Particle::GroupRef(group_ref) => match cx.schema.groups.get(&group_ref.name) {
            None => errors.push(schema_error(
                ErrorKind::NotFound,
                format!("referenced group '{}' not found", group_ref.name),
            )),
            Some(named) if named.group.kind == GroupKind::All => {
                check_all_placement(&named.group, group_ref.occurs, parent, errors);
            }
            Some(_) => {}
        },
        Particle::Group(group) => {
            if let Err(e) = cx.limits.check_depth(depth) {
                errors.push(schema_error(
                    ErrorKind::ParticleOccurrence,
                    format!("content model nesting: {}", e),
                ));
                return;
            }
            check_group(cx, group, parent, depth, errors);
        }
    }
}

fn check_group(
    cx: &Context<'_>,
    group: &ModelGroup,
    parent: Option<GroupKind>,
    depth: usize,
    errors: &mut Vec<SchemaError>,
) {
    if group.kind == GroupKind::All {
        check_all_placement(group, group.occurs, parent, errors);
        check_all_children(cx.schema, group, errors);
    }
    for particle in &group.particles {
        check_particle(cx, particle, Some(group.kind), depth + 1, errors);
    }
}

fn check_all_placement(group: &ModelGroup, occurs: Occurrence, parent: Option<GroupKind>, errors: &mut Vec<SchemaError>) {
    match parent {
        Some(GroupKind::Sequence) | Some(GroupKind::Choice) => {
            errors.push(schema_error(
                ErrorKind::AllGroupConstraint,
                format!("all group may not be a child of a {}", parent.map(|k| k.to_string()).unwrap_or_default()),
            ));
        }
        Some(GroupKind::All) if occurs.min > 0 => {
            errors.push(schema_error(
                ErrorKind::AllGroupConstraint,
                "nested all group must have minOccurs=0",
            ));
        }
        _ => {}
    }
    if occurs.min > 1 || !occurs.max.is_one() {
        errors.push(schema_error(
            ErrorKind::AllGroupConstraint,
            format!(
                "all group must have minOccurs 0 or 1 and maxOccurs 1, got {} ({} particles)",
                occurs,
                group.particles.len()
            ),
        ));
    }
}

fn check_all_children(schema: &Schema, group: &ModelGroup, errors: &mut Vec<SchemaError>) {
    let mut names = HashSet::new();
    for particle in &group.particles {
        if particle.occurs().max > Occurs::ONE {
            errors.push(schema_error(
                ErrorKind::AllGroupConstraint,
                format!("{} in an all group may occur at most once", particle.describe()),
            ));
        }
        if let Particle::Element(decl) = particle {
            let name = schema.element_name(decl);
            if !names.insert(name.clone()) {
                errors.push(schema_error(
                    ErrorKind::AllGroupConstraint,
                    format!("duplicate element '{}' in all group", name),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::validators::builders::{element, SchemaBuilder};
    use crate::validators::particles::GroupRef;

    fn elem(local: &str) -> Particle {
        element("urn:x", local).local().typed(QName::xsd("string")).into()
    }

    fn kinds(schema: &Schema, particle: &Particle) -> Vec<ErrorKind> {
        let limits = Limits::default();
        let cx = Context::new(schema, &limits);
        let mut errors = Vec::new();
        check_particle(&cx, particle, None, 0, &mut errors);
        errors.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_occurrence_errors() {
        let schema = Schema::new("urn:x");
        let bad: Particle = element("urn:x", "a")
            .local()
            .typed(QName::xsd("string"))
            .occurs(Occurrence::new(3, Occurs::Count(2)))
            .into();
        assert_eq!(kinds(&schema, &ModelGroup::sequence(vec![bad]).into()), [ErrorKind::ParticleOccurrence]);
        let removed: Particle = element("urn:x", "a").local().typed(QName::xsd("string")).occurs(Occurrence::empty()).into();
        assert!(kinds(&schema, &ModelGroup::sequence(vec![removed]).into()).is_empty());
    }

    #[test]
    fn test_all_group_rules() {
        let schema = Schema::new("urn:x");
        let inner_all: Particle = ModelGroup::all(vec![elem("a")]).into();
        assert_eq!(
            kinds(&schema, &ModelGroup::sequence(vec![inner_all]).into()),
            [ErrorKind::AllGroupConstraint]
        );

        let repeated: Particle = element("urn:x", "a").local().typed(QName::xsd("string")).occurs(Occurrence::one_or_more()).into();
        assert_eq!(kinds(&schema, &ModelGroup::all(vec![repeated]).into()), [ErrorKind::AllGroupConstraint]);

        assert_eq!(
            kinds(&schema, &ModelGroup::all(vec![elem("a"), elem("a")]).into()),
            [ErrorKind::AllGroupConstraint]
        );

        let twice: Particle = ModelGroup::all(vec![elem("a")]).with_occurs(Occurrence::new(2, Occurs::Count(2))).into();
        assert_eq!(kinds(&schema, &twice), [ErrorKind::AllGroupConstraint]);
    }

    #[test]
    fn test_nested_all_needs_min_zero() {
        let schema = Schema::new("urn:x");
        let required: Particle = ModelGroup::all(vec![elem("b")]).into();
        let optional: Particle = ModelGroup::all(vec![elem("c")]).with_occurs(Occurrence::optional()).into();
        assert_eq!(
            kinds(&schema, &ModelGroup::all(vec![elem("a"), required]).into()),
            [ErrorKind::AllGroupConstraint]
        );
        assert!(kinds(&schema, &ModelGroup::all(vec![elem("a"), optional]).into()).is_empty());
    }

    #[test]
    fn test_emptiability() {
        let schema = Schema::new("urn:x");
        let empty_all: Particle = ModelGroup::all(vec![]).with_occurs(Occurrence::optional()).into();
        assert!(is_emptiable(&schema, &empty_all));
        let seq: Particle = ModelGroup::sequence(vec![elem("a")]).into();
        assert!(!is_emptiable(&schema, &seq));
        let optional_child: Particle = element("urn:x", "a").local().occurs(Occurrence::optional()).into();
        let choice: Particle = ModelGroup::choice(vec![elem("a"), optional_child]).into();
        assert!(is_emptiable(&schema, &choice));
    }

    #[test]
    fn test_effective_occurrence() {
        let schema = Schema::new("urn:x");
        let seq: Particle = ModelGroup::sequence(vec![
            elem("a"),
            element("urn:x", "b").local().occurs(Occurrence::new(0, Occurs::Count(3))).into(),
        ])
        .with_occurs(Occurrence::new(2, Occurs::Count(2)))
        .into();
        assert_eq!(effective_occurrence(&schema, &seq), Occurrence::new(2, Occurs::Count(8)));

        let choice: Particle = ModelGroup::choice(vec![
            element("urn:x", "a").local().occurs(Occurrence::new(2, Occurs::Count(2))).into(),
            element("urn:x", "b").local().occurs(Occurrence::one_or_more()).into(),
            element("urn:x", "c").local().occurs(Occurrence::empty()).into(),
        ])
        .into();
        assert_eq!(effective_occurrence(&schema, &choice), Occurrence::one_or_more());
    }

    #[test]
    fn test_named_groups() {
        let schema = SchemaBuilder::new("urn:x")
            .group("G", ModelGroup::sequence(vec![elem("a")]))
            .group("Loop", ModelGroup::sequence(vec![GroupRef::new(QName::new("urn:x", "Loop")).into()]))
            .group("Twice", ModelGroup::sequence(vec![elem("a")]).with_occurs(Occurrence::optional()))
            .build();
        let limits = Limits::default();
        let cx = Context::new(&schema, &limits);
        let check = |local: &str| {
            let mut errors = Vec::new();
            check_named_group(&cx, &schema.groups[&QName::new("urn:x", local)], &mut errors);
            errors.into_iter().map(|e| e.kind).collect::<Vec<_>>()
        };
        assert!(check("G").is_empty());
        assert_eq!(check("Loop"), [ErrorKind::CircularDerivation]);
        assert_eq!(check("Twice"), [ErrorKind::ParticleOccurrence]);

        let missing: Particle = GroupRef::new(QName::new("urn:x", "Nope")).into();
        assert_eq!(kinds(&schema, &missing), [ErrorKind::NotFound]);
    }

    #[test]
    fn test_expand_group_refs() {
        let schema = SchemaBuilder::new("urn:x")
            .group("G", ModelGroup::choice(vec![elem("a"), elem("b")]))
            .group("Loop", ModelGroup::sequence(vec![elem("c"), GroupRef::new(QName::new("urn:x", "Loop")).into()]))
            .build();
        let limits = Limits::default();
        let cx = Context::new(&schema, &limits);

        let reference: Particle = GroupRef {
            name: QName::new("urn:x", "G"),
            occurs: Occurrence::zero_or_more(),
        }
        .into();
        let Particle::Group(expanded) = expand_group_refs(&cx, &reference) else {
            panic!("expected a group");
        };
        assert_eq!(expanded.kind, GroupKind::Choice);
        assert_eq!(expanded.occurs, Occurrence::zero_or_more());
        assert_eq!(expanded.particles.len(), 2);

        let looped: Particle = GroupRef::new(QName::new("urn:x", "Loop")).into();
        let Particle::Group(outer) = expand_group_refs(&cx, &looped) else {
            panic!("expected a group");
        };
        let Particle::Group(inner) = &outer.particles[1] else {
            panic!("expected the cycle to close with a group");
        };
        assert!(inner.is_empty());
    }

    #[test]
    fn test_group_json() {
        let group = ModelGroup::choice(vec![elem("a")]).with_occurs(Occurrence::zero_or_more());
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["kind"], "choice");
        assert_eq!(json["max_occurs"], "unbounded");
        assert_eq!(json["particles"][0]["particle"], "element");
    }
}
