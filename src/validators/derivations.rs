//! Particle Derivation OK
//!
//! Checks that the content model of a complex type derived by restriction
//! is a valid restriction of its base type's content model. Both particles
//! are expanded and normalized first: pointless groups (a once-occurring
//! group with a single child, or a group nested in a group of the same kind)
//! are flattened and removed particles (`maxOccurs=0`) are dropped.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cos-particle-restrict

use crate::error::{schema_error, ErrorKind, SchemaError};

use super::elements::ElementDecl;
use super::globals::{Context, Schema};
use super::groups::{effective_occurrence, expand_group_refs, is_emptiable, GroupKind, ModelGroup};
use super::particles::{Occurrence, Occurs, Particle};
use super::restrictions::normalize_value;
use super::types::{DerivationMethod, DerivationSet};
use super::wildcards::{AnyElement, Wildcard};

type Outcome = Result<(), SchemaError>;

fn invalid(message: impl Into<String>) -> SchemaError {
    schema_error(ErrorKind::ParticleRestrictionInvalid, message)
}

// =============================================================================
// Normalization
// =============================================================================

/// Flatten pointless groups and drop removed particles
pub fn normalize(particle: &Particle) -> Particle {
    let Particle::Group(group) = particle else {
        return particle.clone();
    };
    let mut particles = Vec::with_capacity(group.particles.len());
    for child in &group.particles {
        if child.occurs().is_empty() {
            continue;
        }
        match normalize(child) {
            Particle::Group(nested)
                if nested.kind == group.kind && nested.kind != GroupKind::All && nested.occurs.is_once() =>
            {
                particles.extend(nested.particles);
            }
            other => particles.push(other),
        }
    }
    if group.occurs.is_once() && particles.len() == 1 {
        if let Some(only) = particles.pop() {
            return only;
        }
    }
    Particle::Group(ModelGroup {
        kind: group.kind,
        particles,
        occurs: group.occurs,
    })
}

// =============================================================================
// Entry point
// =============================================================================

/// Check that `derived` is a valid restriction of `base`
pub fn check_particle_restriction(cx: &Context<'_>, derived: &Particle, base: &Particle) -> Outcome {
    let derived = normalize(&expand_group_refs(cx, derived));
    let base = normalize(&expand_group_refs(cx, base));
    let checker = Restriction { cx, depth: 0 };
    checker.check(&derived, &base)
}

struct Restriction<'c> {
    cx: &'c Context<'c>,
    depth: usize,
}

impl<'c> Restriction<'c> {
    fn schema(&self) -> &'c Schema {
        self.cx.schema
    }

    fn nested(&self) -> Restriction<'c> {
        Restriction {
            cx: self.cx,
            depth: self.depth + 1,
        }
    }

    fn check(&self, derived: &Particle, base: &Particle) -> Outcome {
        if self.depth > self.cx.limits.max_depth {
            return Err(invalid(format!(
                "particle restriction exceeds the depth limit of {}",
                self.cx.limits.max_depth
            )));
        }
        match (derived, base) {
            (Particle::Element(d), Particle::Element(b)) => self.name_and_type_ok(d, b),
            (Particle::Element(d), Particle::Any(b)) => self.ns_compat(d, b),
            (Particle::Element(d), Particle::Group(b)) => self.recurse_as_if_group(d, b),
            (Particle::Any(d), Particle::Any(b)) => self.ns_subset(d, b),
            (Particle::Group(d), Particle::Any(b)) => self.ns_recurse_check_cardinality(d, b),
            (Particle::Group(d), Particle::Group(b)) => self.group_restriction(d, b),
            (Particle::Any(_), Particle::Element(_) | Particle::Group(_)) => Err(invalid(format!(
                "wildcard cannot restrict {}",
                base.describe()
            ))),
            (Particle::Group(d), Particle::Element(_)) => Err(invalid(format!(
                "{} group cannot restrict {}",
                d.kind,
                base.describe()
            ))),
            (Particle::GroupRef(r), _) | (_, Particle::GroupRef(r)) => {
                tracing::warn!(group = %r.name, "unresolved group reference skipped in particle restriction");
                Ok(())
            }
        }
    }

    fn occurrence_ok(&self, what: &str, derived: Occurrence, base: Occurrence) -> Outcome {
        if derived.has_occurs_restriction(&base) {
            Ok(())
        } else {
            Err(invalid(format!(
                "occurrence {} of {} is not a restriction of base occurrence {}",
                derived, what, base
            )))
        }
    }

    /// Element : Element
    fn name_and_type_ok(&self, derived: &ElementDecl, base: &ElementDecl) -> Outcome {
        let schema = self.schema();
        let derived_name = schema.element_name(derived);
        let base_name = schema.element_name(base);
        if derived_name != base_name && !schema.is_substitutable(&derived_name, &base_name) {
            return Err(invalid(format!(
                "element '{}' does not match base element '{}'",
                derived_name, base_name
            )));
        }
        self.occurrence_ok(&format!("element '{}'", derived_name), derived.occurs, base.occurs)?;

        let (Some(d), Some(b)) = (schema.effective_element(derived), schema.effective_element(base)) else {
            return Ok(());
        };
        if d.nillable && !b.nillable {
            return Err(invalid(format!(
                "element '{}' cannot become nillable in a restriction",
                derived_name
            )));
        }
        let (Some(d_type), Some(b_type)) = (schema.element_type(d), schema.element_type(b)) else {
            return Ok(());
        };
        if let Some(base_fixed) = &b.fixed {
            let matches = d.fixed.as_ref().map_or(false, |fixed| {
                match b_type.content_simple_type(schema) {
                    Some(simple) => normalize_value(schema, simple, fixed) == normalize_value(schema, simple, base_fixed),
                    None => fixed == base_fixed,
                }
            });
            if !matches {
                return Err(invalid(format!(
                    "element '{}' must keep the base fixed value '{}'",
                    derived_name, base_fixed
                )));
            }
        }
        if !d.block.is_superset(&b.block) {
            return Err(schema_error(
                ErrorKind::BlockViolation,
                format!(
                    "block='{}' of element '{}' does not include the base block='{}'",
                    d.block, derived_name, b.block
                ),
            ));
        }
        let restriction_only = DerivationSet::of(&[DerivationMethod::Extension]);
        if !d_type.is_derived_from(&b_type, restriction_only, schema) {
            return Err(invalid(format!(
                "type {} of element '{}' is not a restriction of base type {}",
                d_type.display_name(),
                derived_name,
                b_type.display_name()
            )));
        }
        Ok(())
    }

    /// Element : Wildcard
    fn ns_compat(&self, derived: &ElementDecl, base: &AnyElement) -> Outcome {
        let name = self.schema().element_name(derived);
        if !base.is_namespace_allowed(&name.namespace) {
            return Err(invalid(format!(
                "element '{}' is not allowed by base wildcard {}",
                name, base.wildcard.namespace
            )));
        }
        self.occurrence_ok(&format!("element '{}'", name), derived.occurs, base.occurs)
    }

    /// Element : Group
    fn recurse_as_if_group(&self, derived: &ElementDecl, base: &ModelGroup) -> Outcome {
        let wrapped = ModelGroup::new(base.kind, vec![Particle::Element(derived.clone())]);
        self.group_restriction(&wrapped, base)
    }

    /// Wildcard : Wildcard
    fn ns_subset(&self, derived: &AnyElement, base: &AnyElement) -> Outcome {
        self.occurrence_ok("wildcard", derived.occurs, base.occurs)?;
        derived
            .wildcard
            .check_restriction_of(&base.wildcard, ErrorKind::WildcardDerivation)
    }

    /// Group : Wildcard
    fn ns_recurse_check_cardinality(&self, derived: &ModelGroup, base: &AnyElement) -> Outcome {
        let schema = self.schema();
        for child in &derived.particles {
            self.leaves_within(child, &base.wildcard)?;
        }
        let range = effective_occurrence(schema, &Particle::Group(derived.clone()));
        self.occurrence_ok(&format!("{} group", derived.kind), range, base.occurs)
    }

    fn leaves_within(&self, particle: &Particle, wildcard: &Wildcard) -> Outcome {
        match particle {
            Particle::Element(decl) => {
                let name = self.schema().element_name(decl);
                if wildcard.is_namespace_allowed(&name.namespace) {
                    Ok(())
                } else {
                    Err(invalid(format!(
                        "element '{}' is not allowed by base wildcard {}",
                        name, wildcard.namespace
                    )))
                }
            }
            Particle::Any(any) => any.wildcard.check_restriction_of(wildcard, ErrorKind::WildcardDerivation),
            Particle::Group(group) => group.particles.iter().try_for_each(|p| self.leaves_within(p, wildcard)),
            Particle::GroupRef(_) => Ok(()),
        }
    }

    /// Group : Group
    fn group_restriction(&self, derived: &ModelGroup, base: &ModelGroup) -> Outcome {
        match (derived.kind, base.kind) {
            (GroupKind::Sequence, GroupKind::Sequence) | (GroupKind::All, GroupKind::All) => {
                self.occurrence_ok(&format!("{} group", derived.kind), derived.occurs, base.occurs)?;
                self.recurse(derived, base)
            }
            (GroupKind::Choice, GroupKind::Choice) => {
                self.occurrence_ok("choice group", derived.occurs, base.occurs)?;
                self.recurse_lax(derived, base)
            }
            (GroupKind::Sequence, GroupKind::Choice) => self.map_and_sum(derived, base),
            (GroupKind::All, GroupKind::Sequence | GroupKind::Choice) if derived.particles.len() == 1 => {
                match &derived.particles[0] {
                    Particle::Element(decl) if derived.occurs.is_once() || derived.occurs == Occurrence::optional() => {
                        let mut decl = decl.clone();
                        decl.occurs = decl.occurs.scale(&derived.occurs);
                        self.recurse_as_if_group(&decl, base)
                    }
                    _ => self.base_wildcard_restriction(derived, base),
                }
            }
            _ => self.base_wildcard_restriction(derived, base),
        }
    }

    /// Groups of different kinds: the derived group must fit a wildcard of
    /// the base group
    fn base_wildcard_restriction(&self, derived: &ModelGroup, base: &ModelGroup) -> Outcome {
        let wildcard = base.particles.iter().find_map(|p| match p {
            Particle::Any(any) => Some(any),
            _ => None,
        });
        match wildcard {
            Some(any) => self.ns_recurse_check_cardinality(derived, any).map_err(|e| {
                e.in_context(format!(
                    "{} group against the wildcard of the base {} group",
                    derived.kind, base.kind
                ))
            }),
            None => Err(self.kind_mismatch(derived, base)),
        }
    }

    fn kind_mismatch(&self, derived: &ModelGroup, base: &ModelGroup) -> SchemaError {
        invalid(format!("{} group cannot restrict a {} group", derived.kind, base.kind))
    }

    /// Ordered mapping where skipped base particles must be emptiable
    fn recurse(&self, derived: &ModelGroup, base: &ModelGroup) -> Outcome {
        let schema = self.schema();
        let mut remaining = base.particles.iter().enumerate();
        'derived: for (index, child) in derived.particles.iter().enumerate() {
            let mut last_error = None;
            for (base_index, base_child) in remaining.by_ref() {
                match self.nested().check(child, base_child) {
                    Ok(()) => continue 'derived,
                    Err(e) => {
                        if !is_emptiable(schema, base_child) {
                            return Err(e.in_context(format!(
                                "particle {} of the {} group does not match required base particle {}",
                                index + 1,
                                derived.kind,
                                base_index + 1
                            )));
                        }
                        last_error = Some(e);
                    }
                }
            }
            let error = invalid(format!(
                "particle {} ({}) of the {} group has no counterpart in the base group",
                index + 1,
                child.describe(),
                derived.kind
            ));
            return Err(match last_error {
                Some(cause) => SchemaError::wrap(ErrorKind::ParticleRestrictionInvalid, error.message, cause),
                None => error,
            });
        }
        for (base_index, base_child) in remaining {
            if !is_emptiable(schema, base_child) {
                return Err(invalid(format!(
                    "required base particle {} ({}) is missing from the restriction",
                    base_index + 1,
                    base_child.describe()
                )));
            }
        }
        Ok(())
    }

    /// Ordered mapping where base particles may be skipped freely
    fn recurse_lax(&self, derived: &ModelGroup, base: &ModelGroup) -> Outcome {
        let mut remaining = base.particles.iter();
        'derived: for (index, child) in derived.particles.iter().enumerate() {
            for base_child in remaining.by_ref() {
                if self.nested().check(child, base_child).is_ok() {
                    continue 'derived;
                }
            }
            return Err(invalid(format!(
                "particle {} ({}) of the choice group matches no remaining base choice particle",
                index + 1,
                child.describe()
            )));
        }
        Ok(())
    }

    /// Sequence restricting a choice: every particle maps to some base
    /// particle and the sequence's total range fits the choice
    fn map_and_sum(&self, derived: &ModelGroup, base: &ModelGroup) -> Outcome {
        for (index, child) in derived.particles.iter().enumerate() {
            if !base.particles.iter().any(|b| self.nested().check(child, b).is_ok()) {
                return Err(invalid(format!(
                    "particle {} ({}) of the sequence matches no particle of the base choice",
                    index + 1,
                    child.describe()
                )));
            }
        }
        let count = Occurs::Count(derived.particles.len() as u64);
        let total = Occurrence {
            min: derived.occurs.min_occurs().mul(count).count().unwrap_or(u64::MAX),
            max: derived.occurs.max.mul(count),
        };
        self.occurrence_ok("sequence group", total, base.occurs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::namespaces::QName;
    use crate::validators::builders::{element, SchemaBuilder};
    use crate::validators::wildcards::{NamespaceConstraint, ProcessContents};

    fn elem(local: &str, occurs: Occurrence) -> Particle {
        element("urn:x", local).local().typed(QName::xsd("string")).occurs(occurs).into()
    }

    fn any(namespace: NamespaceConstraint, occurs: Occurrence) -> Particle {
        AnyElement::new(Wildcard::new(namespace, ProcessContents::Strict), occurs).into()
    }

    fn restricts(schema: &Schema, derived: Particle, base: Particle) -> Outcome {
        let limits = Limits::default();
        let cx = Context::new(schema, &limits);
        check_particle_restriction(&cx, &derived, &base)
    }

    #[test]
    fn test_normalize_flattens_pointless_groups() {
        let nested = ModelGroup::sequence(vec![
            ModelGroup::sequence(vec![elem("a", Occurrence::once()), elem("b", Occurrence::once())]).into(),
            elem("c", Occurrence::empty()),
        ]);
        let Particle::Group(flat) = normalize(&nested.into()) else {
            panic!("expected a group");
        };
        assert_eq!(flat.particles.len(), 2);
        let single: Particle = ModelGroup::choice(vec![elem("a", Occurrence::optional())]).into();
        assert!(matches!(normalize(&single), Particle::Element(_)));
    }

    #[test]
    fn test_occurrence_bounds() {
        let schema = Schema::new("urn:x");
        assert!(restricts(&schema, elem("a", Occurrence::new(2, Occurs::Count(3))), elem("a", Occurrence::zero_or_more())).is_ok());
        assert!(restricts(&schema, elem("a", Occurrence::zero_or_more()), elem("a", Occurrence::new(0, Occurs::Count(5)))).is_err());
        assert!(restricts(&schema, elem("a", Occurrence::optional()), elem("a", Occurrence::once())).is_err());
    }

    #[test]
    fn test_element_properties() {
        let schema = Schema::new("urn:x");
        let int_a: Particle = element("urn:x", "a").local().typed(QName::xsd("int")).into();
        let decimal_a: Particle = element("urn:x", "a").local().typed(QName::xsd("decimal")).into();
        assert!(restricts(&schema, int_a.clone(), decimal_a.clone()).is_ok());
        assert!(restricts(&schema, decimal_a.clone(), int_a).is_err());

        let mut nillable = element("urn:x", "a").local().typed(QName::xsd("decimal"));
        nillable.nillable = true;
        assert!(restricts(&schema, nillable.into(), decimal_a.clone()).is_err());

        let fixed_base: Particle = element("urn:x", "a").local().typed(QName::xsd("decimal")).fixed_value("1.0").into();
        let same_value: Particle = element("urn:x", "a").local().typed(QName::xsd("decimal")).fixed_value(" 1.0").into();
        assert!(restricts(&schema, same_value, fixed_base.clone()).is_ok());
        assert!(restricts(&schema, decimal_a.clone(), fixed_base).is_err());

        let mut blocking = element("urn:x", "a").local().typed(QName::xsd("decimal"));
        blocking.block = DerivationSet::ALL;
        let blocked_base: Particle = blocking.into();
        let err = restricts(&schema, decimal_a, blocked_base).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BlockViolation);
    }

    #[test]
    fn test_substitution_member_restricts_head() {
        let schema = SchemaBuilder::new("urn:x")
            .element(element("urn:x", "head").typed(QName::xsd("decimal")))
            .element(element("urn:x", "member").typed(QName::xsd("int")).substitutes(QName::new("urn:x", "head")))
            .build();
        let member: Particle = element("urn:x", "member").reference().into();
        let head: Particle = element("urn:x", "head").reference().into();
        assert!(restricts(&schema, member, head).is_ok());
    }

    #[test]
    fn test_wildcard_cases() {
        let schema = Schema::new("urn:x");
        let base = any(NamespaceConstraint::Any, Occurrence::zero_or_more());
        assert!(restricts(&schema, any(NamespaceConstraint::Local, Occurrence::once()), base.clone()).is_ok());
        assert!(restricts(&schema, elem("a", Occurrence::once()), base.clone()).is_ok());
        let seq = ModelGroup::sequence(vec![elem("a", Occurrence::once()), elem("b", Occurrence::optional())]);
        assert!(restricts(&schema, seq.into(), base).is_ok());

        let narrow = any(NamespaceConstraint::List(vec!["urn:y".into()]), Occurrence::zero_or_more());
        let err = restricts(&schema, any(NamespaceConstraint::Any, Occurrence::once()), narrow.clone()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WildcardDerivation);
        assert!(restricts(&schema, elem("a", Occurrence::once()), narrow).is_err());
        assert!(restricts(&schema, any(NamespaceConstraint::Any, Occurrence::once()), elem("a", Occurrence::once())).is_err());
    }

    #[test]
    fn test_sequence_recurse() {
        let schema = Schema::new("urn:x");
        let base: Particle = ModelGroup::sequence(vec![
            elem("a", Occurrence::once()),
            elem("b", Occurrence::optional()),
            elem("c", Occurrence::once()),
        ])
        .into();
        let skips_optional = ModelGroup::sequence(vec![elem("a", Occurrence::once()), elem("c", Occurrence::once())]);
        assert!(restricts(&schema, skips_optional.into(), base.clone()).is_ok());
        let drops_required = ModelGroup::sequence(vec![elem("a", Occurrence::once()), elem("b", Occurrence::once())]);
        assert!(restricts(&schema, drops_required.into(), base.clone()).is_err());
        let reordered = ModelGroup::sequence(vec![elem("c", Occurrence::once()), elem("a", Occurrence::once())]);
        assert!(restricts(&schema, reordered.into(), base).is_err());
    }

    #[test]
    fn test_choice_cases() {
        let schema = Schema::new("urn:x");
        let base: Particle = ModelGroup::choice(vec![
            elem("a", Occurrence::once()),
            elem("b", Occurrence::once()),
            elem("c", Occurrence::once()),
        ])
        .into();
        let fewer = ModelGroup::choice(vec![elem("a", Occurrence::once()), elem("c", Occurrence::once())]);
        assert!(restricts(&schema, fewer.into(), base.clone()).is_ok());
        let single = elem("b", Occurrence::once());
        assert!(restricts(&schema, single, base.clone()).is_ok());

        let repeated_base: Particle = ModelGroup::choice(vec![elem("a", Occurrence::once()), elem("b", Occurrence::once())])
            .with_occurs(Occurrence::new(0, Occurs::Count(2)))
            .into();
        let pair = ModelGroup::sequence(vec![elem("a", Occurrence::once()), elem("b", Occurrence::once())]);
        assert!(restricts(&schema, pair.into(), repeated_base).is_ok());
        let triple = ModelGroup::sequence(vec![
            elem("a", Occurrence::once()),
            elem("b", Occurrence::once()),
            elem("a", Occurrence::once()),
        ]);
        assert!(restricts(&schema, triple.into(), base).is_err());
    }

    #[test]
    fn test_kind_mismatch() {
        let schema = Schema::new("urn:x");
        let seq: Particle = ModelGroup::sequence(vec![elem("a", Occurrence::once()), elem("b", Occurrence::once())]).into();
        let choice = ModelGroup::choice(vec![elem("a", Occurrence::once()), elem("b", Occurrence::once())]);
        assert!(restricts(&schema, choice.into(), seq.clone()).is_err());
        let single_all = ModelGroup::all(vec![elem("a", Occurrence::once())]).with_occurs(Occurrence::optional());
        let optional_seq: Particle =
            ModelGroup::sequence(vec![elem("a", Occurrence::optional()), elem("b", Occurrence::optional())]).into();
        assert!(restricts(&schema, single_all.into(), optional_seq).is_ok());
    }

    #[test]
    fn test_different_kind_against_base_wildcard() {
        let schema = Schema::new("urn:x");
        let open_base: Particle = ModelGroup::sequence(vec![
            elem("a", Occurrence::once()),
            any(NamespaceConstraint::Any, Occurrence::zero_or_more()),
        ])
        .into();
        let choice = ModelGroup::choice(vec![elem("b", Occurrence::once()), elem("c", Occurrence::once())]);
        assert!(restricts(&schema, choice.into(), open_base.clone()).is_ok());
        let all = ModelGroup::all(vec![elem("b", Occurrence::once()), elem("c", Occurrence::optional())]);
        assert!(restricts(&schema, all.into(), open_base).is_ok());

        let capped_base: Particle = ModelGroup::sequence(vec![
            elem("a", Occurrence::once()),
            any(NamespaceConstraint::Any, Occurrence::optional()),
        ])
        .into();
        let pair = ModelGroup::all(vec![elem("b", Occurrence::once()), elem("c", Occurrence::once())]);
        assert!(restricts(&schema, pair.into(), capped_base).is_err());
    }

    #[test]
    fn test_different_kind_against_other_wildcard() {
        let schema = Schema::new("urn:x");
        let foreign = |local: &str| -> Particle { element("urn:y", local).reference().into() };
        let other_base: Particle = ModelGroup::sequence(vec![
            elem("a", Occurrence::once()),
            any(NamespaceConstraint::Other("urn:x".into()), Occurrence::zero_or_more()),
        ])
        .into();

        let foreign_choice = ModelGroup::choice(vec![foreign("p"), foreign("q")]);
        assert!(restricts(&schema, foreign_choice.into(), other_base.clone()).is_ok());
        let foreign_all = ModelGroup::all(vec![foreign("p"), foreign("q")]);
        assert!(restricts(&schema, foreign_all.into(), other_base.clone()).is_ok());

        let unqualified = ModelGroup::choice(vec![elem("b", Occurrence::once()), foreign("q")]);
        let err = restricts(&schema, unqualified.into(), other_base).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParticleRestrictionInvalid);
        assert!(err.message.contains("against the wildcard"), "{}", err.message);
    }
}
