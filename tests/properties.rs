//! Property-based tests for the occurrence and wildcard algebras and for
//! checker idempotence

use proptest::prelude::*;

use xsdcheck::namespaces::QName;
use xsdcheck::validators::builders::{element, SchemaBuilder};
use xsdcheck::validators::complex_types::ComplexType;
use xsdcheck::validators::facets::{Facet, FacetKind};
use xsdcheck::validators::groups::ModelGroup;
use xsdcheck::validators::particles::{Occurrence, Occurs, Particle};
use xsdcheck::validators::wildcards::NamespaceConstraint;
use xsdcheck::validate_structure;

fn occurs() -> impl Strategy<Value = Occurs> {
    prop_oneof![
        4 => (0u64..1_000).prop_map(Occurs::Count),
        1 => Just(Occurs::Unbounded),
    ]
}

fn namespace() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), Just("urn:a".to_string()), Just("urn:b".to_string())]
}

fn constraint() -> impl Strategy<Value = NamespaceConstraint> {
    prop_oneof![
        Just(NamespaceConstraint::Any),
        namespace().prop_map(NamespaceConstraint::Other),
        namespace().prop_map(NamespaceConstraint::TargetNamespace),
        Just(NamespaceConstraint::Local),
        prop::collection::vec(namespace(), 0..3).prop_map(NamespaceConstraint::List),
    ]
}

proptest! {
    #[test]
    fn unbounded_absorbs_addition(k in 0u64..u64::MAX) {
        prop_assert_eq!(Occurs::Unbounded.add(Occurs::Count(k)), Occurs::Unbounded);
        prop_assert_eq!(Occurs::Count(k).add(Occurs::Unbounded), Occurs::Unbounded);
        prop_assert!(Occurs::Count(k) < Occurs::Unbounded);
    }

    #[test]
    fn zero_absorbs_multiplication(a in occurs()) {
        prop_assert_eq!(Occurs::Unbounded.mul(Occurs::ZERO), Occurs::ZERO);
        prop_assert_eq!(a.mul(Occurs::ZERO), Occurs::ZERO);
    }

    #[test]
    fn unbounded_times_positive_is_unbounded(k in 1u64..u64::MAX) {
        prop_assert_eq!(Occurs::Unbounded.mul(Occurs::Count(k)), Occurs::Unbounded);
    }

    #[test]
    fn occurs_arithmetic_is_monotone(a in occurs(), b in occurs()) {
        prop_assert!(a.add(b) >= a);
        prop_assert!(a.add(b) >= b);
        prop_assert_eq!(a.add(b), b.add(a));
        prop_assert_eq!(a.mul(b), b.mul(a));
    }

    #[test]
    fn intersection_with_any_is_identity(c in constraint()) {
        prop_assert_eq!(NamespaceConstraint::Any.intersection(&c), Some(c.clone()));
        prop_assert_eq!(c.intersection(&c), Some(c.clone()));
    }

    #[test]
    fn union_with_target_namespace_covers_other(tns in namespace()) {
        let other = NamespaceConstraint::Other(tns.clone());
        let union = other.union(&NamespaceConstraint::TargetNamespace(tns));
        prop_assert!(union.map_or(false, |u| other.is_subset(&u)));
    }

    #[test]
    fn union_and_intersection_bound_their_operands(a in constraint(), b in constraint()) {
        if let Some(i) = a.intersection(&b) {
            prop_assert!(i.is_subset(&a) && i.is_subset(&b));
        }
        if let Some(u) = a.union(&b) {
            prop_assert!(a.is_subset(&u) && b.is_subset(&u));
        }
    }

    #[test]
    fn checking_is_idempotent(
        min in -50i64..50,
        max in -50i64..50,
        max_occurs in occurs(),
        duplicate in any::<bool>(),
    ) {
        let item = |type_name: &str| -> Particle {
            element("urn:x", "a")
                .local()
                .typed(QName::xsd(type_name))
                .occurs(Occurrence::new(0, max_occurs))
                .into()
        };
        let mut particles = vec![item("int")];
        if duplicate {
            particles.push(item("string"));
        }
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("R", QName::xsd("int"), vec![
                Facet::new(FacetKind::MinInclusive, min.to_string()),
                Facet::new(FacetKind::MaxInclusive, max.to_string()),
            ])
            .complex_type(ComplexType::element_only(ModelGroup::choice(particles)).named(QName::new("urn:x", "T")))
            .build();
        let first = validate_structure(&schema);
        let second = validate_structure(&schema);
        prop_assert_eq!(&first, &second);
        if min > max {
            prop_assert!(!first.is_empty());
        } else if !duplicate {
            prop_assert!(first.is_empty(), "{:?}", first);
        }
    }
}
