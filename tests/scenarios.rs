//! End-to-end checks of accept/reject decisions on small schemas

use pretty_assertions::assert_eq;

use xsdcheck::limits::Limits;
use xsdcheck::namespaces::{NamespaceContext, QName};
use xsdcheck::validators::attributes::{AttributeDecl, Use};
use xsdcheck::validators::builders::{element, SchemaBuilder};
use xsdcheck::validators::complex_types::ComplexType;
use xsdcheck::validators::facets::{Facet, FacetKind};
use xsdcheck::validators::globals::{Context, Schema};
use xsdcheck::validators::groups::{is_emptiable, ModelGroup};
use xsdcheck::validators::identities::{resolve_field_type, BranchMode, IdentityConstraint};
use xsdcheck::validators::particles::{Occurrence, Occurs, Particle};
use xsdcheck::validators::types::{DerivationMethod, DerivationSet};
use xsdcheck::validators::wildcards::{AnyElement, NamespaceConstraint, ProcessContents, Wildcard};
use xsdcheck::{validate_structure, ErrorKind, SchemaChecker};

const NS: &str = "urn:x";

fn q(local: &str) -> QName {
    QName::new(NS, local)
}

fn local(name: &str, type_name: &str) -> Particle {
    element(NS, name).local().typed(QName::xsd(type_name)).into()
}

fn kinds(schema: &Schema) -> Vec<ErrorKind> {
    validate_structure(schema).into_iter().map(|e| e.kind).collect()
}

fn tns() -> NamespaceContext {
    NamespaceContext::new().with_prefix("tns", NS)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn inconsistent_same_named_locals_are_rejected() {
    let schema = SchemaBuilder::new(NS)
        .qualified()
        .complex_type(ComplexType::element_only(ModelGroup::sequence(vec![local("foo", "int"), local("foo", "string")])).named(q("T")))
        .build();
    assert!(kinds(&schema).contains(&ErrorKind::ElementDeclarationsInconsistent));
}

#[test]
fn extension_of_final_type_is_rejected() {
    let schema = SchemaBuilder::new(NS)
        .complex_type(
            ComplexType::empty()
                .named(q("U"))
                .with_final(DerivationSet::of(&[DerivationMethod::Extension])),
        )
        .complex_type(ComplexType::extension(q("U"), None).named(q("T")))
        .build();
    assert_eq!(kinds(&schema), [ErrorKind::FinalViolation]);
}

#[test]
fn inverted_range_is_rejected() {
    let schema = SchemaBuilder::new(NS)
        .simple_restriction("R", QName::xsd("decimal"), vec![
            Facet::new(FacetKind::MinInclusive, "100"),
            Facet::new(FacetKind::MaxInclusive, "50"),
        ])
        .build();
    let errors = validate_structure(&schema);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::FacetConsistency);
    assert!(errors[0].message.contains("minInclusive"));
}

#[test]
fn ambiguous_choice_is_rejected() {
    let schema = SchemaBuilder::new(NS)
        .complex_type(ComplexType::element_only(ModelGroup::choice(vec![local("a", "int"), local("a", "int")])).named(q("T")))
        .build();
    assert!(kinds(&schema).contains(&ErrorKind::UpaViolation));
}

fn keyed_root(constraint: IdentityConstraint) -> Schema {
    SchemaBuilder::new(NS)
        .qualified()
        .complex_type(
            ComplexType::element_only(ModelGroup::sequence(vec![
                element(NS, "item").local().typed(QName::xsd("string")).occurs(Occurrence::zero_or_more()).into(),
                local("a", "int"),
            ]))
            .named(q("Root")),
        )
        .element(element(NS, "root").typed(q("Root")).identity(constraint.with_namespaces(tns())))
        .build()
}

#[test]
fn descendant_selector_resolves_to_string() {
    let schema = keyed_root(IdentityConstraint::unique(q("u"), ".//tns:item").with_field("."));
    assert_eq!(kinds(&schema), Vec::<ErrorKind>::new());

    let limits = Limits::default();
    let cx = Context::new(&schema, &limits);
    let root = &schema.elements[&q("root")];
    let resolution = resolve_field_type(&cx, root, &root.identity_constraints[0], ".", BranchMode::AnyBranch);
    let members = resolution.field_type.map(|t| t.members()).unwrap_or_default();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name(), Some(QName::xsd("string")));
}

#[test]
fn missing_union_branch_is_dropped() {
    let schema = keyed_root(IdentityConstraint::unique(q("u"), ".").with_field("tns:a | tns:missing"));
    assert_eq!(kinds(&schema), Vec::<ErrorKind>::new());

    let limits = Limits::default();
    let cx = Context::new(&schema, &limits);
    let root = &schema.elements[&q("root")];
    let constraint = &root.identity_constraints[0];
    let any = resolve_field_type(&cx, root, constraint, "tns:a | tns:missing", BranchMode::AnyBranch);
    assert!(any.errors.is_empty());
    let members = any.field_type.map(|t| t.members()).unwrap_or_default();
    assert_eq!(members[0].name(), Some(QName::xsd("int")));

    let every = resolve_field_type(&cx, root, constraint, "tns:a | tns:missing", BranchMode::EveryBranch);
    assert!(every.errors.iter().any(|e| e.message.contains("branch 2")));
}

#[test]
fn narrowing_below_implied_minimum_is_rejected() {
    let schema = SchemaBuilder::new(NS)
        .simple_restriction("P", QName::xsd("positiveInteger"), vec![Facet::new(FacetKind::MinInclusive, "0")])
        .build();
    assert_eq!(kinds(&schema), [ErrorKind::FacetInheritance]);
}

fn attribute(use_: Use, fixed: Option<&str>) -> AttributeDecl {
    AttributeDecl {
        use_,
        fixed: fixed.map(String::from),
        type_def: Some(QName::xsd("string").into()),
        ..AttributeDecl::new(q("a"))
    }
}

fn prohibiting(base_fixed: Option<&str>) -> Schema {
    SchemaBuilder::new(NS)
        .complex_type(ComplexType::empty().named(q("Base")).with_attribute(attribute(Use::Required, base_fixed)))
        .complex_type(
            ComplexType::restriction(q("Base"), None)
                .named(q("Derived"))
                .with_attribute(attribute(Use::Prohibited, None)),
        )
        .build()
}

#[test]
fn required_attribute_cannot_be_prohibited() {
    assert_eq!(kinds(&prohibiting(None)), [ErrorKind::ParticleRestrictionInvalid]);
    assert_eq!(kinds(&prohibiting(Some("v"))), Vec::<ErrorKind>::new());
}

// ============================================================================
// Boundary behaviors
// ============================================================================

#[test]
fn absent_particles_do_not_count_for_upa() {
    let never: Particle = element(NS, "a")
        .local()
        .typed(QName::xsd("int"))
        .occurs(Occurrence::new(0, Occurs::ZERO))
        .into();
    let schema = SchemaBuilder::new(NS)
        .complex_type(ComplexType::element_only(ModelGroup::choice(vec![never, local("a", "int")])).named(q("T")))
        .build();
    assert_eq!(kinds(&schema), Vec::<ErrorKind>::new());
}

fn restricting_occurs(base: Occurrence, derived: Occurrence) -> Schema {
    let item = |occurs| -> Particle { element(NS, "a").local().typed(QName::xsd("int")).occurs(occurs).into() };
    SchemaBuilder::new(NS)
        .complex_type(ComplexType::element_only(ModelGroup::sequence(vec![item(base)])).named(q("Base")))
        .complex_type(
            ComplexType::restriction(q("Base"), Some(ModelGroup::sequence(vec![item(derived)]).into())).named(q("Derived")),
        )
        .build()
}

#[test]
fn unbounded_base_admits_any_maximum() {
    let schema = restricting_occurs(Occurrence::zero_or_more(), Occurrence::new(1, Occurs::Count(5)));
    assert_eq!(kinds(&schema), Vec::<ErrorKind>::new());

    let schema = restricting_occurs(Occurrence::new(0, Occurs::Count(5)), Occurrence::zero_or_more());
    assert_eq!(kinds(&schema), [ErrorKind::ParticleRestrictionInvalid]);
}

#[test]
fn decimal_bounds_keep_full_precision() {
    let schema = SchemaBuilder::new(NS)
        .simple_restriction("Big", QName::xsd("integer"), vec![Facet::new(
            FacetKind::MaxInclusive,
            "123456789012345678901234567890123",
        )])
        .build();
    assert_eq!(kinds(&schema), Vec::<ErrorKind>::new());

    let open_interval = |min: &str, max: &str| {
        SchemaBuilder::new(NS)
            .simple_restriction("Wide", QName::xsd("decimal"), vec![
                Facet::new(FacetKind::MinExclusive, min),
                Facet::new(FacetKind::MaxExclusive, max),
            ])
            .build()
    };
    let low = "1234567890123456789012345678901234567890";
    let high = "1234567890123456789012345678901234567891";
    assert_eq!(kinds(&open_interval(low, high)), Vec::<ErrorKind>::new());
    assert_eq!(kinds(&open_interval(high, low)), [ErrorKind::FacetConsistency]);
}

#[test]
fn different_kind_restriction_fits_base_wildcard() {
    let open = |namespace: NamespaceConstraint| -> Particle {
        AnyElement::new(Wildcard::new(namespace, ProcessContents::Lax), Occurrence::zero_or_more()).into()
    };
    let restricting = |wildcard: Particle| {
        SchemaBuilder::new(NS)
            .complex_type(ComplexType::element_only(ModelGroup::sequence(vec![local("a", "int"), wildcard])).named(q("Base")))
            .complex_type(
                ComplexType::restriction(
                    q("Base"),
                    Some(ModelGroup::choice(vec![local("b", "int"), local("c", "string")]).into()),
                )
                .named(q("D")),
            )
            .build()
    };
    assert_eq!(kinds(&restricting(open(NamespaceConstraint::Any))), Vec::<ErrorKind>::new());
    assert_eq!(
        kinds(&restricting(open(NamespaceConstraint::Other(NS.to_string())))),
        [ErrorKind::ParticleRestrictionInvalid]
    );
}

#[test]
fn all_groups_emptiable_and_not_nested() {
    let schema = Schema::new(NS);
    let empty_all: Particle = ModelGroup::all(vec![]).with_occurs(Occurrence::optional()).into();
    assert!(is_emptiable(&schema, &empty_all));

    let nested = ModelGroup::sequence(vec![ModelGroup::all(vec![local("a", "int")]).into()]);
    let schema = SchemaBuilder::new(NS)
        .complex_type(ComplexType::element_only(nested).named(q("T")))
        .build();
    assert!(kinds(&schema).contains(&ErrorKind::AllGroupConstraint));
}

#[test]
fn any_type_is_always_a_legal_base() {
    let schema = SchemaBuilder::new(NS)
        .complex_type(
            ComplexType::restriction(QName::xsd("anyType"), Some(ModelGroup::sequence(vec![local("a", "int")]).into()))
                .named(q("T")),
        )
        .build();
    assert_eq!(kinds(&schema), Vec::<ErrorKind>::new());
    assert!(SchemaChecker::new(Limits::strict()).check(schema).is_ok());
}
