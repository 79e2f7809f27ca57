//! Raw models survive JSON interchange with their verdicts intact

use pretty_assertions::assert_eq;

use xsdcheck::namespaces::{NamespaceContext, QName};
use xsdcheck::validators::builders::{element, SchemaBuilder};
use xsdcheck::validators::complex_types::ComplexType;
use xsdcheck::validators::facets::{Facet, FacetKind};
use xsdcheck::validators::groups::ModelGroup;
use xsdcheck::validators::identities::IdentityConstraint;
use xsdcheck::validators::particles::Occurrence;
use xsdcheck::{validate_structure, Schema, SchemaChecker};

const NS: &str = "urn:x";

fn q(local: &str) -> QName {
    QName::new(NS, local)
}

fn accepted() -> Schema {
    SchemaBuilder::new(NS)
        .qualified()
        .simple_restriction("Code", QName::xsd("token"), vec![
            Facet::new(FacetKind::MaxLength, "8"),
            Facet::new(FacetKind::Pattern, "[A-Z]+"),
        ])
        .simple_list("Codes", q("Code"))
        .complex_type(
            ComplexType::element_only(ModelGroup::sequence(vec![
                element(NS, "item").local().typed(q("Code")).occurs(Occurrence::zero_or_more()).into(),
                element(NS, "codes").local().typed(q("Codes")).into(),
            ]))
            .named(q("Root")),
        )
        .element(
            element(NS, "root").typed(q("Root")).identity(
                IdentityConstraint::key(q("k"), "tns:item")
                    .with_field(".")
                    .with_namespaces(NamespaceContext::new().with_prefix("tns", NS)),
            ),
        )
        .build()
}

fn rejected() -> Schema {
    SchemaBuilder::new(NS)
        .simple_restriction("Range", QName::xsd("decimal"), vec![
            Facet::new(FacetKind::MinInclusive, "100"),
            Facet::new(FacetKind::MaxInclusive, "50"),
        ])
        .complex_type(
            ComplexType::element_only(ModelGroup::choice(vec![
                element(NS, "a").local().typed(QName::xsd("int")).into(),
                element(NS, "a").local().typed(QName::xsd("int")).into(),
            ]))
            .named(q("T")),
        )
        .build()
}

#[test]
fn resolved_schema_reloads_and_rechecks_clean() {
    let resolved = SchemaChecker::default().check(accepted()).unwrap();
    let json = serde_json::to_string_pretty(resolved.schema()).unwrap();
    let reloaded: Schema = serde_json::from_str(&json).unwrap();

    assert_eq!(&reloaded, resolved.schema());
    assert!(validate_structure(&reloaded).is_empty());
}

#[test]
fn rejected_schema_reports_the_same_errors_after_reload() {
    let schema = rejected();
    let before = validate_structure(&schema);
    assert!(!before.is_empty());

    let json = serde_json::to_string(&schema).unwrap();
    let reloaded: Schema = serde_json::from_str(&json).unwrap();
    assert_eq!(validate_structure(&reloaded), before);
}

#[test]
fn diagnostics_serialize_as_json_objects() {
    let errors = validate_structure(&rejected());
    let value = serde_json::to_value(&errors).unwrap();
    let array = value.as_array().unwrap();
    assert_eq!(array.len(), errors.len());
    assert!(array.iter().all(|e| e["kind"].is_string() && e["message"].is_string()));
}
