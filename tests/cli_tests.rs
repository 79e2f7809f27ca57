//! CLI integration tests
//!
//! These tests run the built binary against schemas written to a temporary
//! directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use xsdcheck::namespaces::QName;
use xsdcheck::validators::builders::{element, SchemaBuilder};
use xsdcheck::validators::facets::{Facet, FacetKind};
use xsdcheck::Schema;

fn xsdcheck(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xsdcheck"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn write_schema(dir: &Path, file: &str, schema: &Schema) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, serde_json::to_string_pretty(schema).unwrap()).unwrap();
    path
}

fn range(min: &str, max: &str) -> Schema {
    SchemaBuilder::new("urn:x")
        .simple_restriction("Range", QName::xsd("decimal"), vec![
            Facet::new(FacetKind::MinInclusive, min),
            Facet::new(FacetKind::MaxInclusive, max),
        ])
        .element(element("urn:x", "value").typed(QName::new("urn:x", "Range")))
        .build()
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_cli_check_accepts_valid_schema() {
    let dir = TempDir::new().unwrap();
    let path = write_schema(dir.path(), "ok.json", &range("1", "10"));

    let output = xsdcheck(&["check", path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "check should succeed");
    assert!(stdout.contains("ok"), "should report ok");
}

#[test]
fn test_cli_check_rejects_inverted_range() {
    let dir = TempDir::new().unwrap();
    let path = write_schema(dir.path(), "bad.json", &range("100", "50"));

    let output = xsdcheck(&["check", path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("FacetConsistency"), "should name the error kind");
}

#[test]
fn test_cli_check_json_output() {
    let dir = TempDir::new().unwrap();
    let path = write_schema(dir.path(), "bad.json", &range("100", "50"));

    let output = xsdcheck(&["check", "--json", path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Output should be valid JSON");
    let errors = json.as_array().expect("Output should be an array");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "FacetConsistency");
}

#[test]
fn test_cli_check_with_import_mapping() {
    let dir = TempDir::new().unwrap();
    let common = SchemaBuilder::new("urn:common")
        .simple_list("Ints", QName::xsd("int"))
        .build();
    let common_path = write_schema(dir.path(), "common.json", &common);
    let root = SchemaBuilder::new("urn:x")
        .element(element("urn:x", "e").typed(QName::new("urn:common", "Ints")))
        .build();
    let root_path = write_schema(dir.path(), "root.json", &root);

    let unresolved = xsdcheck(&["check", root_path.to_str().unwrap()]);
    assert!(!unresolved.status.success(), "missing import should be reported");

    let binding = format!("urn:common={}", common_path.display());
    let output = xsdcheck(&["check", "--import", &binding, root_path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
}

#[test]
fn test_cli_check_missing_file() {
    let output = xsdcheck(&["check", "/nonexistent/schema.json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Error"), "should print an error");
}

// ============================================================================
// XPath Command Tests
// ============================================================================

#[test]
fn test_cli_xpath_selector() {
    let output = xsdcheck(&["xpath", "--selector", ".//tns:item", "--ns", "tns=urn:x"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout.trim(), "root-self self descend child({urn:x}item)");
}

#[test]
fn test_cli_xpath_rejects_attribute_selector() {
    let output = xsdcheck(&["xpath", "--selector", "@id"]);
    assert!(!output.status.success(), "selectors cannot address attributes");
}

#[test]
fn test_cli_xpath_requires_an_expression() {
    let output = xsdcheck(&["xpath"]);
    assert!(!output.status.success());
}
