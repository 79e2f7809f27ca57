//! Import loading and stitching
//!
//! The checker itself never performs I/O. Before a check, [`stitch`] asks
//! an [`ImportLoader`] for the raw schema of every imported namespace and
//! merges the components into the root document's symbol table.

use indexmap::{IndexMap, IndexSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::locations::Location;
use crate::namespaces::QName;
use crate::validators::globals::{Import, Schema};

/// Source of imported schema documents
pub trait ImportLoader {
    /// Load the raw schema for `namespace`, using the `schemaLocation` hint
    /// when one was given
    fn load_import(&self, namespace: &str, schema_location: Option<&str>) -> Result<Schema>;
}

/// Loader serving documents registered in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: IndexMap<String, Schema>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under its target namespace
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.insert(schema);
        self
    }

    /// Register a document under its target namespace
    pub fn insert(&mut self, schema: Schema) {
        self.documents.insert(schema.target_namespace.clone(), schema);
    }
}

impl ImportLoader for MemoryLoader {
    fn load_import(&self, namespace: &str, _schema_location: Option<&str>) -> Result<Schema> {
        self.documents
            .get(namespace)
            .cloned()
            .ok_or_else(|| Error::Resource(format!("no document registered for namespace '{}'", namespace)))
    }
}

/// Loader reading JSON raw models from disk
#[derive(Debug, Clone)]
pub struct FileLoader {
    base_dir: PathBuf,
    mappings: IndexMap<String, PathBuf>,
}

impl FileLoader {
    /// Resolve relative locations against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            mappings: IndexMap::new(),
        }
    }

    /// Always load `namespace` from `path`, ignoring location hints
    pub fn with_mapping(mut self, namespace: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.mappings.insert(namespace.into(), path.into());
        self
    }

    /// Base directory for relative locations
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, namespace: &str, schema_location: Option<&str>) -> Result<PathBuf> {
        if let Some(path) = self.mappings.get(namespace) {
            return Location::Path(path.clone()).resolve(&self.base_dir);
        }
        match schema_location {
            Some(hint) => Location::from_str(hint)?.resolve(&self.base_dir),
            None => Err(Error::Resource(format!(
                "no schema location known for namespace '{}'",
                namespace
            ))),
        }
    }
}

impl ImportLoader for FileLoader {
    fn load_import(&self, namespace: &str, schema_location: Option<&str>) -> Result<Schema> {
        let path = self.path_for(namespace, schema_location)?;
        tracing::debug!(namespace, path = %path.display(), "loading import");
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Resource(format!("failed to read '{}': {}", path.display(), e)))?;
        let schema: Schema = serde_json::from_str(&content)?;
        if schema.target_namespace != namespace {
            return Err(Error::Namespace(format!(
                "'{}' has target namespace '{}', expected '{}'",
                path.display(),
                schema.target_namespace,
                namespace
            )));
        }
        Ok(schema)
    }
}

/// Merge every document imported by `root` (transitively), plus the extra
/// `imports`, into one schema.
///
/// Each namespace is loaded once. Components already present keep their
/// first definition.
pub fn stitch(mut root: Schema, imports: &[Import], loader: &dyn ImportLoader) -> Result<Schema> {
    let mut loaded: IndexSet<String> = IndexSet::new();
    loaded.insert(root.target_namespace.clone());

    let mut pending: Vec<Import> = imports.iter().rev().cloned().collect();
    pending.extend(root.imports.iter().rev().cloned());

    while let Some(import) = pending.pop() {
        if !loaded.insert(import.namespace.clone()) {
            tracing::trace!(namespace = %import.namespace, "namespace already loaded");
            continue;
        }
        let document = loader.load_import(&import.namespace, import.schema_location.as_deref())?;
        report_conflicts(&root, &document);
        pending.extend(document.imports.iter().rev().cloned());
        tracing::debug!(namespace = %import.namespace, components = document.len(), "merging import");
        root.merge(document);
    }
    Ok(root)
}

fn report_conflicts(root: &Schema, document: &Schema) {
    fn conflicting<V: PartialEq>(kind: &str, existing: &IndexMap<QName, V>, incoming: &IndexMap<QName, V>) {
        for (name, value) in incoming {
            if existing.get(name).map_or(false, |kept| kept != value) {
                tracing::warn!(kind, name = %name, "conflicting duplicate component, keeping the first definition");
            }
        }
    }
    conflicting("element", &root.elements, &document.elements);
    conflicting("attribute", &root.attributes, &document.attributes);
    conflicting("type", &root.types, &document.types);
    conflicting("group", &root.groups, &document.groups);
    conflicting("attribute group", &root.attribute_groups, &document.attribute_groups);
    conflicting("notation", &root.notations, &document.notations);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::builders::{element, SchemaBuilder};
    use std::io::Write;
    use tempfile::TempDir;

    fn import(namespace: &str, location: Option<&str>) -> Import {
        Import {
            namespace: namespace.to_string(),
            schema_location: location.map(String::from),
        }
    }

    #[test]
    fn test_memory_loader_stitches_transitively() {
        let mut common = SchemaBuilder::new("urn:common")
            .simple_list("Ints", QName::xsd("int"))
            .build();
        common.imports.push(import("urn:base", None));
        let base = SchemaBuilder::new("urn:base")
            .element(element("urn:base", "b").typed(QName::xsd("int")))
            .build();
        let loader = MemoryLoader::new().with_schema(common).with_schema(base);

        let mut root = SchemaBuilder::new("urn:x")
            .element(element("urn:x", "e").typed(QName::new("urn:common", "Ints")))
            .build();
        root.imports.push(import("urn:common", None));

        let stitched = stitch(root, &[], &loader).unwrap();
        assert!(stitched.lookup_type(&QName::new("urn:common", "Ints")).is_some());
        assert!(stitched.elements.contains_key(&QName::new("urn:base", "b")));
    }

    #[test]
    fn test_missing_import_is_an_error() {
        let root = Schema::new("urn:x");
        let result = stitch(root, &[import("urn:nowhere", None)], &MemoryLoader::new());
        assert!(matches!(result, Err(Error::Resource(_))));
    }

    #[test]
    fn test_file_loader_reads_json() {
        let dir = TempDir::new().unwrap();
        let common = SchemaBuilder::new("urn:common")
            .simple_list("Ints", QName::xsd("int"))
            .build();
        let mut file = fs::File::create(dir.path().join("common.json")).unwrap();
        write!(file, "{}", serde_json::to_string(&common).unwrap()).unwrap();

        let loader = FileLoader::new(dir.path());
        let loaded = loader.load_import("urn:common", Some("common.json")).unwrap();
        assert_eq!(loaded, common);

        let mapped = FileLoader::new("/nonexistent").with_mapping("urn:common", dir.path().join("common.json"));
        assert!(mapped.load_import("urn:common", None).is_ok());

        let wrong = loader.load_import("urn:other", Some("common.json"));
        assert!(matches!(wrong, Err(Error::Namespace(_))));
        assert!(loader.load_import("urn:common", None).is_err());
    }
}
