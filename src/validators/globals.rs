//! Global XSD declarations
//!
//! [`Schema`] is the raw symbol table the checker consumes: top-level
//! elements, attributes, types, groups, attribute groups and notations keyed
//! by expanded name, plus the document-level settings needed to resolve
//! local names. Insertion order is declaration order and drives the order of
//! diagnostics.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};

use super::attributes::{AttributeDecl, AttributeGroup};
use super::builtins::builtin_by_qname;
use super::builtins::XSD_ANY_TYPE;
use super::elements::ElementDecl;
use super::groups::NamedGroup;
use super::simple_types::SimpleTypeRef;
use super::types::{Form, TypeDefinition, TypeHandle, TypeSlot};

/// Type map - maps QNames to global type definitions
pub type TypeMap = IndexMap<QName, TypeDefinition>;
/// Notation map - maps QNames to notation declarations
pub type NotationMap = IndexMap<QName, Notation>;
/// Attribute map - maps QNames to global attribute declarations
pub type AttributeMap = IndexMap<QName, AttributeDecl>;
/// Attribute group map - maps QNames to attribute group definitions
pub type AttributeGroupMap = IndexMap<QName, AttributeGroup>;
/// Element map - maps QNames to global element declarations
pub type ElementMap = IndexMap<QName, ElementDecl>;
/// Group map - maps QNames to model group definitions
pub type GroupMap = IndexMap<QName, NamedGroup>;
/// Substitution group map - maps head element QNames to direct members
pub type SubstitutionGroupMap = IndexMap<QName, IndexSet<QName>>;

/// XSD Notation declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notation {
    /// Notation name
    pub name: QName,
    /// Public identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,
    /// System identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl Notation {
    /// Create a new notation
    pub fn new(name: QName) -> Self {
        Self {
            name,
            public: None,
            system: None,
        }
    }
}

/// An `xs:import` of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Imported namespace ("" for no namespace)
    #[serde(default)]
    pub namespace: String,
    /// Location hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
}

/// The raw schema model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Target namespace ("" for none)
    pub target_namespace: String,
    /// `elementFormDefault`
    pub element_form_default: Form,
    /// `attributeFormDefault`
    pub attribute_form_default: Form,
    /// Global element declarations
    pub elements: ElementMap,
    /// Global attribute declarations
    pub attributes: AttributeMap,
    /// Global type definitions
    pub types: TypeMap,
    /// Named model groups
    pub groups: GroupMap,
    /// Named attribute groups
    pub attribute_groups: AttributeGroupMap,
    /// Notation declarations
    pub notations: NotationMap,
    /// Head element -> direct substitution group members, as recorded by
    /// the parser (members are also discovered from `substitutionGroup`)
    pub substitution_groups: SubstitutionGroupMap,
    /// Document-level namespace bindings
    pub namespaces: NamespaceContext,
    /// Imports to be stitched in before checking
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
}

impl Schema {
    /// Create an empty schema for a target namespace
    pub fn new(target_namespace: impl Into<String>) -> Self {
        Self {
            target_namespace: target_namespace.into(),
            ..Self::default()
        }
    }

    /// Check if all maps are empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get total count of all globals
    pub fn len(&self) -> usize {
        self.types.len()
            + self.notations.len()
            + self.attributes.len()
            + self.attribute_groups.len()
            + self.elements.len()
            + self.groups.len()
    }

    /// Add a global element
    pub fn add_element(&mut self, element: ElementDecl) {
        self.elements.insert(element.name.clone(), element);
    }

    /// Add a global attribute
    pub fn add_attribute(&mut self, attribute: AttributeDecl) {
        self.attributes.insert(attribute.name.clone(), attribute);
    }

    /// Add a named type; anonymous definitions are ignored
    pub fn add_type(&mut self, definition: impl Into<TypeDefinition>) {
        let definition = definition.into();
        if let Some(name) = definition.name().cloned() {
            self.types.insert(name, definition);
        }
    }

    /// Add a named model group
    pub fn add_group(&mut self, group: NamedGroup) {
        self.groups.insert(group.name.clone(), group);
    }

    /// Add an attribute group
    pub fn add_attribute_group(&mut self, group: AttributeGroup) {
        self.attribute_groups.insert(group.name.clone(), group);
    }

    /// Add a notation
    pub fn add_notation(&mut self, notation: Notation) {
        self.notations.insert(notation.name.clone(), notation);
    }

    /// Merge components of another document; existing entries win
    pub fn merge(&mut self, other: Schema) {
        fn absorb<V>(into: &mut IndexMap<QName, V>, from: IndexMap<QName, V>) {
            for (name, value) in from {
                into.entry(name).or_insert(value);
            }
        }
        absorb(&mut self.elements, other.elements);
        absorb(&mut self.attributes, other.attributes);
        absorb(&mut self.types, other.types);
        absorb(&mut self.groups, other.groups);
        absorb(&mut self.attribute_groups, other.attribute_groups);
        absorb(&mut self.notations, other.notations);
        for (head, members) in other.substitution_groups {
            self.substitution_groups.entry(head).or_default().extend(members);
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Look up any type by name, including builtins and `xs:anyType`
    pub fn lookup_type(&self, name: &QName) -> Option<TypeHandle<'_>> {
        if name.is_xsd_named(XSD_ANY_TYPE) {
            return Some(TypeHandle::AnyType);
        }
        if let Some(builtin) = builtin_by_qname(name) {
            return Some(TypeHandle::Builtin(builtin));
        }
        self.types.get(name).map(TypeDefinition::handle)
    }

    /// Resolve a simple type reference
    pub fn resolve_simple_ref<'a>(&'a self, type_ref: &'a SimpleTypeRef) -> Option<TypeHandle<'a>> {
        match type_ref {
            SimpleTypeRef::Named(name) => self.lookup_type(name),
            SimpleTypeRef::Inline(st) => Some(TypeHandle::Simple(st)),
        }
    }

    /// Resolve an element's type slot
    pub fn resolve_slot<'a>(&'a self, slot: &'a TypeSlot) -> Option<TypeHandle<'a>> {
        match slot {
            TypeSlot::Named(name) => self.lookup_type(name),
            TypeSlot::Inline(definition) => Some(definition.handle()),
        }
    }

    /// Target of an element reference, or the declaration itself
    pub fn effective_element<'a>(&'a self, decl: &'a ElementDecl) -> Option<&'a ElementDecl> {
        if decl.reference {
            self.elements.get(&decl.name)
        } else {
            Some(decl)
        }
    }

    /// Type of an element declaration. Elements without a type take their
    /// substitution group head's type, or `xs:anyType`.
    pub fn element_type<'a>(&'a self, decl: &'a ElementDecl) -> Option<TypeHandle<'a>> {
        let mut seen = HashSet::new();
        let mut current = self.effective_element(decl)?;
        loop {
            if let Some(slot) = &current.type_def {
                return self.resolve_slot(slot);
            }
            match &current.substitution_group {
                Some(head) if seen.insert(head.clone()) => match self.elements.get(head) {
                    Some(head_decl) => current = head_decl,
                    None => return None,
                },
                _ => return Some(TypeHandle::AnyType),
            }
        }
    }

    /// Expanded name of a local or global element declaration
    pub fn element_name(&self, decl: &ElementDecl) -> QName {
        decl.effective_name(self.element_form_default)
    }

    /// Direct substitution group members of a head element
    pub fn direct_substitutes(&self, head: &QName) -> Vec<&QName> {
        let mut members: IndexSet<&QName> = IndexSet::new();
        if let Some(recorded) = self.substitution_groups.get(head) {
            members.extend(recorded.iter());
        }
        for (name, element) in &self.elements {
            if element.substitution_group.as_ref() == Some(head) {
                members.insert(name);
            }
        }
        members.into_iter().collect()
    }

    /// Transitive substitution group members, excluding the head
    pub fn substitutes(&self, head: &QName) -> Vec<&ElementDecl> {
        let mut seen: IndexSet<&QName> = IndexSet::new();
        let mut stack = self.direct_substitutes(head);
        while let Some(name) = stack.pop() {
            if name == head || !seen.insert(name) {
                continue;
            }
            stack.extend(self.direct_substitutes(name));
        }
        seen.into_iter().filter_map(|name| self.elements.get(name)).collect()
    }

    /// Check whether `member` is in the substitution group of `head`
    pub fn is_substitutable(&self, member: &QName, head: &QName) -> bool {
        self.substitutes(head).iter().any(|e| &e.name == member)
    }
}

/// Read-only view shared by the engines during one check
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// Schema under check
    pub schema: &'a Schema,
    /// Traversal bounds
    pub limits: &'a Limits,
}

impl<'a> Context<'a> {
    /// Create a new context
    pub fn new(schema: &'a Schema, limits: &'a Limits) -> Self {
        Self { schema, limits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::builders::{element, SchemaBuilder};

    #[test]
    fn test_lookup_builtins() {
        let schema = Schema::new("urn:x");
        assert!(schema.lookup_type(&QName::xsd("anyType")).unwrap().is_any_type());
        assert!(schema.lookup_type(&QName::xsd("string")).unwrap().is_simple());
        assert!(schema.lookup_type(&QName::xsd("dateTimeStamp")).is_none());
        assert!(schema.lookup_type(&QName::new("urn:x", "T")).is_none());
    }

    #[test]
    fn test_substitution_groups_are_transitive() {
        let schema = SchemaBuilder::new("urn:x")
            .element(element("urn:x", "head").typed(QName::xsd("decimal")))
            .element(element("urn:x", "mid").substitutes(QName::new("urn:x", "head")))
            .element(element("urn:x", "leaf").substitutes(QName::new("urn:x", "mid")))
            .build();
        let head = QName::new("urn:x", "head");
        let names: Vec<String> = schema.substitutes(&head).iter().map(|e| e.name.local_name.clone()).collect();
        assert_eq!(names.len(), 2);
        assert!(schema.is_substitutable(&QName::new("urn:x", "leaf"), &head));
        assert!(!schema.is_substitutable(&head, &QName::new("urn:x", "leaf")));

        // untyped members take the head's type
        let leaf = &schema.elements[&QName::new("urn:x", "leaf")];
        assert!(schema.element_type(leaf).unwrap().same(&schema.lookup_type(&QName::xsd("decimal")).unwrap()));
    }

    #[test]
    fn test_merge_keeps_first() {
        let mut first = Schema::new("urn:x");
        first.add_notation(Notation {
            system: Some("a".into()),
            ..Notation::new(QName::new("urn:x", "n"))
        });
        let mut second = Schema::new("urn:y");
        second.add_notation(Notation {
            system: Some("b".into()),
            ..Notation::new(QName::new("urn:x", "n"))
        });
        second.add_notation(Notation::new(QName::new("urn:y", "m")));
        first.merge(second);
        assert_eq!(first.notations.len(), 2);
        assert_eq!(first.notations[0].system.as_deref(), Some("a"));
    }

    #[test]
    fn test_schema_json_keys_are_clark_names() {
        let mut schema = Schema::new("urn:x");
        schema.add_notation(Notation::new(QName::new("urn:x", "n")));
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["notations"].get("{urn:x}n").is_some());
        let back: Schema = serde_json::from_value(json).unwrap();
        assert_eq!(back, schema);
    }
}
