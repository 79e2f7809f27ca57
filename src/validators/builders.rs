//! XSD component builders
//!
//! Programmatic construction of schema documents. [`SchemaBuilder`] names
//! components in its target namespace and collects them into a [`Schema`];
//! [`element`] starts a fluent element declaration.
//!
//! ```rust
//! use xsdcheck::namespaces::QName;
//! use xsdcheck::validators::builders::{element, SchemaBuilder};
//!
//! let schema = SchemaBuilder::new("urn:example")
//!     .simple_list("Ints", QName::xsd("int"))
//!     .element(element("urn:example", "numbers").typed(QName::new("urn:example", "Ints")))
//!     .build();
//! assert_eq!(schema.len(), 2);
//! ```

use crate::namespaces::QName;

use super::attributes::{AttributeDecl, AttributeGroup};
use super::complex_types::ComplexType;
use super::elements::ElementDecl;
use super::facets::Facet;
use super::globals::{Notation, Schema};
use super::groups::{ModelGroup, NamedGroup};
use super::identities::IdentityConstraint;
use super::particles::Occurrence;
use super::simple_types::{SimpleType, SimpleTypeRef};
use super::types::{DerivationSet, Form, TypeDefinition, TypeSlot};

/// Builder for a schema document
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Start a document for a target namespace
    pub fn new(target_namespace: impl Into<String>) -> Self {
        Self {
            schema: Schema::new(target_namespace),
        }
    }

    /// Name in the target namespace
    pub fn qname(&self, local_name: &str) -> QName {
        QName::new(self.schema.target_namespace.clone(), local_name)
    }

    /// Set `elementFormDefault="qualified"`
    pub fn qualified(mut self) -> Self {
        self.schema.element_form_default = Form::Qualified;
        self
    }

    /// Set `attributeFormDefault="qualified"`
    pub fn qualified_attributes(mut self) -> Self {
        self.schema.attribute_form_default = Form::Qualified;
        self
    }

    /// Add a named simple type restricting `base`
    pub fn simple_restriction(self, local_name: &str, base: QName, facets: Vec<Facet>) -> Self {
        let name = self.qname(local_name);
        let facets = facets.into_iter().map(Into::into).collect();
        self.simple_type(SimpleType::restriction(base, facets).named(name))
    }

    /// Add a named list type
    pub fn simple_list(self, local_name: &str, item_type: impl Into<SimpleTypeRef>) -> Self {
        let name = self.qname(local_name);
        self.simple_type(SimpleType::list(item_type).named(name))
    }

    /// Add a named union type
    pub fn simple_union(self, local_name: &str, member_types: Vec<QName>) -> Self {
        let name = self.qname(local_name);
        self.simple_type(SimpleType::union(member_types).named(name))
    }

    /// Add a simple type definition
    pub fn simple_type(mut self, simple_type: SimpleType) -> Self {
        self.schema.add_type(TypeDefinition::Simple(simple_type));
        self
    }

    /// Add a complex type definition
    pub fn complex_type(mut self, complex_type: ComplexType) -> Self {
        self.schema.add_type(TypeDefinition::Complex(complex_type));
        self
    }

    /// Add a global element declaration
    pub fn element(mut self, element: ElementDecl) -> Self {
        self.schema.add_element(element);
        self
    }

    /// Add a named model group
    pub fn group(mut self, local_name: &str, group: ModelGroup) -> Self {
        let name = self.qname(local_name);
        self.schema.add_group(NamedGroup::new(name, group));
        self
    }

    /// Add a global attribute declaration
    pub fn attribute(mut self, mut attribute: AttributeDecl) -> Self {
        attribute.global = true;
        self.schema.add_attribute(attribute);
        self
    }

    /// Add a named attribute group
    pub fn attribute_group(
        mut self,
        local_name: &str,
        attributes: Vec<AttributeDecl>,
        attribute_groups: Vec<QName>,
    ) -> Self {
        let mut group = AttributeGroup::new(self.qname(local_name));
        group.attributes = attributes;
        group.attribute_groups = attribute_groups;
        self.schema.add_attribute_group(group);
        self
    }

    /// Add a notation declaration
    pub fn notation(mut self, local_name: &str, public: Option<&str>, system: Option<&str>) -> Self {
        let mut notation = Notation::new(self.qname(local_name));
        notation.public = public.map(String::from);
        notation.system = system.map(String::from);
        self.schema.add_notation(notation);
        self
    }

    /// Finish the document
    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Start a global element declaration
pub fn element(namespace: &str, local_name: &str) -> ElementDecl {
    let mut decl = ElementDecl::new(QName::new(namespace, local_name));
    decl.global = true;
    decl
}

impl ElementDecl {
    /// Make this a local declaration
    pub fn local(mut self) -> Self {
        self.global = false;
        self
    }

    /// Make this a reference to the global declaration of the same name
    pub fn reference(mut self) -> Self {
        self.global = false;
        self.reference = true;
        self
    }

    /// Set a named type
    pub fn typed(mut self, type_name: QName) -> Self {
        self.type_def = Some(TypeSlot::Named(type_name));
        self
    }

    /// Set an anonymous type
    pub fn inline(mut self, definition: impl Into<TypeDefinition>) -> Self {
        self.type_def = Some(TypeSlot::Inline(Box::new(definition.into())));
        self
    }

    /// Set the occurrence bounds
    pub fn occurs(mut self, occurs: Occurrence) -> Self {
        self.occurs = occurs;
        self
    }

    /// Set the `default` value constraint
    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    /// Set the `fixed` value constraint
    pub fn fixed_value(mut self, value: &str) -> Self {
        self.fixed = Some(value.to_string());
        self
    }

    /// Set `final`
    pub fn final_set(mut self, final_: DerivationSet) -> Self {
        self.final_ = final_;
        self
    }

    /// Set `block`
    pub fn block_set(mut self, block: DerivationSet) -> Self {
        self.block = block;
        self
    }

    /// Join the substitution group of `head`
    pub fn substitutes(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Set `nillable="true"`
    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    /// Set `abstract="true"`
    pub fn abstract_element(mut self) -> Self {
        self.abstract_ = true;
        self
    }

    /// Declare an identity constraint on this element
    pub fn identity(mut self, constraint: IdentityConstraint) -> Self {
        self.identity_constraints.push(constraint);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::facets::FacetKind;
    use crate::validators::types::TypeHandle;

    #[test]
    fn test_components_land_in_target_namespace() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("Short", QName::xsd("string"), vec![Facet::new(FacetKind::MaxLength, "5")])
            .group("G", ModelGroup::sequence(vec![element("urn:x", "a").local().into()]))
            .attribute_group("AG", vec![], vec![])
            .notation("png", Some("image/png"), None)
            .build();
        assert!(matches!(
            schema.lookup_type(&QName::new("urn:x", "Short")),
            Some(TypeHandle::Simple(_))
        ));
        assert!(schema.groups.contains_key(&QName::new("urn:x", "G")));
        assert!(schema.attribute_groups.contains_key(&QName::new("urn:x", "AG")));
        assert_eq!(schema.notations[&QName::new("urn:x", "png")].public.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_element_fluent_setters() {
        let decl = element("urn:x", "e")
            .local()
            .typed(QName::xsd("int"))
            .occurs(Occurrence::optional())
            .fixed_value("1")
            .nillable();
        assert!(!decl.global);
        assert!(decl.nillable);
        assert_eq!(decl.value_constraint(), Some("1"));
        assert_eq!(decl.occurs, Occurrence::optional());

        let reference = element("urn:x", "e").reference();
        assert!(reference.reference && !reference.global);
    }

    #[test]
    fn test_qualified_form_default() {
        let schema = SchemaBuilder::new("urn:x").qualified().build();
        let local = element("urn:x", "e").local();
        assert_eq!(schema.element_name(&local), QName::new("urn:x", "e"));
        let unqualified = SchemaBuilder::new("urn:x").build();
        assert_eq!(unqualified.element_name(&local), QName::local("e"));
    }
}
