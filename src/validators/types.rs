//! Type definitions and the read-only type view
//!
//! [`TypeHandle`] unifies builtin, user-defined simple, complex and the
//! `xs:anyType` ur-type behind one borrowed view. Every walk along a base
//! chain keys its visited set on [`TypeKey`], so circular derivations end the
//! walk instead of looping; reporting them is the type engine's job.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::builtins::{get_builtin_type, BuiltinType, XSD_ANY_SIMPLE_TYPE, XSD_ANY_TYPE};
use super::complex_types::{ComplexType, Content};
use super::globals::Schema;
use super::simple_types::{SimpleDerivation, SimpleType, SimpleTypeRef};
use crate::namespaces::QName;

// =============================================================================
// Derivation
// =============================================================================

/// A derivation kind, for `final`, `block` and derivation walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationMethod {
    /// Derivation by restriction
    Restriction,
    /// Derivation by extension
    Extension,
    /// Simple-type list construction
    List,
    /// Simple-type union construction
    Union,
    /// Element substitution (`block` only)
    Substitution,
}

impl DerivationMethod {
    const ALL: [DerivationMethod; 5] = [
        DerivationMethod::Restriction,
        DerivationMethod::Extension,
        DerivationMethod::List,
        DerivationMethod::Union,
        DerivationMethod::Substitution,
    ];

    fn bit(self) -> u8 {
        match self {
            DerivationMethod::Restriction => 0x01,
            DerivationMethod::Extension => 0x02,
            DerivationMethod::List => 0x04,
            DerivationMethod::Union => 0x08,
            DerivationMethod::Substitution => 0x10,
        }
    }

    /// Attribute token
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivationMethod::Restriction => "restriction",
            DerivationMethod::Extension => "extension",
            DerivationMethod::List => "list",
            DerivationMethod::Union => "union",
            DerivationMethod::Substitution => "substitution",
        }
    }
}

impl fmt::Display for DerivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of derivation methods, as written in `final`/`block` attributes.
///
/// Serialized as the attribute value (`"#all"`, `"restriction extension"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationSet(u8);

impl DerivationSet {
    /// No derivation forbidden
    pub const EMPTY: DerivationSet = DerivationSet(0);
    /// `#all`
    pub const ALL: DerivationSet = DerivationSet(0x1F);

    /// Parse an attribute value
    pub fn from_attr(value: &str) -> Result<Self, String> {
        let mut set = DerivationSet::EMPTY;
        for token in value.split_whitespace() {
            if token == "#all" {
                return Ok(DerivationSet::ALL);
            }
            let method = DerivationMethod::ALL
                .iter()
                .find(|m| m.as_str() == token)
                .ok_or_else(|| format!("invalid derivation token '{}'", token))?;
            set.insert(*method);
        }
        Ok(set)
    }

    /// Build a set from methods
    pub fn of(methods: &[DerivationMethod]) -> Self {
        let mut set = DerivationSet::EMPTY;
        for method in methods {
            set.insert(*method);
        }
        set
    }

    /// Add a method
    pub fn insert(&mut self, method: DerivationMethod) {
        self.0 |= method.bit();
    }

    /// Membership
    pub fn contains(&self, method: DerivationMethod) -> bool {
        self.0 & method.bit() != 0
    }

    /// Every method of `other` is in `self`
    pub fn is_superset(&self, other: &DerivationSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two sets
    pub fn union(&self, other: &DerivationSet) -> DerivationSet {
        DerivationSet(self.0 | other.0)
    }

    /// Empty set?
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<String> for DerivationSet {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DerivationSet::from_attr(&value)
    }
}

impl From<DerivationSet> for String {
    fn from(set: DerivationSet) -> String {
        set.to_string()
    }
}

impl fmt::Display for DerivationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == DerivationSet::ALL {
            return f.write_str("#all");
        }
        let tokens: Vec<&str> = DerivationMethod::ALL
            .iter()
            .filter(|m| self.contains(**m))
            .map(|m| m.as_str())
            .collect();
        f.write_str(&tokens.join(" "))
    }
}

/// `form` of a local declaration, as written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    /// Not written; the schema's `*FormDefault` applies
    #[default]
    Default,
    /// Namespace-qualified
    Qualified,
    /// In no namespace
    Unqualified,
}

impl Form {
    /// Resolve against a form default
    pub fn is_qualified(&self, default: Form) -> bool {
        match self {
            Form::Qualified => true,
            Form::Unqualified => false,
            Form::Default => default == Form::Qualified,
        }
    }

    /// Check for the source default
    pub fn is_default(&self) -> bool {
        *self == Form::Default
    }
}

// =============================================================================
// Type Definitions and References
// =============================================================================

/// A named simple or complex type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDefinition {
    /// Simple type definition
    Simple(SimpleType),
    /// Complex type definition
    Complex(ComplexType),
}

impl TypeDefinition {
    /// Type name
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeDefinition::Simple(st) => st.name.as_ref(),
            TypeDefinition::Complex(ct) => ct.name.as_ref(),
        }
    }

    /// Borrowed view
    pub fn handle(&self) -> TypeHandle<'_> {
        match self {
            TypeDefinition::Simple(st) => TypeHandle::Simple(st),
            TypeDefinition::Complex(ct) => TypeHandle::Complex(ct),
        }
    }
}

impl From<SimpleType> for TypeDefinition {
    fn from(st: SimpleType) -> Self {
        TypeDefinition::Simple(st)
    }
}

impl From<ComplexType> for TypeDefinition {
    fn from(ct: ComplexType) -> Self {
        TypeDefinition::Complex(ct)
    }
}

/// Type of an element declaration: a reference or an anonymous definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSlot {
    /// Reference by name
    Named(QName),
    /// Anonymous inline type
    Inline(Box<TypeDefinition>),
}

impl From<QName> for TypeSlot {
    fn from(name: QName) -> Self {
        TypeSlot::Named(name)
    }
}

// =============================================================================
// Type View
// =============================================================================

/// Simple type variety
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variety {
    /// Atomic
    Atomic,
    /// List of atomic or union items
    List,
    /// Union of member types
    Union,
}

impl fmt::Display for Variety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variety::Atomic => f.write_str("atomic"),
            Variety::List => f.write_str("list"),
            Variety::Union => f.write_str("union"),
        }
    }
}

/// Stable identity of a type: its name, or its address for anonymous types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// Named type
    Named(QName),
    /// Anonymous type, keyed by address within the owning schema
    Anonymous(usize),
}

/// Borrowed view of any type definition
#[derive(Debug, Clone, Copy)]
pub enum TypeHandle<'a> {
    /// `xs:anyType`
    AnyType,
    /// Builtin simple type
    Builtin(&'static BuiltinType),
    /// User-defined simple type
    Simple(&'a SimpleType),
    /// User-defined complex type
    Complex(&'a ComplexType),
}

impl<'a> TypeHandle<'a> {
    /// Builtin by local name
    pub fn builtin(name: &str) -> Option<TypeHandle<'static>> {
        if name == XSD_ANY_TYPE {
            return Some(TypeHandle::AnyType);
        }
        get_builtin_type(name).map(TypeHandle::Builtin)
    }

    /// Stable identity
    pub fn key(&self) -> TypeKey {
        match self {
            TypeHandle::AnyType => TypeKey::Named(QName::xsd(XSD_ANY_TYPE)),
            TypeHandle::Builtin(b) => TypeKey::Named(b.qname()),
            TypeHandle::Simple(st) => match &st.name {
                Some(name) => TypeKey::Named(name.clone()),
                None => TypeKey::Anonymous(*st as *const SimpleType as usize),
            },
            TypeHandle::Complex(ct) => match &ct.name {
                Some(name) => TypeKey::Named(name.clone()),
                None => TypeKey::Anonymous(*ct as *const ComplexType as usize),
            },
        }
    }

    /// Type name, if named
    pub fn name(&self) -> Option<QName> {
        match self.key() {
            TypeKey::Named(name) => Some(name),
            TypeKey::Anonymous(_) => None,
        }
    }

    /// Same type?
    pub fn same(&self, other: &TypeHandle<'_>) -> bool {
        self.key() == other.key()
    }

    /// Simple type (builtin or user-defined)?
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeHandle::Builtin(_) | TypeHandle::Simple(_))
    }

    /// Complex type (including `xs:anyType`)?
    pub fn is_complex(&self) -> bool {
        !self.is_simple()
    }

    /// The ur-type?
    pub fn is_any_type(&self) -> bool {
        matches!(self, TypeHandle::AnyType)
    }

    /// `xs:anySimpleType`?
    pub fn is_any_simple_type(&self) -> bool {
        matches!(self, TypeHandle::Builtin(b) if b.is_any_simple_type())
    }

    /// `final` of the definition
    pub fn final_set(&self) -> DerivationSet {
        match self {
            TypeHandle::Simple(st) => st.final_,
            TypeHandle::Complex(ct) => ct.final_,
            _ => DerivationSet::EMPTY,
        }
    }

    /// How this type was derived from its base
    pub fn derivation_method(&self) -> DerivationMethod {
        match self {
            TypeHandle::Complex(ct) => ct.derivation_method().unwrap_or(DerivationMethod::Restriction),
            _ => DerivationMethod::Restriction,
        }
    }

    /// Immediate base type; `None` for `xs:anyType` and for unresolvable
    /// references
    pub fn base(&self, schema: &'a Schema) -> Option<TypeHandle<'a>> {
        match *self {
            TypeHandle::AnyType => None,
            TypeHandle::Builtin(b) => match b.base() {
                Some(base) => Some(TypeHandle::Builtin(base)),
                None => Some(TypeHandle::AnyType),
            },
            TypeHandle::Simple(st) => match &st.derivation {
                SimpleDerivation::Restriction { base, .. } => schema.resolve_simple_ref(base),
                SimpleDerivation::List { .. } | SimpleDerivation::Union { .. } => {
                    TypeHandle::builtin(XSD_ANY_SIMPLE_TYPE)
                }
            },
            TypeHandle::Complex(ct) => match &ct.content {
                Content::Simple(sc) => schema.lookup_type(&sc.base),
                Content::Complex(cc) => schema.lookup_type(&cc.base),
                Content::Empty | Content::Element { .. } => Some(TypeHandle::AnyType),
            },
        }
    }

    /// Base chain starting with `self`, stopping at a cycle or a missing base
    pub fn ancestors(&self, schema: &'a Schema) -> Vec<TypeHandle<'a>> {
        let mut chain = vec![*self];
        let mut seen = HashSet::from([self.key()]);
        let mut current = *self;
        while let Some(base) = current.base(schema) {
            if !seen.insert(base.key()) {
                tracing::trace!(key = ?base.key(), "cycle in base chain");
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Check whether the base chain of `self` loops back on itself
    pub fn has_circular_base(&self, schema: &'a Schema) -> bool {
        let mut seen = HashSet::from([self.key()]);
        let mut current = *self;
        while let Some(base) = current.base(schema) {
            if !seen.insert(base.key()) {
                return base.same(self);
            }
            current = base;
        }
        false
    }

    /// Nearest builtin type along the restriction chain
    pub fn builtin_ancestor(&self, schema: &'a Schema) -> Option<&'static BuiltinType> {
        self.ancestors(schema).into_iter().find_map(|t| match t {
            TypeHandle::Builtin(b) => Some(b),
            _ => None,
        })
    }

    /// Primitive type at the root of the restriction chain
    pub fn primitive(&self, schema: &'a Schema) -> Option<&'static BuiltinType> {
        match self.variety(schema)? {
            Variety::Atomic => self.builtin_ancestor(schema)?.primitive_type(),
            Variety::List | Variety::Union => get_builtin_type(XSD_ANY_SIMPLE_TYPE),
        }
    }

    /// Variety of a simple type; `None` for complex types
    pub fn variety(&self, schema: &'a Schema) -> Option<Variety> {
        for t in self.ancestors(schema) {
            match t {
                TypeHandle::Builtin(b) if b.is_list() => return Some(Variety::List),
                TypeHandle::Builtin(_) => return Some(Variety::Atomic),
                TypeHandle::Simple(st) => match st.derivation {
                    SimpleDerivation::List { .. } => return Some(Variety::List),
                    SimpleDerivation::Union { .. } => return Some(Variety::Union),
                    SimpleDerivation::Restriction { .. } => continue,
                },
                TypeHandle::Complex(_) | TypeHandle::AnyType => return None,
            }
        }
        None
    }

    /// Item type of a list type
    pub fn item_type(&self, schema: &'a Schema) -> Option<TypeHandle<'a>> {
        for t in self.ancestors(schema) {
            match t {
                TypeHandle::Builtin(b) => return b.item_type.and_then(TypeHandle::builtin),
                TypeHandle::Simple(st) => match &st.derivation {
                    SimpleDerivation::List { item_type } => return schema.resolve_simple_ref(item_type),
                    SimpleDerivation::Union { .. } => return None,
                    SimpleDerivation::Restriction { .. } => continue,
                },
                _ => return None,
            }
        }
        None
    }

    /// Resolvable member types of a union type
    pub fn member_types(&self, schema: &'a Schema) -> Vec<TypeHandle<'a>> {
        for t in self.ancestors(schema) {
            match t {
                TypeHandle::Simple(st) => match &st.derivation {
                    SimpleDerivation::Union {
                        member_types,
                        inline_types,
                    } => {
                        return member_types
                            .iter()
                            .filter_map(|q| schema.lookup_type(q))
                            .chain(inline_types.iter().map(TypeHandle::Simple))
                            .collect();
                    }
                    SimpleDerivation::Restriction { .. } => continue,
                    SimpleDerivation::List { .. } => return Vec::new(),
                },
                _ => return Vec::new(),
            }
        }
        Vec::new()
    }

    /// Simple type governing the text of a simple type or a complex type
    /// with simple content
    pub fn content_simple_type(&self, schema: &'a Schema) -> Option<TypeHandle<'a>> {
        let mut seen = HashSet::new();
        let mut current = *self;
        loop {
            if !seen.insert(current.key()) {
                return None;
            }
            match current {
                TypeHandle::Builtin(_) | TypeHandle::Simple(_) => return Some(current),
                TypeHandle::AnyType => return None,
                TypeHandle::Complex(ct) => match &ct.content {
                    Content::Simple(sc) => {
                        if let Some(inline) = &sc.simple_type {
                            return Some(TypeHandle::Simple(inline));
                        }
                        current = schema.lookup_type(&sc.base)?;
                    }
                    _ => return None,
                },
            }
        }
    }

    /// Check whether `self` is `other` or derives from it, without using a
    /// method in `blocked` on the way
    pub fn is_derived_from(&self, other: &TypeHandle<'_>, blocked: DerivationSet, schema: &'a Schema) -> bool {
        if self.same(other) {
            return true;
        }
        if other.is_any_type() {
            return blocked.is_empty() || self.ancestors(schema).iter().all(|t| !blocked.contains(t.derivation_method()));
        }
        let mut current = *self;
        let mut seen = HashSet::from([self.key()]);
        loop {
            if blocked.contains(current.derivation_method()) {
                return false;
            }
            let Some(base) = current.base(schema) else {
                break;
            };
            if base.same(other) {
                return true;
            }
            if !seen.insert(base.key()) {
                break;
            }
            current = base;
        }
        // A simple type is validly derived from a union it is a member of
        if other.variety(schema) == Some(Variety::Union) && !blocked.contains(DerivationMethod::Union) {
            return other
                .member_types(schema)
                .iter()
                .filter(|m| !m.same(other))
                .any(|m| self.is_derived_from(m, blocked, schema));
        }
        false
    }

    /// Name for diagnostics
    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) => format!("'{}'", name),
            None => "anonymous type".to_string(),
        }
    }
}

impl SimpleTypeRef {
    /// Name of a referenced type
    pub fn name(&self) -> Option<&QName> {
        match self {
            SimpleTypeRef::Named(q) => Some(q),
            SimpleTypeRef::Inline(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::builders::SchemaBuilder;
    use crate::validators::facets::{Facet, FacetKind};

    #[test]
    fn test_derivation_set_parse() {
        assert_eq!(DerivationSet::from_attr("#all").unwrap(), DerivationSet::ALL);
        let set = DerivationSet::from_attr("restriction extension").unwrap();
        assert!(set.contains(DerivationMethod::Restriction));
        assert!(!set.contains(DerivationMethod::List));
        assert!(DerivationSet::ALL.is_superset(&set));
        assert!(DerivationSet::from_attr("bogus").is_err());
        assert_eq!(set.to_string(), "restriction extension");
    }

    #[test]
    fn test_derivation_set_json() {
        let set: DerivationSet = serde_json::from_str(r#""extension""#).unwrap();
        assert_eq!(set, DerivationSet::of(&[DerivationMethod::Extension]));
        assert_eq!(serde_json::to_string(&DerivationSet::ALL).unwrap(), r##""#all""##);
    }

    #[test]
    fn test_form_resolution() {
        assert!(Form::Default.is_qualified(Form::Qualified));
        assert!(!Form::Default.is_qualified(Form::Unqualified));
        assert!(Form::Qualified.is_qualified(Form::Unqualified));
    }

    #[test]
    fn test_builtin_chain() {
        let schema = Schema::default();
        let byte = TypeHandle::builtin("byte").unwrap();
        let names: Vec<String> = byte
            .ancestors(&schema)
            .iter()
            .map(|t| t.name().unwrap().local_name)
            .collect();
        assert_eq!(names, ["byte", "short", "int", "long", "integer", "decimal", "anySimpleType", "anyType"]);
        assert_eq!(byte.primitive(&schema).unwrap().name, "decimal");
        assert_eq!(byte.variety(&schema), Some(Variety::Atomic));
        let decimal = TypeHandle::builtin("decimal").unwrap();
        assert!(byte.is_derived_from(&decimal, DerivationSet::EMPTY, &schema));
        assert!(!decimal.is_derived_from(&byte, DerivationSet::EMPTY, &schema));
        assert!(byte.is_derived_from(&TypeHandle::AnyType, DerivationSet::EMPTY, &schema));
    }

    #[test]
    fn test_user_types() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("Small", QName::xsd("int"), vec![Facet::new(FacetKind::MaxInclusive, "9")])
            .simple_list("Smalls", QName::new("urn:x", "Small"))
            .build();
        let small = schema.lookup_type(&QName::new("urn:x", "Small")).unwrap();
        assert_eq!(small.primitive(&schema).unwrap().name, "decimal");
        let smalls = schema.lookup_type(&QName::new("urn:x", "Smalls")).unwrap();
        assert_eq!(smalls.variety(&schema), Some(Variety::List));
        assert!(smalls.item_type(&schema).unwrap().same(&small));
        assert!(!smalls.is_derived_from(&small, DerivationSet::EMPTY, &schema));
    }

    #[test]
    fn test_circular_base_detected() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("A", QName::new("urn:x", "B"), vec![])
            .simple_restriction("B", QName::new("urn:x", "A"), vec![])
            .build();
        let a = schema.lookup_type(&QName::new("urn:x", "A")).unwrap();
        assert!(a.has_circular_base(&schema));
        assert_eq!(a.ancestors(&schema).len(), 2);
        assert_eq!(a.variety(&schema), None);
    }
}
