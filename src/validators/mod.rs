//! XML Schema validators
//!
//! This module contains the component model and the checking engines.
//! Components are plain data owned by a [`Schema`]; engines are free
//! functions taking a [`Context`] and an error accumulator.

// Foundation
pub mod particles;
pub mod wildcards;
pub mod values;
pub mod helpers;
pub mod builtins;

// Type system
pub mod facets;
pub mod patterns;
pub mod restrictions;
pub mod types;
pub mod simple_types;
pub mod attributes;

// Content models
pub mod elements;
pub mod groups;
pub mod complex_types;
pub mod derivations;
pub mod models;
pub mod identities;

// Schema level
pub mod globals;
pub mod schemas;
pub mod builders;

// Re-exports
pub use attributes::{AttributeDecl, AttributeGroup, Use};
pub use builtins::BuiltinType;
pub use complex_types::{ComplexContent, ComplexType, Content, SimpleContent};
pub use elements::ElementDecl;
pub use facets::{DeferredFacet, Facet, FacetEntry, FacetKind, WhiteSpace};
pub use globals::{Context, Import, Notation, Schema};
pub use groups::{GroupKind, ModelGroup, NamedGroup};
pub use identities::{
    resolve_field_type, BranchMode, FieldResolution, FieldType, IdentityConstraint, IdentityConstraintKind,
};
pub use particles::{GroupRef, Occurrence, Occurs, Particle};
pub use schemas::{validate_structure, ResolvedSchema, SchemaChecker};
pub use simple_types::{SimpleDerivation, SimpleType, SimpleTypeRef};
pub use types::{DerivationMethod, DerivationSet, Form, TypeDefinition, TypeHandle, TypeSlot};
pub use wildcards::{AnyElement, NamespaceConstraint, ProcessContents, Wildcard};
