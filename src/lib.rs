//! # xsdcheck
//!
//! A structural checker for XML Schema (XSD 1.0) component models.
//!
//! Given the raw, unresolved model of one or more schema documents, the
//! checker verifies every declaration against the component constraints of
//! XSD 1.0: simple and complex type derivation, facets, particles and their
//! restriction, Unique Particle Attribution, attribute uses, and the static
//! resolvability of identity-constraint XPaths. Accepted schemas come back as
//! a [`ResolvedSchema`].
//!
//! ## Features
//!
//! - Type engine: variety, `final`/`block`, circular derivation, content
//!   compatibility
//! - Facet engine: applicability, consistency, value space, inheritance
//! - Particle engine: occurrence algebra, `xs:all`, Particle Derivation OK,
//!   Element Declarations Consistent, UPA
//! - Restricted XPath compiler and field/selector resolver
//! - JSON interchange of raw models and import stitching
//!
//! ## Example
//!
//! ```rust
//! use xsdcheck::namespaces::QName;
//! use xsdcheck::validators::builders::{element, SchemaBuilder};
//! use xsdcheck::validators::facets::{Facet, FacetKind};
//! use xsdcheck::{validate_structure, ErrorKind};
//!
//! let schema = SchemaBuilder::new("urn:example")
//!     .simple_restriction("Range", QName::xsd("decimal"), vec![
//!         Facet::new(FacetKind::MinInclusive, "100"),
//!         Facet::new(FacetKind::MaxInclusive, "50"),
//!     ])
//!     .element(element("urn:example", "value").typed(QName::new("urn:example", "Range")))
//!     .build();
//!
//! let errors = validate_structure(&schema);
//! assert_eq!(errors[0].kind, ErrorKind::FacetConsistency);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading
pub mod loaders;

// Validators
pub mod validators;

// XPath support
pub mod xpath;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result, SchemaError};
pub use limits::Limits;
pub use loaders::{stitch, FileLoader, ImportLoader, MemoryLoader};
pub use namespaces::{NamespaceContext, QName};
pub use validators::{validate_structure, ResolvedSchema, Schema, SchemaChecker};

/// Version of the xsdcheck library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
