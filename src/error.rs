//! Error types for xsdcheck
//!
//! Two families live here. [`Error`] covers failures that stop an operation
//! outright (I/O, decoding a raw schema, a missing import). [`SchemaError`]
//! is a diagnostic produced by the checker: it never aborts a pass and is
//! accumulated in declaration order.

use std::fmt;
use serde::Serialize;
use thiserror::Error;

/// Result type alias using xsdcheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsdcheck operations
#[derive(Error, Debug)]
pub enum Error {
    /// A schema diagnostic escalated to a hard failure
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Value error (invalid lexical value for a type)
    #[error("value error: {0}")]
    Value(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw schema decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Kind of a schema diagnostic.
///
/// Every failure the checker detects maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Local part is not an NCName, or a reserved attribute name
    InvalidName,
    /// Two attribute uses with the same expanded name
    DuplicateAttribute,
    /// More than one ID-typed attribute use
    #[serde(rename = "MultipleIDAttributes")]
    MultipleIdAttributes,
    /// Derivation chain, substitution group or group reference cycle
    CircularDerivation,
    /// Base `final` bars the derivation
    FinalViolation,
    /// `block` in a restriction does not cover the base's
    BlockViolation,
    /// Invalid base for a simple type
    SimpleTypeBaseInvalid,
    /// Invalid base for complexContent
    ComplexContentBaseInvalid,
    /// Invalid base for simpleContent
    SimpleContentBaseInvalid,
    /// Mixed flag changes illegally across a derivation
    MixedContentDerivation,
    /// Element wildcard is not a valid derivation of its base
    WildcardDerivation,
    /// Attribute wildcard is not a valid derivation of its base
    AnyAttributeDerivation,
    /// Same-named local elements with different types
    ElementDeclarationsInconsistent,
    /// Illegal minOccurs/maxOccurs
    ParticleOccurrence,
    /// Violation of an xs:all constraint
    AllGroupConstraint,
    /// Restriction particle or attribute use does not restrict the base
    ParticleRestrictionInvalid,
    /// Unique Particle Attribution violation
    #[serde(rename = "UPAViolation")]
    UpaViolation,
    /// Facet not applicable to the base type
    FacetApplicability,
    /// Facets on one restriction contradict each other
    FacetConsistency,
    /// Facet value not in the value space of the base type
    FacetValueSpace,
    /// Derived facet relaxes the base facet
    FacetInheritance,
    /// Pattern facet is not a valid regular expression
    PatternSyntax,
    /// NOTATION enumeration problem
    NotationEnumeration,
    /// XPath outside the restricted grammar
    InvalidXPath,
    /// Selector reaches an attribute
    FieldSelectsAttribute,
    /// Field reaches an element with complex content
    FieldSelectsComplexContent,
    /// Field reaches a nillable element
    FieldSelectsNillable,
    /// Field branches resolve to incompatible types
    IncompatibleFieldTypes,
    /// XPath could not be statically resolved (soft)
    XPathUnresolvable,
    /// Field XPath did not reach any declaration
    FieldXPathUnresolved,
    /// A referenced component does not exist
    NotFound,
    /// Invalid `default` or `fixed` value
    ValueConstraint,
    /// Identity constraint naming or keyref reference problem
    IdentityConstraint,
    /// Substitution group member type not derived from the head's type
    #[serde(rename = "SubstitutionGroupInvalid")]
    SubstitutionGroup,
    /// A notation declaration without public or system identifier
    NotationDeclaration,
}

impl ErrorKind {
    /// Stable name of the kind, used as the diagnostic prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidName => "InvalidName",
            Self::DuplicateAttribute => "DuplicateAttribute",
            Self::MultipleIdAttributes => "MultipleIDAttributes",
            Self::CircularDerivation => "CircularDerivation",
            Self::FinalViolation => "FinalViolation",
            Self::BlockViolation => "BlockViolation",
            Self::SimpleTypeBaseInvalid => "SimpleTypeBaseInvalid",
            Self::ComplexContentBaseInvalid => "ComplexContentBaseInvalid",
            Self::SimpleContentBaseInvalid => "SimpleContentBaseInvalid",
            Self::MixedContentDerivation => "MixedContentDerivation",
            Self::WildcardDerivation => "WildcardDerivation",
            Self::AnyAttributeDerivation => "AnyAttributeDerivation",
            Self::ElementDeclarationsInconsistent => "ElementDeclarationsInconsistent",
            Self::ParticleOccurrence => "ParticleOccurrence",
            Self::AllGroupConstraint => "AllGroupConstraint",
            Self::ParticleRestrictionInvalid => "ParticleRestrictionInvalid",
            Self::UpaViolation => "UPAViolation",
            Self::FacetApplicability => "FacetApplicability",
            Self::FacetConsistency => "FacetConsistency",
            Self::FacetValueSpace => "FacetValueSpace",
            Self::FacetInheritance => "FacetInheritance",
            Self::PatternSyntax => "PatternSyntax",
            Self::NotationEnumeration => "NotationEnumeration",
            Self::InvalidXPath => "InvalidXPath",
            Self::FieldSelectsAttribute => "FieldSelectsAttribute",
            Self::FieldSelectsComplexContent => "FieldSelectsComplexContent",
            Self::FieldSelectsNillable => "FieldSelectsNillable",
            Self::IncompatibleFieldTypes => "IncompatibleFieldTypes",
            Self::XPathUnresolvable => "XPathUnresolvable",
            Self::FieldXPathUnresolved => "FieldXPathUnresolved",
            Self::NotFound => "NotFound",
            Self::ValueConstraint => "ValueConstraint",
            Self::IdentityConstraint => "IdentityConstraint",
            Self::SubstitutionGroup => "SubstitutionGroupInvalid",
            Self::NotationDeclaration => "NotationDeclaration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema diagnostic with optional chained cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaError {
    /// Error kind
    pub kind: ErrorKind,
    /// Single-line English message
    pub message: String,
    /// Wrapped cause, if this error was raised on behalf of another
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<SchemaError>>,
}

impl SchemaError {
    /// Create a new diagnostic
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Raise a new diagnostic that wraps `cause`
    pub fn wrap(kind: ErrorKind, message: impl Into<String>, cause: SchemaError) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Prefix the message with the component it was found in.
    ///
    /// The kind is kept; contexts stack outermost-first as the error bubbles up.
    pub fn in_context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// Check the kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Iterate over this error and its chain of causes
    pub fn chain(&self) -> impl Iterator<Item = &SchemaError> {
        std::iter::successors(Some(self), |e| e.cause.as_deref())
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ref cause) = self.cause {
            write!(f, " (caused by {})", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Shorthand used by the engines to build diagnostics
pub(crate) fn schema_error(kind: ErrorKind, message: impl Into<String>) -> SchemaError {
    SchemaError::new(kind, message)
}
