//! XML namespace handling
//!
//! This module provides qualified names (QNames) and the prefix mappings
//! recorded by the parser wherever a QName or XPath was tokenized.

use crate::error::{Error, Result};
use crate::names::split_qname;
use crate::XSD_NAMESPACE;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// XML Namespace URI. The empty string is "no namespace".
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name.
///
/// Namespace URIs are compared as opaque strings. The all-empty value is the
/// zero QName and means "unbound". In the raw-model interchange a QName is
/// written in Clark notation, `{ns}local`, so it can also key JSON maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct QName {
    /// Namespace URI ("" for no namespace)
    pub namespace: NamespaceUri,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new("", local_name)
    }

    /// Create a QName in the XSD namespace
    pub fn xsd(local_name: impl Into<String>) -> Self {
        Self::new(XSD_NAMESPACE, local_name)
    }

    /// The unbound QName
    pub fn zero() -> Self {
        Self::default()
    }

    /// Check for the unbound QName
    pub fn is_zero(&self) -> bool {
        self.namespace.is_empty() && self.local_name.is_empty()
    }

    /// Check whether this names a component of the XSD namespace
    pub fn is_xsd(&self) -> bool {
        self.namespace == XSD_NAMESPACE
    }

    /// Check for the given XSD builtin name
    pub fn is_xsd_named(&self, local: &str) -> bool {
        self.is_xsd() && self.local_name == local
    }

    /// Parse a `{ns}local` string, or a bare local name
    pub fn from_clark(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix('{') {
            if let Some((ns, local)) = rest.split_once('}') {
                return Self::new(ns, local);
            }
        }
        Self::local(s)
    }
}

impl From<String> for QName {
    fn from(s: String) -> Self {
        Self::from_clark(&s)
    }
}

impl From<QName> for String {
    fn from(qname: QName) -> Self {
        qname.to_string()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}

/// Namespace context for resolving prefixes.
///
/// The empty prefix holds the default namespace, when one is in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceContext {
    prefixes: IndexMap<Prefix, NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style prefix binding
    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.add_prefix(prefix, namespace);
        self
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.prefixes.insert(String::new(), namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.get_namespace("")
    }

    /// Iterate over the bindings
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, n)| (p.as_str(), n.as_str()))
    }

    /// Check for an empty context
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Resolve a prefixed name to a QName.
    ///
    /// Unprefixed names take the default namespace if one is bound, otherwise
    /// no namespace.
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        let prefixed_name = prefixed_name.trim();
        match split_qname(prefixed_name) {
            (Some(prefix), local) => {
                let namespace = self
                    .get_namespace(prefix)
                    .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
                Ok(QName::new(namespace, local))
            }
            (None, local) => Ok(QName::new(self.get_default_namespace().unwrap_or(""), local)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::new("http://example.com", "element");
        assert_eq!(qname.namespace, "http://example.com");
        assert_eq!(qname.local_name, "element");
        assert!(QName::zero().is_zero());
        assert!(!qname.is_zero());
    }

    #[test]
    fn test_qname_display() {
        let qname = QName::new("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");
        assert_eq!(QName::local("element").to_string(), "element");
        assert_eq!(QName::from_clark("{urn:x}a"), QName::new("urn:x", "a"));
    }

    #[test]
    fn test_qname_json_is_clark_string() {
        let qname = QName::new("urn:x", "a");
        let json = serde_json::to_string(&qname).unwrap();
        assert_eq!(json, r#""{urn:x}a""#);
        let back: QName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, qname);
        let zero: QName = serde_json::from_str(r#""""#).unwrap();
        assert!(zero.is_zero());
    }

    #[test]
    fn test_namespace_context() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", XSD_NAMESPACE);
        ctx.set_default_namespace("http://example.com");

        assert_eq!(ctx.get_namespace("xs"), Some(XSD_NAMESPACE));
        assert_eq!(ctx.get_default_namespace(), Some("http://example.com"));
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let ctx = NamespaceContext::new().with_prefix("xs", XSD_NAMESPACE);

        let qname = ctx.resolve("xs:element").unwrap();
        assert_eq!(qname, QName::xsd("element"));
        assert_eq!(ctx.resolve("plain").unwrap(), QName::local("plain"));
        assert!(ctx.resolve("nope:element").is_err());
    }
}
