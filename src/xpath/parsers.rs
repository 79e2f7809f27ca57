//! XPath Parsers for XML Schema
//!
//! Identity constraints (xs:selector, xs:field) use the restricted XPath
//! subset of XSD 1.0 §3.11.6:
//!
//! ```text
//! Selector ::= Path ( '|' Path )*
//! Path     ::= ('.//')? Step ( '/' Step )*
//! Field    ::= ('.//')? ( Step '/' )* ( Step | '@' NameTest )
//! Step     ::= '.' | NameTest
//! NameTest ::= QName | '*' | NCName ':' '*'
//! ```
//!
//! with `child::`, `attribute::` and `self::node()` accepted as the
//! unabbreviated forms.

use std::fmt;

use serde::Serialize;

use crate::error::{schema_error, ErrorKind, SchemaError};
use crate::names::is_valid_ncname;
use crate::namespaces::{NamespaceContext, QName};
use crate::XML_NAMESPACE;

/// XPath axes admitted by the restricted grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum XPathAxis {
    /// child:: axis (default)
    Child,
    /// attribute:: axis
    Attribute,
    /// self:: axis, only as `.`
    #[serde(rename = "self")]
    Self_,
    /// descendant-or-self:: axis, only from a leading `.//`
    DescendantOrSelf,
}

impl XPathAxis {
    /// Parse an explicit axis name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Self::Child),
            "attribute" => Some(Self::Attribute),
            "self" => Some(Self::Self_),
            "descendant-or-self" => Some(Self::DescendantOrSelf),
            _ => None,
        }
    }
}

impl fmt::Display for XPathAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Child => "child",
            Self::Attribute => "attribute",
            Self::Self_ => "self",
            Self::DescendantOrSelf => "descendant-or-self",
        };
        write!(f, "{}", s)
    }
}

/// Node test in an XPath step, with prefixes already resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "test", content = "value", rename_all = "snake_case")]
pub enum NodeTest {
    /// `*`
    Wildcard,
    /// `prefix:*`, holding the namespace URI
    NamespaceWildcard(String),
    /// Expanded name test
    Name(QName),
    /// `node()`, only for self and descendant-or-self steps
    Node,
}

impl NodeTest {
    /// Check if this test matches an expanded name
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            Self::Wildcard | Self::Node => true,
            Self::NamespaceWildcard(namespace) => &name.namespace == namespace,
            Self::Name(expected) => expected == name,
        }
    }

    /// Check if this test is a wildcard of some kind
    pub fn is_wildcard(&self) -> bool {
        !matches!(self, Self::Name(_))
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::NamespaceWildcard(namespace) => write!(f, "{{{}}}*", namespace),
            Self::Name(name) => write!(f, "{}", name),
            Self::Node => write!(f, "node()"),
        }
    }
}

/// A step of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XPathStep {
    /// The axis
    pub axis: XPathAxis,
    /// The node test
    pub node_test: NodeTest,
}

impl XPathStep {
    fn self_node() -> Self {
        Self {
            axis: XPathAxis::Self_,
            node_test: NodeTest::Node,
        }
    }

    fn descendant_or_self() -> Self {
        Self {
            axis: XPathAxis::DescendantOrSelf,
            node_test: NodeTest::Node,
        }
    }
}

/// One `|`-separated branch: element steps plus an optional trailing
/// attribute test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XPathPath {
    /// Element steps
    pub steps: Vec<XPathStep>,
    /// Trailing attribute test (fields only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<NodeTest>,
}

impl XPathPath {
    /// Check if the path starts with `.//`
    pub fn is_descendant_search(&self) -> bool {
        self.steps
            .iter()
            .find(|s| s.axis != XPathAxis::Self_)
            .map_or(false, |s| s.axis == XPathAxis::DescendantOrSelf)
    }

    /// Check if the path has only `self` and `descendant-or-self` steps
    pub fn is_descendant_only(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.axis, XPathAxis::Self_ | XPathAxis::DescendantOrSelf))
    }
}

/// Parsed XPath expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedXPath {
    /// Original expression
    pub expression: String,
    /// Union branches
    pub paths: Vec<XPathPath>,
}

impl ParsedXPath {
    /// Check if the expression is a union of several paths
    pub fn is_union(&self) -> bool {
        self.paths.len() > 1
    }
}

/// Whether the trailing step of a path may select attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePolicy {
    /// Fields
    Allowed,
    /// Selectors
    Disallowed,
}

/// Parser for identity constraint XPath (xs:selector, xs:field)
#[derive(Debug, Clone)]
pub struct IdentityXPathParser<'n> {
    policy: AttributePolicy,
    namespaces: &'n NamespaceContext,
}

impl<'n> IdentityXPathParser<'n> {
    /// Create a parser for selector expressions
    pub fn for_selector(namespaces: &'n NamespaceContext) -> Self {
        Self {
            policy: AttributePolicy::Disallowed,
            namespaces,
        }
    }

    /// Create a parser for field expressions (allows attributes)
    pub fn for_field(namespaces: &'n NamespaceContext) -> Self {
        Self {
            policy: AttributePolicy::Allowed,
            namespaces,
        }
    }

    fn error(&self, xpath: &str, reason: impl fmt::Display) -> SchemaError {
        schema_error(ErrorKind::InvalidXPath, format!("invalid XPath '{}': {}", xpath, reason))
    }

    /// Parse an identity constraint XPath expression
    pub fn parse(&self, xpath: &str) -> Result<ParsedXPath, SchemaError> {
        if let Some(c) = xpath.chars().find(|c| matches!(c, '[' | ']')) {
            return Err(self.error(xpath, format_args!("predicates are not allowed ('{}')", c)));
        }
        let mut paths = Vec::new();
        for branch in xpath.split('|') {
            paths.push(self.parse_path(xpath, branch.trim())?);
        }
        Ok(ParsedXPath {
            expression: xpath.to_string(),
            paths,
        })
    }

    fn parse_path(&self, xpath: &str, text: &str) -> Result<XPathPath, SchemaError> {
        if text.is_empty() {
            return Err(self.error(xpath, "empty path"));
        }
        let mut steps = Vec::new();
        let rest = match text.strip_prefix(".//") {
            Some(rest) => {
                steps.push(XPathStep::self_node());
                steps.push(XPathStep::descendant_or_self());
                rest.trim_start()
            }
            None => text,
        };
        if rest.starts_with('/') {
            return Err(self.error(xpath, "absolute paths are not allowed"));
        }
        if rest.contains("//") {
            return Err(self.error(xpath, "'//' is only allowed as a leading './/'"));
        }

        let segments: Vec<&str> = rest.split('/').map(str::trim).collect();
        let mut attribute = None;
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(self.error(xpath, "empty step"));
            }
            let is_last = index + 1 == segments.len();
            match self.parse_step(xpath, segment)? {
                XPathStep {
                    axis: XPathAxis::Attribute,
                    node_test,
                } => {
                    if self.policy == AttributePolicy::Disallowed {
                        return Err(self.error(xpath, "attributes cannot be selected by a selector"));
                    }
                    if !is_last {
                        return Err(self.error(xpath, "an attribute step must be the last step"));
                    }
                    attribute = Some(node_test);
                }
                step => steps.push(step),
            }
        }
        Ok(XPathPath { steps, attribute })
    }

    fn parse_step(&self, xpath: &str, step: &str) -> Result<XPathStep, SchemaError> {
        if step == "." {
            return Ok(XPathStep::self_node());
        }
        if step == ".." {
            return Err(self.error(xpath, "the parent axis is not allowed"));
        }
        let (axis, test) = if let Some(test) = step.strip_prefix('@') {
            (XPathAxis::Attribute, test.trim())
        } else if let Some((axis, test)) = step.split_once("::") {
            let axis = axis.trim();
            match XPathAxis::parse(axis) {
                Some(XPathAxis::Self_) if test.trim() == "node()" => return Ok(XPathStep::self_node()),
                Some(XPathAxis::Self_) => {
                    return Err(self.error(xpath, "a self step is only allowed as '.'"));
                }
                Some(axis @ (XPathAxis::Child | XPathAxis::Attribute)) => (axis, test.trim()),
                _ => return Err(self.error(xpath, format_args!("the '{}' axis is not allowed", axis))),
            }
        } else {
            (XPathAxis::Child, step)
        };

        if test.contains('(') || test.contains(')') {
            return Err(self.error(xpath, format_args!("'{}' is not a name test", test)));
        }
        let node_test = self.parse_name_test(xpath, test, axis == XPathAxis::Attribute)?;
        Ok(XPathStep { axis, node_test })
    }

    fn parse_name_test(&self, xpath: &str, test: &str, is_attribute: bool) -> Result<NodeTest, SchemaError> {
        if test == "*" {
            return Ok(NodeTest::Wildcard);
        }
        match test.split_once(':') {
            Some((prefix, local)) => {
                let namespace = self.resolve_prefix(xpath, prefix)?;
                if local == "*" {
                    Ok(NodeTest::NamespaceWildcard(namespace))
                } else if is_valid_ncname(local) {
                    Ok(NodeTest::Name(QName::new(namespace, local)))
                } else {
                    Err(self.error(xpath, format_args!("'{}' is not a valid name test", test)))
                }
            }
            None if is_valid_ncname(test) => {
                let namespace = if is_attribute {
                    ""
                } else {
                    self.namespaces.get_default_namespace().unwrap_or("")
                };
                Ok(NodeTest::Name(QName::new(namespace, test)))
            }
            None => Err(self.error(xpath, format_args!("'{}' is not a valid name test", test))),
        }
    }

    fn resolve_prefix(&self, xpath: &str, prefix: &str) -> Result<String, SchemaError> {
        if !is_valid_ncname(prefix) {
            return Err(self.error(xpath, format_args!("'{}' is not a valid prefix", prefix)));
        }
        match self.namespaces.get_namespace(prefix) {
            Some(namespace) => Ok(namespace.to_string()),
            None if prefix == "xml" => Ok(XML_NAMESPACE.to_string()),
            None => Err(self.error(xpath, format_args!("prefix '{}' is not declared", prefix))),
        }
    }
}

/// Parse a selector expression (no attribute steps)
pub fn parse_selector(xpath: &str, namespaces: &NamespaceContext) -> Result<ParsedXPath, SchemaError> {
    IdentityXPathParser::for_selector(namespaces).parse(xpath)
}

/// Parse a field expression
pub fn parse_field(xpath: &str, namespaces: &NamespaceContext) -> Result<ParsedXPath, SchemaError> {
    IdentityXPathParser::for_field(namespaces).parse(xpath)
}
