//! Compiled XPath selectors
//!
//! A parsed identity-constraint XPath is lowered to one small op program per
//! union branch. Names and namespaces in the program are indices into a
//! [`SymbolTable`] owned by the caller, so programs compiled against the same
//! table can be compared by value.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

use super::parsers::{NodeTest, ParsedXPath, XPathAxis, XPathPath};

/// Interned names and namespace URIs
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: IndexSet<String>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its index
    pub fn intern(&mut self, symbol: &str) -> usize {
        match self.symbols.get_index_of(symbol) {
            Some(index) => index,
            None => self.symbols.insert_full(symbol.to_string()).0,
        }
    }

    /// Look up an interned string
    pub fn get(&self, index: usize) -> Option<&str> {
        self.symbols.get_index(index).map(String::as_str)
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check for an empty table
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// One instruction of a selector program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum XPathOp {
    /// Start at the element carrying the identity constraint
    RootSelf,
    /// `.`
    SelfNode,
    /// Make the next child step match at any depth
    Descend,
    /// `*`
    ChildAny,
    /// `prefix:*`
    ChildNsAny {
        /// Namespace symbol
        namespace: usize,
    },
    /// Named child element
    ChildName {
        /// Local name symbol
        name: usize,
        /// Namespace symbol
        namespace: usize,
    },
    /// `@*`
    AttrAny,
    /// `@prefix:*`
    AttrNsAny {
        /// Namespace symbol
        namespace: usize,
    },
    /// Named attribute
    AttrName {
        /// Local name symbol
        name: usize,
        /// Namespace symbol
        namespace: usize,
    },
}

/// Op program of one union branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPath {
    /// Instructions in evaluation order
    pub ops: Vec<XPathOp>,
}

impl CompiledPath {
    /// Render the program with names resolved through `symbols`
    pub fn render(&self, symbols: &SymbolTable) -> String {
        self.ops
            .iter()
            .map(|op| RenderedOp { op, symbols }.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A compiled selector or field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledXPath {
    /// Source expression
    pub expression: String,
    /// One program per union branch
    pub paths: Vec<CompiledPath>,
}

impl CompiledXPath {
    /// Render all branches, one per line
    pub fn render(&self, symbols: &SymbolTable) -> String {
        self.paths
            .iter()
            .map(|path| path.render(symbols))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct RenderedOp<'a> {
    op: &'a XPathOp,
    symbols: &'a SymbolTable,
}

impl RenderedOp<'_> {
    fn symbol(&self, index: usize) -> &str {
        self.symbols.get(index).unwrap_or("?")
    }
}

impl fmt::Display for RenderedOp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.op {
            XPathOp::RootSelf => write!(f, "root-self"),
            XPathOp::SelfNode => write!(f, "self"),
            XPathOp::Descend => write!(f, "descend"),
            XPathOp::ChildAny => write!(f, "child(*)"),
            XPathOp::ChildNsAny { namespace } => write!(f, "child({{{}}}*)", self.symbol(namespace)),
            XPathOp::ChildName { name, namespace } => {
                write!(f, "child({{{}}}{})", self.symbol(namespace), self.symbol(name))
            }
            XPathOp::AttrAny => write!(f, "attr(*)"),
            XPathOp::AttrNsAny { namespace } => write!(f, "attr({{{}}}*)", self.symbol(namespace)),
            XPathOp::AttrName { name, namespace } => {
                write!(f, "attr({{{}}}{})", self.symbol(namespace), self.symbol(name))
            }
        }
    }
}

fn compile_path(path: &XPathPath, symbols: &mut SymbolTable) -> CompiledPath {
    let mut ops = vec![XPathOp::RootSelf];
    for step in &path.steps {
        let op = match (step.axis, &step.node_test) {
            (XPathAxis::Self_, _) => XPathOp::SelfNode,
            (XPathAxis::DescendantOrSelf, _) => XPathOp::Descend,
            (_, NodeTest::Wildcard | NodeTest::Node) => XPathOp::ChildAny,
            (_, NodeTest::NamespaceWildcard(ns)) => XPathOp::ChildNsAny {
                namespace: symbols.intern(ns),
            },
            (_, NodeTest::Name(qname)) => XPathOp::ChildName {
                name: symbols.intern(&qname.local_name),
                namespace: symbols.intern(&qname.namespace),
            },
        };
        ops.push(op);
    }
    if let Some(test) = &path.attribute {
        ops.push(match test {
            NodeTest::Wildcard | NodeTest::Node => XPathOp::AttrAny,
            NodeTest::NamespaceWildcard(ns) => XPathOp::AttrNsAny {
                namespace: symbols.intern(ns),
            },
            NodeTest::Name(qname) => XPathOp::AttrName {
                name: symbols.intern(&qname.local_name),
                namespace: symbols.intern(&qname.namespace),
            },
        });
    }
    CompiledPath { ops }
}

/// Lower a parsed expression to op programs
pub fn compile(parsed: &ParsedXPath, symbols: &mut SymbolTable) -> CompiledXPath {
    CompiledXPath {
        expression: parsed.expression.clone(),
        paths: parsed.paths.iter().map(|p| compile_path(p, symbols)).collect(),
    }
}
