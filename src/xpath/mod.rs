//! XPath Support for XML Schema
//!
//! Identity constraints locate their candidate elements and key values with
//! a restricted XPath subset. This module parses those expressions and
//! lowers them to small op programs; static resolution against a content
//! model lives in [`crate::validators::identities`].
//!
//! ## Example
//!
//! ```rust
//! use xsdcheck::namespaces::NamespaceContext;
//! use xsdcheck::xpath::{compile, parse_selector, SymbolTable};
//!
//! let namespaces = NamespaceContext::new().with_prefix("tns", "urn:example");
//! let parsed = parse_selector(".//tns:item", &namespaces).unwrap();
//! let mut symbols = SymbolTable::new();
//! let program = compile(&parsed, &mut symbols);
//! assert_eq!(program.render(&symbols), "root-self self descend child({urn:example}item)");
//! ```

mod parsers;
mod selectors;

pub use parsers::{
    parse_field, parse_selector, AttributePolicy, IdentityXPathParser, NodeTest, ParsedXPath, XPathAxis,
    XPathPath, XPathStep,
};
pub use selectors::{compile, CompiledPath, CompiledXPath, SymbolTable, XPathOp};
