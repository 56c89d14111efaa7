//! # oxfxml
//!
//! XML building blocks for a pipeline engine: a mutable, namespace-aware
//! document tree kept in an arena, a SAX-style event layer over
//! [quick-xml](https://docs.rs/quick-xml), and a streaming rewrite engine
//! that drives a stack of states over those events.
//!
//! ## Quick Start
//!
//! ```
//! use oxfxml::serial::serialize;
//! use oxfxml::Forest;
//!
//! let mut forest = Forest::new();
//! let doc = forest.parse_str("<root><child>Hello</child></root>").unwrap();
//! let root = forest.root_element(doc).unwrap();
//! let copy = forest.clone_node(root);
//! assert_eq!(serialize(&forest, copy), "<root><child>Hello</child></root>");
//! ```
//!
//! Rewriting the URLs of a page on the fly:
//!
//! ```
//! use oxfxml::parser::{parse_sax, ParseOptions};
//! use oxfxml::rewrite::{url_rewrite_handler, ContextPathRewriter, RewriteOptions};
//! use oxfxml::serial::{SerializeOptions, XmlWriter};
//!
//! let writer = XmlWriter::with_options(SerializeOptions::default().xml_declaration(false));
//! let options = RewriteOptions::default().rewrite_uri("");
//! let mut handler =
//!     url_rewrite_handler(ContextPathRewriter::new("/shop", "/cart/view"), writer, &options);
//! parse_sax("<img src=\"logo.png\"/>", &ParseOptions::default(), &mut handler).unwrap();
//! assert_eq!(
//!     handler.into_inner().into_string(),
//!     "<img src=\"/shop/cart/logo.png\"/>\n"
//! );
//! ```

pub mod encoding;
pub mod error;
pub mod parser;
pub mod rewrite;
pub mod sax;
pub mod serial;
pub mod tree;
pub mod util;

// Re-export primary types at the crate root for convenience.
pub use tree::{Forest, NodeId};
