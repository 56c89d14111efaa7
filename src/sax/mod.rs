//! SAX2 streaming event handler API.
//!
//! A [`ContentHandler`] receives the events of an XML document in order:
//! the parser in [`crate::parser`] produces them from markup,
//! [`write_node`] produces them from a tree, and the rewrite engine in
//! [`crate::rewrite`] sits between a producer and a downstream handler.
//!
//! # Examples
//!
//! ```
//! use oxfxml::parser::{parse_sax, ParseOptions};
//! use oxfxml::sax::{Attributes, ContentHandler};
//!
//! struct Counter {
//!     elements: usize,
//! }
//!
//! impl ContentHandler for Counter {
//!     fn start_element(&mut self, _uri: &str, _local: &str, _qname: &str, _atts: &Attributes) {
//!         self.elements += 1;
//!     }
//! }
//!
//! let mut counter = Counter { elements: 0 };
//! parse_sax("<root><a/><b/></root>", &ParseOptions::default(), &mut counter).unwrap();
//! assert_eq!(counter.elements, 3);
//! ```

mod attributes;
mod writer;

pub use attributes::{Attributes, SaxAttribute};
pub use writer::write_node;

/// A SAX2 content handler.
///
/// All callbacks default to doing nothing, so implementors override only
/// what they need. Callbacks cannot fail; a handler that can hit an error
/// records it and reports it once the stream is over.
#[allow(unused_variables)]
pub trait ContentHandler {
    /// Called once before `start_document` with the document's system id,
    /// if known.
    fn set_document_locator(&mut self, system_id: Option<&str>) {}

    fn start_document(&mut self) {}

    fn end_document(&mut self) {}

    /// A prefix comes into scope for the next element and its content.
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {}

    /// A prefix goes out of scope, after the element's end event.
    fn end_prefix_mapping(&mut self, prefix: &str) {}

    /// An element start tag. `uri` is empty for elements in no namespace.
    fn start_element(&mut self, uri: &str, local_name: &str, qname: &str, attributes: &Attributes) {
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) {}

    /// Character data. Adjacent calls may split one run of text.
    fn characters(&mut self, text: &str) {}

    /// Whitespace that carries no content.
    fn ignorable_whitespace(&mut self, text: &str) {}

    /// The content of a CDATA section.
    fn cdata(&mut self, text: &str) {}

    fn processing_instruction(&mut self, target: &str, data: &str) {}

    /// An entity reference the producer did not expand.
    fn skipped_entity(&mut self, name: &str) {}

    fn comment(&mut self, text: &str) {}
}

impl<T: ContentHandler + ?Sized> ContentHandler for &mut T {
    fn set_document_locator(&mut self, system_id: Option<&str>) {
        (**self).set_document_locator(system_id);
    }

    fn start_document(&mut self) {
        (**self).start_document();
    }

    fn end_document(&mut self) {
        (**self).end_document();
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        (**self).start_prefix_mapping(prefix, uri);
    }

    fn end_prefix_mapping(&mut self, prefix: &str) {
        (**self).end_prefix_mapping(prefix);
    }

    fn start_element(&mut self, uri: &str, local_name: &str, qname: &str, attributes: &Attributes) {
        (**self).start_element(uri, local_name, qname, attributes);
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) {
        (**self).end_element(uri, local_name, qname);
    }

    fn characters(&mut self, text: &str) {
        (**self).characters(text);
    }

    fn ignorable_whitespace(&mut self, text: &str) {
        (**self).ignorable_whitespace(text);
    }

    fn cdata(&mut self, text: &str) {
        (**self).cdata(text);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        (**self).processing_instruction(target, data);
    }

    fn skipped_entity(&mut self, name: &str) {
        (**self).skipped_entity(name);
    }

    fn comment(&mut self, text: &str) {
        (**self).comment(text);
    }
}

/// A handler that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl ContentHandler for DefaultHandler {}
