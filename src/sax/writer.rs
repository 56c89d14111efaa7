//! Replaying a tree as SAX events.

use super::{Attributes, ContentHandler};
use crate::tree::{Forest, NodeId, NodeKind};
use crate::util::qname::Namespace;

/// Emits the events for a document, an element subtree or a single leaf.
///
/// Namespace declaration nodes become prefix mappings around their
/// element. Bindings an element or attribute name needs but that are not
/// declared anywhere in the replayed subtree are added as well, so the
/// event stream is namespace-complete even for a subtree cut out of a
/// larger document.
///
/// ```
/// use oxfxml::sax::write_node;
/// use oxfxml::serial::XmlWriter;
/// use oxfxml::tree::Forest;
///
/// let mut forest = Forest::new();
/// let doc = forest.parse_str("<p:a xmlns:p=\"urn:p\"><p:b/></p:a>").unwrap();
/// let a = forest.root_element(doc).unwrap();
/// let b = forest.child_elements(a).next().unwrap();
///
/// let mut writer = XmlWriter::new();
/// write_node(&forest, b, &mut writer);
/// assert_eq!(writer.into_string(), "<p:b xmlns:p=\"urn:p\"/>");
/// ```
pub fn write_node<H: ContentHandler + ?Sized>(forest: &Forest, node: NodeId, handler: &mut H) {
    let mut writer = NodeWriter {
        forest,
        handler,
        scope: Vec::new(),
    };
    writer.write(node);
}

struct NodeWriter<'a, H: ?Sized> {
    forest: &'a Forest,
    handler: &'a mut H,
    /// Bindings announced so far, innermost last.
    scope: Vec<Namespace>,
}

impl<H: ContentHandler + ?Sized> NodeWriter<'_, H> {
    fn write(&mut self, node: NodeId) {
        match self.forest.kind(node) {
            NodeKind::Document(_) => {
                self.handler.start_document();
                for child in self.forest.children(node) {
                    self.write(child);
                }
                self.handler.end_document();
            }
            NodeKind::Element(_) => self.write_element(node),
            NodeKind::Text { content } => self.handler.characters(content),
            NodeKind::CData { content } => self.handler.cdata(content),
            NodeKind::Comment { content } => self.handler.comment(content),
            NodeKind::ProcessingInstruction { target, data } => {
                self.handler.processing_instruction(target, data);
            }
            NodeKind::Attribute { .. } | NodeKind::Namespace(_) => {}
        }
    }

    fn in_scope(&self, ns: &Namespace) -> bool {
        if ns.prefix() == "xml" {
            return true;
        }
        match self.scope.iter().rev().find(|b| b.prefix() == ns.prefix()) {
            Some(bound) => bound.uri() == ns.uri(),
            None => ns.prefix().is_empty() && ns.uri().is_empty(),
        }
    }

    fn write_element(&mut self, el: NodeId) {
        let forest = self.forest;
        let Some(qname) = forest.qname(el) else {
            return;
        };
        let mark = self.scope.len();

        let mut needed: Vec<Namespace> = forest.declared_namespaces(el).cloned().collect();
        needed.push(qname.namespace().clone());
        for &attr in forest.attributes(el) {
            if let Some(name) = forest.qname(attr) {
                if !name.prefix().is_empty() {
                    needed.push(name.namespace().clone());
                }
            }
        }
        for ns in needed {
            let shadowed = self.scope[mark..].iter().any(|b| b.prefix() == ns.prefix());
            if shadowed || self.in_scope(&ns) {
                continue;
            }
            self.handler.start_prefix_mapping(ns.prefix(), ns.uri());
            self.scope.push(ns);
        }

        let mut attributes = Attributes::new();
        for &attr in forest.attributes(el) {
            if let (Some(name), Some(value)) = (forest.qname(attr), forest.node_text(attr)) {
                attributes.add(
                    name.namespace_uri(),
                    name.local_name(),
                    name.qualified_name(),
                    value,
                );
            }
        }

        let (uri, local, qualified) = (
            qname.namespace_uri(),
            qname.local_name(),
            qname.qualified_name(),
        );
        self.handler.start_element(uri, local, qualified, &attributes);
        for child in forest.children(el) {
            self.write(child);
        }
        self.handler.end_element(uri, local, qualified);

        while self.scope.len() > mark {
            if let Some(ns) = self.scope.pop() {
                self.handler.end_prefix_mapping(ns.prefix());
            }
        }
    }
}
