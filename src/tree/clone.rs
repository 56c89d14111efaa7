//! Deep copies and detaching.

use std::collections::{BTreeSet, HashSet};

use super::{DocumentData, ElementData, Forest, NodeId, NodeKind};
use crate::util::qname::Namespace;

impl Forest {
    /// Clones a node into a new, detached node.
    ///
    /// Read-only nodes are shared and returned unchanged. Elements are
    /// copied with their whole subtree and pick up every namespace
    /// declaration they inherited from their ancestors, so the copy
    /// resolves the same prefixes on its own. The copy never has a parent
    /// or a document.
    pub fn clone_node(&mut self, id: NodeId) -> NodeId {
        if self.is_read_only(id) {
            return id;
        }
        match self.kind(id) {
            NodeKind::Element(_) => {
                let copy = self.clone_element_subtree(id);
                self.inherit_namespaces(id, copy);
                copy
            }
            NodeKind::Document(_) => self.clone_document(id),
            kind => {
                let kind = kind.clone();
                self.create_node(kind)
            }
        }
    }

    fn clone_element_subtree(&mut self, el: NodeId) -> NodeId {
        let (name, user_data) = match self.kind(el).as_element() {
            Some(data) => (data.name.clone(), data.user_data.clone()),
            None => return self.clone_node(el),
        };
        let data = ElementData {
            name,
            attributes: self.new_content(),
            content: self.new_content(),
            user_data,
        };
        let copy = self.create_node(NodeKind::Element(data));
        self.append_cloned_children(el, copy);
        copy
    }

    /// Appends copies of `source`'s attributes and content to `dest`.
    pub(crate) fn append_cloned_children(&mut self, source: NodeId, dest: NodeId) {
        let attributes = self.attributes(source).to_vec();
        for attr in attributes {
            let kind = self.kind(attr).clone();
            let copy = self.create_node(kind);
            if let Some(data) = self.node_mut(dest).kind.as_element_mut() {
                data.attributes.push(copy);
            }
            self.node_mut(copy).parent = Some(dest);
        }

        let content = self.content(source).to_vec();
        for child in content {
            let copy = match self.kind(child) {
                NodeKind::Namespace(_) => child,
                NodeKind::Element(_) => self.clone_element_subtree(child),
                kind => {
                    let kind = kind.clone();
                    self.create_node(kind)
                }
            };
            if let Some(data) = self.node_mut(dest).kind.as_element_mut() {
                if copy == child && data.content.contains(copy) {
                    continue;
                }
                data.content.push(copy);
            }
            if self.kind(copy).supports_parent() {
                self.set_parent(copy, dest);
            }
        }
    }

    /// Declares on `copy` the bindings `original` inherited from its
    /// ancestors that `copy` does not already resolve locally.
    fn inherit_namespaces(&mut self, original: NodeId, copy: NodeId) {
        let Some(parent) = self.parent(original) else {
            return;
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut inherited: BTreeSet<Namespace> = BTreeSet::new();
        for ancestor in self.ancestors(parent) {
            for ns in self.declared_namespaces(ancestor) {
                if seen.insert(ns.prefix().to_string()) {
                    inherited.insert(ns.clone());
                }
            }
        }
        for ns in inherited {
            if self.local_namespace_for_prefix(copy, ns.prefix()).is_some() {
                continue;
            }
            let node = self.namespace(ns.prefix(), ns.uri());
            if let Some(data) = self.node_mut(copy).kind.as_element_mut() {
                data.content.push(node);
            }
        }
    }

    fn clone_document(&mut self, doc: NodeId) -> NodeId {
        let Some(source) = self.kind(doc).as_document() else {
            return doc;
        };
        let name = source.name.clone();
        let materialized = source.content.is_some();
        let original_root = source.root_element;

        let mut content = Vec::new();
        let mut root_element = None;
        for child in self.content(doc).to_vec() {
            let copy = self.clone_node(child);
            if Some(child) == original_root {
                root_element = Some(copy);
            }
            content.push(copy);
        }

        let copy = self.create_node(NodeKind::Document(DocumentData {
            name,
            root_element,
            content: materialized.then(|| content.clone()),
        }));
        for child in content {
            self.node_mut(child).document = Some(copy);
        }
        copy
    }

    /// Removes a node from its parent element or its document and clears
    /// both links. Detaching a detached node only clears the links again.
    pub fn detach(&mut self, id: NodeId) -> NodeId {
        if !self.kind(id).supports_parent() {
            return id;
        }
        if let Some(parent) = self.parent(id) {
            self.remove_child(parent, id);
        } else if let Some(doc) = self.node(id).document {
            self.remove_node(doc, id);
        }
        let node = self.node_mut(id);
        node.parent = None;
        node.document = None;
        id
    }
}
