//! Namespace scope helpers and text normalization.

use std::collections::BTreeMap;

use super::{Forest, NodeId, NodeKind};
use crate::error::TreeError;
use crate::util::qname::XML_NAMESPACE;

impl Forest {
    /// Every prefix binding in scope at an element, keyed by prefix.
    ///
    /// The nearest declaration wins. `xml` is always present; an empty
    /// default namespace is left out.
    #[must_use]
    pub fn namespace_context(&self, el: NodeId) -> BTreeMap<String, String> {
        let mut context = BTreeMap::new();
        for ancestor in self.ancestors(el) {
            let Some(data) = self.kind(ancestor).as_element() else {
                continue;
            };
            let own = data.name.namespace();
            context
                .entry(own.prefix().to_string())
                .or_insert_with(|| own.uri().to_string());
            for ns in self.declared_namespaces(ancestor) {
                context
                    .entry(ns.prefix().to_string())
                    .or_insert_with(|| ns.uri().to_string());
            }
        }
        if context.get("").is_some_and(String::is_empty) {
            context.remove("");
        }
        context.insert("xml".to_string(), XML_NAMESPACE.to_string());
        context
    }

    /// Declares on `dest` every binding in scope at `source` that `dest`
    /// does not bind itself.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `dest` is not an element.
    pub fn copy_missing_namespaces(&mut self, source: NodeId, dest: NodeId) -> Result<(), TreeError> {
        let context = self.namespace_context(source);
        self.declare_missing(dest, &context)
    }

    fn declare_missing(
        &mut self,
        dest: NodeId,
        context: &BTreeMap<String, String>,
    ) -> Result<(), TreeError> {
        self.element_data(dest)?;
        for (prefix, uri) in context {
            if prefix == "xml" || self.local_namespace_for_prefix(dest, prefix).is_some() {
                continue;
            }
            self.add_namespace(dest, prefix, uri)?;
        }
        Ok(())
    }

    /// Creates a new document rooted at `el`, or at a copy of it, with all
    /// namespaces `el` inherited declared on the new root.
    ///
    /// With `detach` the element itself is moved; otherwise a copy is made
    /// and the original stays in place.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn create_document_copy_parent_namespaces(
        &mut self,
        el: NodeId,
        detach: bool,
    ) -> Result<NodeId, TreeError> {
        self.element_data(el)?;
        let context = self.namespace_context(el);
        let root = if detach {
            self.detach(el)
        } else {
            self.create_copy(el)?
        };
        self.declare_missing(root, &context)?;
        self.create_document_with_root(root)
    }

    /// A detached copy of `el` carrying every namespace in scope at `el`.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn copy_element_copy_parent_namespaces(&mut self, el: NodeId) -> Result<NodeId, TreeError> {
        let context = self.namespace_context(el);
        let copy = self.create_copy(el)?;
        self.declare_missing(copy, &context)?;
        Ok(copy)
    }

    /// Merges adjacent text nodes and drops empty ones, recursively.
    pub fn normalize_text_nodes(&mut self, id: NodeId) {
        let children = self.content(id).to_vec();
        if self.kind(id).as_document().is_some() {
            for child in children {
                self.normalize_text_nodes(child);
            }
            return;
        }
        if !self.is_element(id) {
            return;
        }

        let mut previous: Option<NodeId> = None;
        for child in children {
            let text = match self.kind(child) {
                NodeKind::Text { content } => content.clone(),
                NodeKind::Element(_) => {
                    self.normalize_text_nodes(child);
                    previous = None;
                    continue;
                }
                _ => {
                    previous = None;
                    continue;
                }
            };
            if text.is_empty() {
                self.remove_child(id, child);
                continue;
            }
            match previous {
                Some(target) => {
                    if let NodeKind::Text { content } = &mut self.node_mut(target).kind {
                        content.push_str(&text);
                    }
                    self.remove_child(id, child);
                }
                None => previous = Some(child),
            }
        }
    }
}
