//! Document-level content: the root element and the comments and
//! processing instructions around it.
//!
//! A document's content list is allocated on first mutable access. Until
//! then the root element, if set, stands in for it, and the list is seeded
//! with that root when it is finally created.

use super::{DocumentData, Forest, NodeId, NodeKind};
use crate::error::TreeError;

impl Forest {
    /// Creates a document with `root` as its root element. The content list
    /// is not allocated yet.
    ///
    /// # Errors
    ///
    /// Fails like [`add_node`](Self::add_node) when `root` cannot be added.
    pub fn create_document_with_root(&mut self, root: NodeId) -> Result<NodeId, TreeError> {
        let doc = self.create_document();
        if !self.is_element(root) {
            return Err(TreeError::illegal_add(root, doc, "the root must be an element"));
        }
        self.check_document_add(doc, root)?;
        self.document_child_added(doc, root);
        Ok(doc)
    }

    fn document_data(&self, doc: NodeId) -> Result<&DocumentData, TreeError> {
        self.kind(doc)
            .as_document()
            .ok_or(TreeError::Unsupported {
                node: doc,
                operation: "document content",
            })
    }

    fn document_data_mut(&mut self, doc: NodeId) -> Result<&mut DocumentData, TreeError> {
        self.node_mut(doc)
            .kind
            .as_document_mut()
            .ok_or(TreeError::Unsupported {
                node: doc,
                operation: "document content",
            })
    }

    /// Materializes the content list, seeding it with the root element.
    fn document_content_list(&mut self, doc: NodeId) -> Result<&mut Vec<NodeId>, TreeError> {
        let data = self.document_data_mut(doc)?;
        let root = data.root_element;
        Ok(data.content.get_or_insert_with(|| root.into_iter().collect()))
    }

    /// Checks that `node` may become top-level content of `doc`.
    fn check_document_add(&self, doc: NodeId, node: NodeId) -> Result<(), TreeError> {
        if self.is_element(node) && self.document_data(doc)?.root_element.is_some() {
            return Err(TreeError::illegal_add(
                node,
                doc,
                "the document already has a root element",
            ));
        }
        self.check_top_level(doc, node)
    }

    /// As [`check_document_add`](Self::check_document_add), without the
    /// single root element rule.
    fn check_top_level(&self, doc: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.document_data(doc)?;
        match self.kind(node) {
            NodeKind::Document(_) => {
                return Err(TreeError::illegal_add(
                    node,
                    doc,
                    "a document cannot contain a document",
                ))
            }
            NodeKind::Attribute { .. }
            | NodeKind::Namespace(_)
            | NodeKind::Text { .. }
            | NodeKind::CData { .. } => {
                return Err(TreeError::illegal_add(
                    node,
                    doc,
                    format!("a {} cannot be document content", self.node_type_name(node)),
                ))
            }
            _ => {}
        }
        match self.document(node) {
            Some(owner) if owner != doc => {
                return Err(TreeError::illegal_add(
                    node,
                    doc,
                    format!(
                        "the node already belongs to document {}",
                        owner.into_raw()
                    ),
                ))
            }
            Some(_) => {
                return Err(TreeError::illegal_add(
                    node,
                    doc,
                    "the node is already part of this document",
                ))
            }
            None => {}
        }
        if let Some(parent) = self.parent(node) {
            return Err(TreeError::illegal_add(
                node,
                doc,
                format!("the node already has a parent {}", self.path(parent)),
            ));
        }
        Ok(())
    }

    /// Appends a top-level node to a document.
    ///
    /// # Errors
    ///
    /// `IllegalAdd` when the node belongs to another document, already has
    /// a parent or is a second root element. Only elements, comments and
    /// processing instructions can be top-level content.
    /// The document is left unchanged on error.
    pub fn add_node(&mut self, doc: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.check_document_add(doc, node)?;
        self.document_content_list(doc)?.push(node);
        self.document_child_added(doc, node);
        Ok(())
    }

    /// Inserts a top-level node at `index`.
    ///
    /// # Errors
    ///
    /// As [`add_node`](Self::add_node), plus `IndexOutOfBounds`.
    pub fn add_node_at(&mut self, doc: NodeId, index: usize, node: NodeId) -> Result<(), TreeError> {
        self.check_document_add(doc, node)?;
        let len = self.content(doc).len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        self.document_content_list(doc)?.insert(index, node);
        self.document_child_added(doc, node);
        Ok(())
    }

    fn document_child_added(&mut self, doc: NodeId, node: NodeId) {
        if self.is_element(node) {
            if let Some(data) = self.node_mut(doc).kind.as_document_mut() {
                data.root_element = Some(node);
            }
        }
        self.node_mut(node).document = Some(doc);
    }

    /// Removes a top-level node. Removing the root element also clears the
    /// root element reference.
    ///
    /// Returns `true` if the node was found.
    pub fn remove_node(&mut self, doc: NodeId, node: NodeId) -> bool {
        let Ok(list) = self.document_content_list(doc) else {
            return false;
        };
        let removed = match list.iter().position(|&c| c == node) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        };
        if let Some(data) = self.node_mut(doc).kind.as_document_mut() {
            if data.root_element == Some(node) {
                data.root_element = None;
            }
        }
        if removed {
            self.node_mut(node).document = None;
        }
        removed
    }

    /// Replaces the root element, removing the previous one. The new root
    /// takes the old one's place among the top-level nodes.
    ///
    /// # Errors
    ///
    /// As [`add_node`](Self::add_node) for the new root, and `IllegalAdd`
    /// when `root` is not an element. The document is left unchanged on
    /// error.
    pub fn set_root_element(&mut self, doc: NodeId, root: NodeId) -> Result<(), TreeError> {
        let Some(old) = self.root_element(doc) else {
            if !self.is_element(root) {
                return Err(TreeError::illegal_add(root, doc, "the root must be an element"));
            }
            return self.add_node(doc, root);
        };
        if old == root {
            return Ok(());
        }
        if !self.is_element(root) {
            return Err(TreeError::illegal_add(root, doc, "the root must be an element"));
        }
        self.check_top_level(doc, root)?;
        let position = self.content(doc).iter().position(|&c| c == old);
        self.remove_node(doc, old);
        let list = self.document_content_list(doc)?;
        let index = position.unwrap_or(list.len()).min(list.len());
        list.insert(index, root);
        self.document_child_added(doc, root);
        Ok(())
    }

    /// Removes all content. On a document this drops both the content list
    /// and the root element reference; on an element the attributes stay.
    pub fn clear_content(&mut self, branch: NodeId) {
        let children = self.content(branch).to_vec();
        if self.is_element(branch) {
            for child in children {
                if self.kind(child).supports_parent() {
                    let node = self.node_mut(child);
                    node.parent = None;
                    node.document = None;
                }
            }
            if let Ok(data) = self.element_data_mut(branch) {
                data.content.clear();
            }
            return;
        }
        for child in children {
            self.node_mut(child).document = None;
        }
        if let Some(data) = self.node_mut(branch).kind.as_document_mut() {
            data.content = None;
            data.root_element = None;
        }
    }
}
