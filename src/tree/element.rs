//! Element content, attributes, namespace declarations and user data.

use log::debug;

use super::{ElementData, Forest, NodeId, NodeKind, UserData};
use crate::error::TreeError;
use crate::util::qname::{split_qname, Namespace, QName};

impl Forest {
    pub(crate) fn element_data(&self, el: NodeId) -> Result<&ElementData, TreeError> {
        self.kind(el)
            .as_element()
            .ok_or(TreeError::NotABranch { node: el })
    }

    pub(crate) fn element_data_mut(&mut self, el: NodeId) -> Result<&mut ElementData, TreeError> {
        self.node_mut(el)
            .kind
            .as_element_mut()
            .ok_or(TreeError::NotABranch { node: el })
    }

    fn check_element_add(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.element_data(parent)?;
        match self.kind(child) {
            NodeKind::Document(_) => {
                return Err(TreeError::illegal_add(
                    child,
                    parent,
                    "a document cannot be added to an element",
                ))
            }
            NodeKind::Namespace(_) => return Ok(()),
            _ => {}
        }
        if let Some(owner) = self.parent(child) {
            return Err(TreeError::illegal_add(
                child,
                parent,
                format!("the node already has a parent {}", self.path(owner)),
            ));
        }
        if let Some(doc) = self.node(child).document {
            return Err(TreeError::illegal_add(
                child,
                parent,
                format!("the node already belongs to document {}", doc.into_raw()),
            ));
        }
        if self.ancestors(parent).any(|a| a == child) {
            return Err(TreeError::illegal_add(
                child,
                parent,
                "the node is an ancestor of the target",
            ));
        }
        Ok(())
    }

    /// Appends a node to an element. Attributes go to the attribute list
    /// and replace an attribute with the same name.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `parent` is not an element; `IllegalAdd` when
    /// `child` is a document, is already attached somewhere or is an
    /// ancestor of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_element_add(parent, child)?;
        match self.kind(child) {
            NodeKind::Attribute { .. } => {
                self.attach_attribute(parent, child);
                return Ok(());
            }
            NodeKind::Namespace(_) => {
                let data = self.element_data_mut(parent)?;
                if !data.content.contains(child) {
                    data.content.push(child);
                }
                return Ok(());
            }
            _ => {}
        }
        self.element_data_mut(parent)?.content.push(child);
        self.set_parent(child, parent);
        Ok(())
    }

    /// Inserts a node into an element's content at `index`.
    ///
    /// # Errors
    ///
    /// As [`add_child`](Self::add_child), plus `IndexOutOfBounds`;
    /// attributes have no position and are rejected with `Unsupported`.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        self.check_element_add(parent, child)?;
        if matches!(self.kind(child), NodeKind::Attribute { .. }) {
            return Err(TreeError::Unsupported {
                node: child,
                operation: "positional insert of an attribute",
            });
        }
        let len = self.content(parent).len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        let is_namespace = matches!(self.kind(child), NodeKind::Namespace(_));
        let data = self.element_data_mut(parent)?;
        if is_namespace && data.content.contains(child) {
            return Ok(());
        }
        data.content.insert(index, child);
        if self.kind(child).supports_parent() {
            self.set_parent(child, parent);
        }
        Ok(())
    }

    /// Removes a content node or attribute from an element.
    ///
    /// Returns `true` if it was found; its parent link is cleared.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let is_attribute = matches!(self.kind(child), NodeKind::Attribute { .. });
        let Ok(data) = self.element_data_mut(parent) else {
            return false;
        };
        let removed = if is_attribute {
            data.attributes.remove(child)
        } else {
            data.content.remove(child)
        };
        if removed && self.kind(child).supports_parent() {
            let node = self.node_mut(child);
            node.parent = None;
            node.document = None;
        }
        removed
    }

    /// Swaps `old` for `new` at the same position in an element's content.
    ///
    /// # Errors
    ///
    /// As [`add_child`](Self::add_child) for `new`.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    ) -> Result<bool, TreeError> {
        self.check_element_add(parent, new)?;
        if !self.element_data_mut(parent)?.content.replace(old, new) {
            return Ok(false);
        }
        if self.kind(old).supports_parent() {
            self.node_mut(old).parent = None;
        }
        if self.kind(new).supports_parent() {
            self.set_parent(new, parent);
        }
        Ok(true)
    }

    /// Records `parent` on a newly attached node.
    ///
    /// For elements this also drops namespace declarations the new parent
    /// already provides, and demotes the element's name to an un-prefixed
    /// one when the parent binds the element's prefix to a URI spelled the
    /// same as the prefix.
    pub(crate) fn set_parent(&mut self, node: NodeId, parent: NodeId) {
        self.node_mut(node).parent = Some(parent);
        let Some(data) = self.kind(node).as_element() else {
            return;
        };

        let prefix = data.name.prefix().to_string();
        let local = data.name.local_name().to_string();
        if !prefix.is_empty() {
            let inherited = self.namespace_for_prefix(parent, &prefix);
            if inherited.is_some_and(|ns| ns.uri() == prefix) {
                debug!("demoting {prefix}:{local} to an un-prefixed name");
                if let Ok(data) = self.element_data_mut(node) {
                    data.name = QName::new(local);
                }
            }
        }

        let redundant: Vec<NodeId> = self
            .content(node)
            .iter()
            .copied()
            .filter(|&child| match self.kind(child).as_namespace() {
                Some(ns) => self.namespace_for_prefix(parent, ns.prefix()).as_ref() == Some(ns),
                None => false,
            })
            .collect();
        if redundant.is_empty() {
            return;
        }
        if let Ok(data) = self.element_data_mut(node) {
            for ns in &redundant {
                data.content.remove(*ns);
            }
        }
        debug!(
            "pruned {} namespace declaration(s) already in scope at {}",
            redundant.len(),
            self.path(parent)
        );
    }

    // --- Attributes ---

    /// Attaches an attribute node, replacing one with the same name.
    fn attach_attribute(&mut self, el: NodeId, attr: NodeId) {
        let existing = match self.qname(attr) {
            Some(name) => self.attribute(el, name.namespace_uri(), name.local_name()),
            None => None,
        };
        if let Ok(data) = self.element_data_mut(el) {
            match existing {
                Some(old) => {
                    data.attributes.replace(old, attr);
                }
                None => data.attributes.push(attr),
            }
        }
        if let Some(old) = existing {
            self.node_mut(old).parent = None;
        }
        self.node_mut(attr).parent = Some(el);
    }

    /// Sets an attribute, updating the value of an existing one.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn add_attribute(
        &mut self,
        el: NodeId,
        name: QName,
        value: impl Into<String>,
    ) -> Result<NodeId, TreeError> {
        self.element_data(el)?;
        if let Some(existing) = self.attribute(el, name.namespace_uri(), name.local_name()) {
            if let NodeKind::Attribute {
                name: old_name,
                value: old_value,
            } = &mut self.node_mut(existing).kind
            {
                *old_name = name;
                *old_value = value.into();
            }
            return Ok(existing);
        }
        let attr = self.create_attribute(name, value);
        self.attach_attribute(el, attr);
        Ok(attr)
    }

    /// Finds an attribute node by namespace URI and local name.
    #[must_use]
    pub fn attribute(&self, el: NodeId, uri: &str, local_name: &str) -> Option<NodeId> {
        self.attributes(el)
            .iter()
            .copied()
            .find(|&attr| self.qname(attr).is_some_and(|n| n.matches(uri, local_name)))
    }

    /// The value of the attribute with this URI and local name.
    #[must_use]
    pub fn attribute_value(&self, el: NodeId, uri: &str, local_name: &str) -> Option<&str> {
        self.attribute(el, uri, local_name)
            .and_then(|attr| self.node_text(attr))
    }

    /// Removes an attribute by name; returns whether one was removed.
    pub fn remove_attribute(&mut self, el: NodeId, uri: &str, local_name: &str) -> bool {
        match self.attribute(el, uri, local_name) {
            Some(attr) => self.remove_child(el, attr),
            None => false,
        }
    }

    // --- Namespaces ---

    /// Declares `prefix` → `uri` on an element.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn add_namespace(&mut self, el: NodeId, prefix: &str, uri: &str) -> Result<NodeId, TreeError> {
        self.element_data(el)?;
        let ns = self.namespace(prefix, uri);
        self.add_child(el, ns)?;
        Ok(ns)
    }

    /// Namespace declarations carried directly by an element.
    pub fn declared_namespaces(&self, el: NodeId) -> impl Iterator<Item = &Namespace> + '_ {
        self.content(el)
            .iter()
            .filter_map(|&child| self.kind(child).as_namespace())
    }

    /// The binding for `prefix` visible on the element itself: its own
    /// name, then its declarations.
    pub(crate) fn local_namespace_for_prefix(&self, el: NodeId, prefix: &str) -> Option<&Namespace> {
        let data = self.kind(el).as_element()?;
        if data.name.prefix() == prefix {
            return Some(data.name.namespace());
        }
        self.declared_namespaces(el).find(|ns| ns.prefix() == prefix)
    }

    /// Resolves `prefix` at an element, walking up its ancestors.
    ///
    /// `xml` is always bound; an unbound empty prefix resolves to no
    /// namespace.
    #[must_use]
    pub fn namespace_for_prefix(&self, el: NodeId, prefix: &str) -> Option<Namespace> {
        if prefix == "xml" {
            return Some(Namespace::xml());
        }
        for ancestor in self.ancestors(el) {
            if let Some(ns) = self.local_namespace_for_prefix(ancestor, prefix) {
                return Some(ns.clone());
            }
        }
        prefix.is_empty().then(Namespace::no_namespace)
    }

    /// Builds a QName for `qualified` resolved at `el`. Unbound prefixes
    /// keep an empty URI.
    pub(crate) fn resolve_qname(&self, el: NodeId, qualified: &str) -> QName {
        let (prefix, _) = split_qname(qualified);
        let uri = if self.is_element(el) {
            self.namespace_for_prefix(el, prefix.unwrap_or(""))
                .map(|ns| ns.uri().to_string())
                .unwrap_or_default()
        } else {
            String::new()
        };
        QName::from_parts(&uri, qualified)
    }

    // --- User data and element factories ---

    #[must_use]
    pub fn user_data(&self, el: NodeId) -> Option<&UserData> {
        self.kind(el).as_element().and_then(ElementData::user_data)
    }

    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn set_user_data(&mut self, el: NodeId, data: Option<UserData>) -> Result<(), TreeError> {
        self.element_data_mut(el)?.user_data = data;
        Ok(())
    }

    /// Creates an element named `name` and appends it to `parent`, an
    /// element or a document. Element parents pass their user data on.
    ///
    /// # Errors
    ///
    /// As [`add_child`](Self::add_child) or [`add_node`](Self::add_node).
    pub fn add_element(&mut self, parent: NodeId, name: QName) -> Result<NodeId, TreeError> {
        if self.kind(parent).as_document().is_some() {
            let child = self.create_element(name);
            self.add_node(parent, child)?;
            return Ok(child);
        }
        let user_data = self.element_data(parent)?.user_data.clone();
        let child = self.create_element(name);
        self.element_data_mut(child)?.user_data = user_data;
        self.add_child(parent, child)?;
        Ok(child)
    }

    /// Like [`add_element`](Self::add_element), resolving the prefix of
    /// `name` against the namespaces in scope at `parent`.
    ///
    /// # Errors
    ///
    /// As [`add_element`](Self::add_element).
    pub fn add_element_named(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        let qname = self.resolve_qname(parent, name);
        self.add_element(parent, qname)
    }

    /// A detached copy of an element with cloned attributes and content.
    ///
    /// Unlike [`clone_node`](Self::clone_node) it does not pick up
    /// namespaces from the original's ancestors.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn create_copy(&mut self, el: NodeId) -> Result<NodeId, TreeError> {
        let name = self.element_data(el)?.name.clone();
        self.create_copy_with_qname(el, name)
    }

    /// A copy renamed to `name`, resolved against the original's scope.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn create_copy_named(&mut self, el: NodeId, name: &str) -> Result<NodeId, TreeError> {
        self.element_data(el)?;
        let qname = self.resolve_qname(el, name);
        self.create_copy_with_qname(el, qname)
    }

    /// A copy renamed to `name`.
    ///
    /// # Errors
    ///
    /// `NotABranch` when `el` is not an element.
    pub fn create_copy_with_qname(&mut self, el: NodeId, name: QName) -> Result<NodeId, TreeError> {
        let user_data = self.element_data(el)?.user_data.clone();
        let copy = self.create_element(name);
        self.element_data_mut(copy)?.user_data = user_data;
        self.append_cloned_children(el, copy);
        Ok(copy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::{ContentStorage, ForestOptions};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_child_sets_parent() {
        let mut forest = Forest::new();
        let a = forest.create_element_named("a");
        let b = forest.create_element_named("b");
        forest.add_child(a, b).unwrap();
        assert_eq!(forest.parent(b), Some(a));
        assert_eq!(forest.content(a), &[b]);
    }

    #[test]
    fn test_add_child_rejects_attached_node() {
        let mut forest = Forest::new();
        let a = forest.create_element_named("a");
        let b = forest.create_element_named("b");
        let c = forest.create_element_named("c");
        forest.add_child(a, c).unwrap();
        let err = forest.add_child(b, c).unwrap_err();
        assert!(matches!(err, TreeError::IllegalAdd { node, .. } if node == c));
        assert!(forest.content(b).is_empty());
    }

    #[test]
    fn test_add_child_rejects_cycle() {
        let mut forest = Forest::new();
        let a = forest.create_element_named("a");
        let b = forest.add_element(a, QName::new("b")).unwrap();
        assert!(forest.add_child(b, a).is_err());
        assert!(forest.add_child(a, a).is_err());
    }

    #[test]
    fn test_add_child_to_leaf_fails() {
        let mut forest = Forest::new();
        let text = forest.create_text("t");
        let b = forest.create_element_named("b");
        assert_eq!(
            forest.add_child(text, b),
            Err(TreeError::NotABranch { node: text })
        );
    }

    #[test]
    fn test_insert_and_remove_child() {
        let mut forest = Forest::new();
        let a = forest.create_element_named("a");
        let first = forest.create_text("1");
        let second = forest.create_text("2");
        forest.add_child(a, second).unwrap();
        forest.insert_child(a, 0, first).unwrap();
        assert_eq!(forest.content(a), &[first, second]);
        assert!(forest.remove_child(a, first));
        assert_eq!(forest.parent(first), None);
        assert!(!forest.remove_child(a, first));
    }

    #[test]
    fn test_attributes_replace_by_name() {
        let mut forest = Forest::new();
        let a = forest.create_element_named("a");
        let first = forest.add_attribute(a, QName::new("href"), "/one").unwrap();
        let again = forest.add_attribute(a, QName::new("href"), "/two").unwrap();
        assert_eq!(first, again);
        assert_eq!(forest.attribute_value(a, "", "href"), Some("/two"));
        assert_eq!(forest.attributes(a).len(), 1);

        let node = forest.create_attribute(QName::new("href"), "/three");
        forest.add_child(a, node).unwrap();
        assert_eq!(forest.attributes(a), &[node]);
        assert_eq!(forest.parent(first), None);

        assert!(forest.remove_attribute(a, "", "href"));
        assert!(forest.attributes(a).is_empty());
    }

    #[test]
    fn test_namespace_for_prefix_walks_ancestors() {
        let mut forest = Forest::new();
        let root = forest.create_element_named("root");
        forest.add_namespace(root, "p", "urn:p").unwrap();
        let child = forest.add_element(root, QName::new("child")).unwrap();
        assert_eq!(
            forest.namespace_for_prefix(child, "p"),
            Some(Namespace::new("p", "urn:p"))
        );
        assert_eq!(forest.namespace_for_prefix(child, "q"), None);
        assert_eq!(
            forest.namespace_for_prefix(child, ""),
            Some(Namespace::no_namespace())
        );
        assert_eq!(forest.namespace_for_prefix(child, "xml"), Some(Namespace::xml()));
    }

    #[test]
    fn test_namespace_node_shared_between_elements() {
        let mut forest = Forest::new();
        let a = forest.create_element_named("a");
        let b = forest.create_element_named("b");
        let ns_a = forest.add_namespace(a, "p", "urn:p").unwrap();
        let ns_b = forest.add_namespace(b, "p", "urn:p").unwrap();
        assert_eq!(ns_a, ns_b);
        assert_eq!(forest.parent(ns_a), None);
        forest.add_namespace(a, "p", "urn:p").unwrap();
        assert_eq!(forest.declared_namespaces(a).count(), 1);

        let text = forest.create_text("t");
        forest.add_child(a, text).unwrap();
        forest.insert_child(a, 0, ns_a).unwrap();
        assert_eq!(forest.declared_namespaces(a).count(), 1);
        assert_eq!(forest.content(a).len(), 2);
    }

    #[test]
    fn test_attach_prunes_redundant_declarations() {
        let mut forest = Forest::new();
        let parent = forest.create_element_named("parent");
        forest.add_namespace(parent, "p", "urn:p").unwrap();
        let child = forest.create_element(QName::with_namespace("item", Namespace::new("p", "urn:p")));
        forest.add_namespace(child, "p", "urn:p").unwrap();
        forest.add_namespace(child, "q", "urn:q").unwrap();

        forest.add_child(parent, child).unwrap();
        let declared: Vec<&str> = forest.declared_namespaces(child).map(Namespace::prefix).collect();
        assert_eq!(declared, vec!["q"]);
        assert_eq!(forest.qname(child).unwrap().qualified_name(), "p:item");
    }

    #[test]
    fn test_attach_keeps_conflicting_declaration() {
        let mut forest = Forest::new();
        let parent = forest.create_element_named("parent");
        forest.add_namespace(parent, "p", "urn:one").unwrap();
        let child = forest.create_element_named("child");
        forest.add_namespace(child, "p", "urn:two").unwrap();
        forest.add_child(parent, child).unwrap();
        assert_eq!(forest.declared_namespaces(child).count(), 1);
    }

    #[test]
    fn test_attach_demotes_prefix_bound_to_itself() {
        let mut forest = Forest::new();
        let parent = forest.create_element_named("parent");
        forest.add_namespace(parent, "x", "x").unwrap();
        let child = forest.create_element(QName::with_namespace("item", Namespace::new("x", "urn:x")));
        forest.add_child(parent, child).unwrap();
        let name = forest.qname(child).unwrap();
        assert_eq!(name.qualified_name(), "item");
        assert!(name.namespace().is_no_namespace());
    }

    #[test]
    fn test_user_data_propagates_to_new_children() {
        let mut forest = Forest::new();
        let root = forest.create_element_named("root");
        forest
            .set_user_data(root, Some(UserData::new("decoration".to_string())))
            .unwrap();
        let child = forest.add_element(root, QName::new("child")).unwrap();
        let grandchild = forest.add_element_named(child, "grandchild").unwrap();
        let original = forest.user_data(root).unwrap();
        assert!(forest.user_data(grandchild).unwrap().ptr_eq(original));
        assert_eq!(
            forest.user_data(child).unwrap().downcast_ref::<String>().map(String::as_str),
            Some("decoration")
        );
    }

    #[test]
    fn test_create_copy_variants() {
        let mut forest = Forest::new();
        let doc = forest
            .parse_str("<p:a xmlns:p=\"urn:p\" id=\"1\"><b>text</b></p:a>")
            .unwrap();
        let a = forest.root_element(doc).unwrap();
        forest.set_user_data(a, Some(UserData::new(7u8))).unwrap();

        let copy = forest.create_copy(a).unwrap();
        assert_ne!(copy, a);
        assert_eq!(forest.parent(copy), None);
        assert_eq!(forest.document(copy), None);
        assert_eq!(forest.string_value(copy), "text");
        assert_eq!(forest.attribute_value(copy, "", "id"), Some("1"));
        assert!(forest.user_data(copy).unwrap().ptr_eq(forest.user_data(a).unwrap()));

        let renamed = forest.create_copy_named(a, "p:other").unwrap();
        let name = forest.qname(renamed).unwrap();
        assert_eq!(name.namespace_uri(), "urn:p");
        assert_eq!(name.local_name(), "other");
        assert!(forest.user_data(renamed).is_some());

        let with_qname = forest.create_copy_with_qname(a, QName::new("plain")).unwrap();
        assert_eq!(forest.name(with_qname), Some("plain"));
        assert!(forest.user_data(with_qname).is_some());
    }

    #[test]
    fn test_lazy_storage_same_contract() {
        let mut forest = Forest::with_options(ForestOptions::default().storage(ContentStorage::Lazy));
        let a = forest.create_element_named("a");
        assert!(!forest.element_data(a).unwrap().content.is_materialized());
        let b = forest.add_element(a, QName::new("b")).unwrap();
        assert!(!forest.element_data(a).unwrap().content.is_materialized());
        let c = forest.add_element(a, QName::new("c")).unwrap();
        assert!(forest.element_data(a).unwrap().content.is_materialized());
        assert_eq!(forest.content(a), &[b, c]);
        assert!(forest.remove_child(a, b));
        assert_eq!(forest.content(a), &[c]);
    }

    #[test]
    fn test_eager_storage_allocates_up_front() {
        let mut forest = Forest::new();
        let a = forest.create_element_named("a");
        let data = forest.element_data(a).unwrap();
        assert!(data.content.is_materialized());
        assert!(data.attributes.is_materialized());
    }
}
