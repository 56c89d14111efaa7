//! Arena-based mutable XML tree.
//!
//! All nodes of any number of documents live in one [`Forest`] and are
//! referenced by [`NodeId`], a newtype over `NonZeroU32`. Content lists of
//! elements and documents are the owning edges. The `parent` and `document`
//! links stored on a node are plain indices used only to navigate upwards,
//! so there is no ownership cycle and dropping the `Forest` frees everything.
//!
//! # Node links
//!
//! - A node inside an element has `parent` set to that element.
//! - A top-level node of a document (the root element, comments and PIs
//!   beside it) has `document` set and no `parent`.
//! - Any other node resolves its document by walking up its parents.
//! - Detached nodes have neither link.
//!
//! Namespace declaration nodes are read-only flyweights interned per
//! (prefix, URI). They never record a parent and can appear in the content
//! of many elements at once.

mod builder;
mod clone;
mod content;
mod document;
mod element;
mod namespaces;
mod node;

pub use builder::TreeBuilder;
pub use content::ContentStorage;
pub use node::{node_type_name, DocumentData, ElementData, NodeKind, NodeType, UserData};

use std::collections::HashMap;
use std::num::NonZeroU32;

use content::Content;

use crate::error::{ParseError, TreeError};
use crate::parser::ParseOptions;
use crate::util::qname::{split_qname, Namespace, QName};

/// A typed index into the node arena.
///
/// `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }

    /// The raw, always non-zero, index.
    #[must_use]
    pub fn into_raw(self) -> u32 {
        self.0.get()
    }

    /// Creates a `NodeId` from a raw `u32`, if non-zero.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }
}

/// Storage for a single node in the arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) document: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            document: None,
        }
    }
}

/// Options fixed when a [`Forest`] is created.
///
/// ```
/// use oxfxml::tree::{ContentStorage, Forest, ForestOptions};
///
/// let forest = Forest::with_options(ForestOptions::default().storage(ContentStorage::Lazy));
/// assert_eq!(forest.options().storage, ContentStorage::Lazy);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ForestOptions {
    /// Storage strategy for element attribute and content lists.
    pub storage: ContentStorage,
}

impl ForestOptions {
    #[must_use]
    pub fn storage(mut self, storage: ContentStorage) -> Self {
        self.storage = storage;
        self
    }
}

/// An arena holding documents and detached nodes.
///
/// Navigation goes through `&Forest`, mutation through `&mut Forest`.
///
/// # Examples
///
/// ```
/// use oxfxml::tree::Forest;
/// use oxfxml::util::qname::QName;
///
/// let mut forest = Forest::new();
/// let doc = forest.create_document();
/// let root = forest.create_element(QName::new("html"));
/// forest.add_node(doc, root).unwrap();
/// let body = forest.add_element(root, QName::new("body")).unwrap();
///
/// assert_eq!(forest.root_element(doc), Some(root));
/// assert_eq!(forest.document(body), Some(doc));
/// assert_eq!(forest.path(body), "/html/body");
/// ```
#[derive(Debug)]
pub struct Forest {
    /// Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    options: ForestOptions,
    namespaces: HashMap<Namespace, NodeId>,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}

impl Forest {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ForestOptions::default())
    }

    #[must_use]
    pub fn with_options(options: ForestOptions) -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Text {
            content: String::new(),
        }));
        Self {
            nodes,
            options,
            namespaces: HashMap::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &ForestOptions {
        &self.options
    }

    /// Parses an XML string into a new document in this forest.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is not well-formed.
    pub fn parse_str(&mut self, input: &str) -> Result<NodeId, ParseError> {
        self.parse_str_with_options(input, &ParseOptions::default())
    }

    /// Parses an XML string with explicit options.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is not well-formed or the tree
    /// rejects the resulting structure.
    pub fn parse_str_with_options(
        &mut self,
        input: &str,
        options: &ParseOptions,
    ) -> Result<NodeId, ParseError> {
        let mut builder = TreeBuilder::new(self);
        crate::parser::parse_sax(input, options, &mut builder)?;
        builder
            .finish()
            .map_err(|err| ParseError::new(err.to_string(), Default::default()))
    }

    /// Parses raw bytes, detecting the encoding first.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` on undecodable or malformed input.
    pub fn parse_bytes(&mut self, input: &[u8]) -> Result<NodeId, ParseError> {
        let text = crate::encoding::decode_to_utf8(input)?;
        self.parse_str(&text)
    }

    // --- Access ---

    /// # Panics
    ///
    /// Panics if `id` does not refer to a node of this forest.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    #[must_use]
    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.kind(id).node_type()
    }

    #[must_use]
    pub fn node_type_name(&self, id: NodeId) -> &'static str {
        self.node_type(id).name()
    }

    #[must_use]
    pub fn is_read_only(&self, id: NodeId) -> bool {
        self.kind(id).is_read_only()
    }

    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    /// Total number of nodes allocated, attached or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    // --- Navigation ---

    /// The element this node is attached to.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The document owning this node, found through its parents.
    ///
    /// A document is its own document. Detached nodes have none.
    #[must_use]
    pub fn document(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let data = self.node(current);
            if matches!(data.kind, NodeKind::Document(_)) {
                return Some(current);
            }
            if data.document.is_some() {
                return data.document;
            }
            current = data.parent?;
        }
    }

    /// The root element of a document.
    #[must_use]
    pub fn root_element(&self, doc: NodeId) -> Option<NodeId> {
        self.kind(doc).as_document().and_then(DocumentData::root_element)
    }

    /// Content of an element or document. Other nodes have none.
    #[must_use]
    pub fn content(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::Element(data) => data.content.as_slice(),
            NodeKind::Document(data) => match (&data.content, &data.root_element) {
                (Some(list), _) => list,
                (None, Some(root)) => std::slice::from_ref(root),
                (None, None) => &[],
            },
            _ => &[],
        }
    }

    /// Returns an iterator over the content of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            inner: self.content(id).iter(),
        }
    }

    /// Iterates over the child elements of a node.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |&child| self.is_element(child))
    }

    /// Attribute nodes of an element, in document order.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::Element(data) => data.attributes.as_slice(),
            _ => &[],
        }
    }

    /// Returns an iterator over a node and its ancestor elements.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            forest: self,
            next: Some(id),
        }
    }

    /// Returns a depth-first iterator over the content below a node.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.content(id).to_vec();
        stack.reverse();
        Descendants {
            forest: self,
            stack,
        }
    }

    /// The node's name: qualified name for elements and attributes, target
    /// for processing instructions, prefix for namespaces.
    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element(data) => Some(data.name.qualified_name()),
            NodeKind::Attribute { name, .. } => Some(name.qualified_name()),
            NodeKind::ProcessingInstruction { target, .. } => Some(target),
            NodeKind::Namespace(ns) => Some(ns.prefix()),
            NodeKind::Document(data) => data.name(),
            NodeKind::Text { .. } | NodeKind::CData { .. } | NodeKind::Comment { .. } => None,
        }
    }

    /// The QName of an element or attribute.
    #[must_use]
    pub fn qname(&self, id: NodeId) -> Option<&QName> {
        match self.kind(id) {
            NodeKind::Element(data) => Some(&data.name),
            NodeKind::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Text of a leaf node: character data, attribute value, PI data or
    /// namespace URI.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content),
            NodeKind::Attribute { value, .. } => Some(value),
            NodeKind::ProcessingInstruction { data, .. } => Some(data),
            NodeKind::Namespace(ns) => Some(ns.uri()),
            NodeKind::Element(_) | NodeKind::Document(_) => None,
        }
    }

    /// The text of a node. For branches this is the concatenated direct
    /// text and CDATA children.
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        if let Some(text) = self.node_text(id) {
            return text.to_string();
        }
        self.children(id)
            .filter_map(|child| match self.kind(child) {
                NodeKind::Text { content } | NodeKind::CData { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All descendant character data, in document order.
    #[must_use]
    pub fn string_value(&self, id: NodeId) -> String {
        if !self.kind(id).is_branch() {
            return self.text(id);
        }
        self.descendants(id)
            .filter_map(|node| match self.kind(node) {
                NodeKind::Text { content } | NodeKind::CData { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// A slash-separated location path such as `/root/child/@id`.
    #[must_use]
    pub fn path(&self, id: NodeId) -> String {
        let step = match self.kind(id) {
            NodeKind::Document(_) => return "/".to_string(),
            NodeKind::Element(data) => data.name.qualified_name().to_string(),
            NodeKind::Attribute { name, .. } => format!("@{}", name.qualified_name()),
            NodeKind::Text { .. } | NodeKind::CData { .. } => "text()".to_string(),
            NodeKind::Comment { .. } => "comment()".to_string(),
            NodeKind::ProcessingInstruction { .. } => "processing-instruction()".to_string(),
            NodeKind::Namespace(ns) => format!("namespace::{}", ns.prefix()),
        };
        match self.parent(id) {
            Some(parent) => format!("{}/{step}", self.path(parent)),
            None if self.is_element(id) => format!("/{step}"),
            None => step,
        }
    }

    // --- Construction ---

    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    pub(crate) fn new_content(&self) -> Content {
        Content::new(self.options.storage)
    }

    /// Creates an empty, detached document.
    pub fn create_document(&mut self) -> NodeId {
        self.create_node(NodeKind::Document(DocumentData::default()))
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, name: QName) -> NodeId {
        let data = ElementData {
            name,
            attributes: self.new_content(),
            content: self.new_content(),
            user_data: None,
        };
        self.create_node(NodeKind::Element(data))
    }

    /// Creates a detached element from a qualified name. A prefix, if any,
    /// is kept but bound to no URI.
    pub fn create_element_named(&mut self, name: &str) -> NodeId {
        self.create_element(QName::from_parts("", name))
    }

    pub fn create_attribute(&mut self, name: QName, value: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::Attribute {
            name,
            value: value.into(),
        })
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::Text {
            content: content.into(),
        })
    }

    pub fn create_cdata(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::CData {
            content: content.into(),
        })
    }

    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::Comment {
            content: content.into(),
        })
    }

    pub fn create_processing_instruction(
        &mut self,
        target: impl Into<String>,
        data: impl Into<String>,
    ) -> NodeId {
        self.create_node(NodeKind::ProcessingInstruction {
            target: target.into(),
            data: data.into(),
        })
    }

    /// Returns the shared namespace node for this binding, creating it on
    /// first use.
    pub fn namespace(&mut self, prefix: &str, uri: &str) -> NodeId {
        let key = Namespace::new(prefix, uri);
        if let Some(&id) = self.namespaces.get(&key) {
            return id;
        }
        let id = self.create_node(NodeKind::Namespace(key.clone()));
        self.namespaces.insert(key, id);
        id
    }

    // --- Node mutators ---

    /// Renames a node.
    ///
    /// Element and attribute names are resolved against the namespaces in
    /// scope at the node; an unbound prefix keeps an empty URI.
    ///
    /// # Errors
    ///
    /// `ReadOnly` for namespace nodes, `Unsupported` for nodes without a
    /// name.
    pub fn set_name(&mut self, id: NodeId, name: &str) -> Result<(), TreeError> {
        if self.is_read_only(id) {
            return Err(TreeError::ReadOnly { node: id });
        }
        let (prefix, _) = split_qname(name);
        match self.node_type(id) {
            NodeType::Element => {
                let qname = self.resolve_qname(id, name);
                if let Some(data) = self.node_mut(id).kind.as_element_mut() {
                    data.name = qname;
                }
            }
            NodeType::Attribute => {
                let uri = match (prefix, self.parent(id)) {
                    (Some(prefix), Some(owner)) => self
                        .namespace_for_prefix(owner, prefix)
                        .map(|ns| ns.uri().to_string())
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                let qname = QName::from_parts(&uri, name);
                if let NodeKind::Attribute { name, .. } = &mut self.node_mut(id).kind {
                    *name = qname;
                }
            }
            NodeType::ProcessingInstruction => {
                if let NodeKind::ProcessingInstruction { target, .. } = &mut self.node_mut(id).kind
                {
                    *target = name.to_string();
                }
            }
            NodeType::Document => {
                if let Some(data) = self.node_mut(id).kind.as_document_mut() {
                    data.name = Some(name.to_string());
                }
            }
            _ => {
                return Err(TreeError::Unsupported {
                    node: id,
                    operation: "set_name",
                })
            }
        }
        Ok(())
    }

    /// Replaces the text of a node.
    ///
    /// On an element, existing text and CDATA children are removed and a
    /// single text node holding `text` is appended.
    ///
    /// # Errors
    ///
    /// `ReadOnly` for namespace nodes, `Unsupported` for documents.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), TreeError> {
        if self.is_read_only(id) {
            return Err(TreeError::ReadOnly { node: id });
        }
        if self.is_element(id) {
            let old: Vec<NodeId> = self
                .children(id)
                .filter(|&child| {
                    matches!(self.kind(child), NodeKind::Text { .. } | NodeKind::CData { .. })
                })
                .collect();
            for child in old {
                self.remove_child(id, child);
            }
            if !text.is_empty() {
                let node = self.create_text(text);
                self.add_child(id, node)?;
            }
            return Ok(());
        }
        match &mut self.node_mut(id).kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => *content = text.to_string(),
            NodeKind::Attribute { value, .. } => *value = text.to_string(),
            NodeKind::ProcessingInstruction { data, .. } => *data = text.to_string(),
            NodeKind::Element(_) | NodeKind::Document(_) | NodeKind::Namespace(_) => {
                return Err(TreeError::Unsupported {
                    node: id,
                    operation: "set_text",
                })
            }
        }
        Ok(())
    }
}

// --- Iterators ---

/// Iterator over the content of a node.
pub struct Children<'a> {
    inner: std::slice::Iter<'a, NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().copied()
    }
}

impl ExactSizeIterator for Children<'_> {}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    forest: &'a Forest,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.forest.parent(current);
        Some(current)
    }
}

/// Depth-first iterator over all content below a node.
pub struct Descendants<'a> {
    forest: &'a Forest,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.forest.content(current).iter().rev().copied());
        Some(current)
    }
}
