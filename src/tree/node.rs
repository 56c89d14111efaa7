//! Node type definitions.
//!
//! `NodeKind` is the closed set of node variants. Per-variant capabilities
//! (node type code, read-only, whether a parent link is kept) are answered
//! by methods on the enum instead of a class hierarchy.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::content::Content;
use super::NodeId;
use crate::util::qname::{Namespace, QName};

/// Numeric node type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    CData = 4,
    EntityReference = 5,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    Namespace = 13,
    Unknown = 14,
}

const NODE_TYPE_NAMES: [&str; 15] = [
    "Node",
    "Element",
    "Attribute",
    "Text",
    "CDATA",
    "Entity",
    "Entity",
    "ProcessingInstruction",
    "Comment",
    "Document",
    "DocumentType",
    "DocumentFragment",
    "Notation",
    "Namespace",
    "Unknown",
];

impl NodeType {
    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        node_type_name(self.code())
    }
}

/// Returns the display name for a node type code.
///
/// Codes outside the known table map to `"Unknown"`.
///
/// ```
/// use oxfxml::tree::node_type_name;
///
/// assert_eq!(node_type_name(1), "Element");
/// assert_eq!(node_type_name(13), "Namespace");
/// assert_eq!(node_type_name(99), "Unknown");
/// ```
#[must_use]
pub fn node_type_name(code: u16) -> &'static str {
    NODE_TYPE_NAMES
        .get(usize::from(code))
        .copied()
        .unwrap_or("Unknown")
}

/// Opaque payload attached to elements.
///
/// Copies share the same value: propagation to cloned or newly created
/// elements is shallow.
#[derive(Clone)]
pub struct UserData(Arc<dyn Any + Send + Sync>);

impl UserData {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Returns `true` when both handles point at the same payload.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserData(..)")
    }
}

/// Payload of an element node.
#[derive(Debug, Clone)]
pub struct ElementData {
    pub(crate) name: QName,
    pub(crate) attributes: Content,
    pub(crate) content: Content,
    pub(crate) user_data: Option<UserData>,
}

impl ElementData {
    #[must_use]
    pub fn name(&self) -> &QName {
        &self.name
    }

    #[must_use]
    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }
}

/// Payload of a document node.
///
/// The content list is created on first mutable access; until then the
/// root element, if any, is the only child.
#[derive(Debug, Clone, Default)]
pub struct DocumentData {
    pub(crate) name: Option<String>,
    pub(crate) root_element: Option<NodeId>,
    pub(crate) content: Option<Vec<NodeId>>,
}

impl DocumentData {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.root_element
    }

    /// Returns `true` once the content list has been allocated.
    #[must_use]
    pub fn has_content_list(&self) -> bool {
        self.content.is_some()
    }
}

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Document(DocumentData),
    Element(ElementData),
    Attribute {
        name: QName,
        value: String,
    },
    Text {
        content: String,
    },
    CData {
        content: String,
    },
    Comment {
        content: String,
    },
    ProcessingInstruction {
        target: String,
        data: String,
    },
    /// A namespace declaration. These are shared flyweights.
    Namespace(Namespace),
}

impl NodeKind {
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Document(_) => NodeType::Document,
            Self::Element(_) => NodeType::Element,
            Self::Attribute { .. } => NodeType::Attribute,
            Self::Text { .. } => NodeType::Text,
            Self::CData { .. } => NodeType::CData,
            Self::Comment { .. } => NodeType::Comment,
            Self::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            Self::Namespace(_) => NodeType::Namespace,
        }
    }

    /// Read-only nodes reject mutators and are returned as-is by clone.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Namespace(_))
    }

    /// Whether the node records the element it is attached to.
    #[must_use]
    pub fn supports_parent(&self) -> bool {
        !matches!(self, Self::Document(_) | Self::Namespace(_))
    }

    /// Elements and documents own a content list.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Document(_) | Self::Element(_))
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&ElementData> {
        match self {
            Self::Element(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&DocumentData> {
        match self {
            Self::Document(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Self::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            Self::Element(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_document_mut(&mut self) -> Option<&mut DocumentData> {
        match self {
            Self::Document(data) => Some(data),
            _ => None,
        }
    }
}
