//! Child and attribute storage for elements.
//!
//! Lazy storage keeps a single child inline and only allocates a list when a
//! second child arrives or a positional edit is made. Eager storage always
//! holds a list. Reads never change the representation, so a tree can be
//! traversed through `&Forest` from several threads in either mode.

use super::NodeId;

/// How element attribute and content lists are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentStorage {
    /// Start empty, keep one node inline, allocate on demand.
    Lazy,
    /// Allocate both lists when the element is created.
    #[default]
    Eager,
}

#[derive(Debug, Clone)]
pub(crate) enum Content {
    Empty,
    Single(NodeId),
    List(Vec<NodeId>),
}

impl Content {
    pub(crate) fn new(storage: ContentStorage) -> Self {
        match storage {
            ContentStorage::Lazy => Self::Empty,
            ContentStorage::Eager => Self::List(Vec::new()),
        }
    }

    pub(crate) fn as_slice(&self) -> &[NodeId] {
        match self {
            Self::Empty => &[],
            Self::Single(id) => std::slice::from_ref(id),
            Self::List(list) => list,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.as_slice().contains(&id)
    }

    pub(crate) fn is_materialized(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Materializes the list representation.
    pub(crate) fn list_mut(&mut self) -> &mut Vec<NodeId> {
        if !self.is_materialized() {
            let list = self.as_slice().to_vec();
            *self = Self::List(list);
        }
        match self {
            Self::List(list) => list,
            Self::Empty | Self::Single(_) => unreachable!("content list was just materialized"),
        }
    }

    pub(crate) fn push(&mut self, id: NodeId) {
        match self {
            Self::Empty => *self = Self::Single(id),
            Self::Single(_) => self.list_mut().push(id),
            Self::List(list) => list.push(id),
        }
    }

    pub(crate) fn insert(&mut self, index: usize, id: NodeId) {
        self.list_mut().insert(index, id);
    }

    /// Removes the first occurrence of `id`.
    pub(crate) fn remove(&mut self, id: NodeId) -> bool {
        match self {
            Self::Empty => false,
            Self::Single(only) if *only == id => {
                *self = Self::Empty;
                true
            }
            Self::Single(_) => false,
            Self::List(list) => match list.iter().position(|&c| c == id) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            },
        }
    }

    pub(crate) fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        match self {
            Self::Single(only) if *only == old => {
                *only = new;
                true
            }
            Self::List(list) => match list.iter_mut().find(|c| **c == old) {
                Some(slot) => {
                    *slot = new;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Empties the content, keeping an allocated list allocated.
    pub(crate) fn clear(&mut self) {
        match self {
            Self::List(list) => list.clear(),
            _ => *self = Self::Empty,
        }
    }
}
