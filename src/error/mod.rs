//! Error types.
//!
//! Parsing failures carry a [`SourceLocation`] with line, column and byte
//! offset. Tree mutations that would break a structural invariant return a
//! [`TreeError`] naming the nodes involved; these are programming errors on
//! the caller's side and are never retried.

use std::fmt;

use crate::encoding::EncodingError;
use crate::tree::NodeId;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// Computes the line and column of `byte_offset` within `input`.
    ///
    /// Offsets past the end of the input are clamped to the end.
    #[must_use]
    pub fn at(input: &str, byte_offset: usize) -> Self {
        let mut end = byte_offset.min(input.len());
        while !input.is_char_boundary(end) {
            end -= 1;
        }
        let mut line = 1u32;
        let mut column = 1u32;
        for ch in input[..end].chars() {
            if ch == '\n' {
                line = line.saturating_add(1);
                column = 1;
            } else {
                column = column.saturating_add(1);
            }
        }
        Self {
            line,
            column,
            byte_offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error type returned when XML parsing fails.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred.
    pub location: SourceLocation,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<EncodingError> for ParseError {
    fn from(err: EncodingError) -> Self {
        Self::new(err.to_string(), SourceLocation::default())
    }
}

/// A violation of the tree's structural contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// `node` cannot be added to `target` (an element or a document).
    IllegalAdd {
        node: NodeId,
        target: NodeId,
        reason: String,
    },
    /// A mutator was called on a read-only node.
    ReadOnly { node: NodeId },
    /// The operation is not defined for this kind of node.
    Unsupported {
        node: NodeId,
        operation: &'static str,
    },
    /// The node has no content list (it is neither an element nor a document).
    NotABranch { node: NodeId },
    /// A content index past the end of the list.
    IndexOutOfBounds { index: usize, len: usize },
}

impl TreeError {
    pub(crate) fn illegal_add(node: NodeId, target: NodeId, reason: impl Into<String>) -> Self {
        Self::IllegalAdd {
            node,
            target,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalAdd {
                node,
                target,
                reason,
            } => write!(
                f,
                "cannot add node {} to node {}: {reason}",
                node.into_raw(),
                target.into_raw()
            ),
            Self::ReadOnly { node } => write!(f, "node {} is read-only", node.into_raw()),
            Self::Unsupported { node, operation } => {
                write!(f, "node {} does not support {operation}", node.into_raw())
            }
            Self::NotABranch { node } => write!(f, "node {} cannot have content", node.into_raw()),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for content of length {len}")
            }
        }
    }
}

impl std::error::Error for TreeError {}
