//! Error types for tree mutation, parsing, and saving.
//!
//! Lookups that find nothing are not errors: they return `Option::None` or an
//! empty `Vec`. Everything here describes an operation that was refused, and
//! a refused operation never leaves the tree partially modified.

use std::fmt;
use std::io;

use crate::tree::NodeId;

/// The broad category of a [`TreeError`].
///
/// Useful when callers only care whether they passed a bad argument or tried
/// an illegal ownership transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An empty or malformed name, or a handle that does not refer to a live node.
    InvalidArgument,
    /// The node is already linked into a tree.
    AlreadyAttached,
    /// Text could not be represented in XML.
    EscapeFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::AlreadyAttached => write!(f, "already attached"),
            Self::EscapeFailure => write!(f, "escape failure"),
        }
    }
}

/// Text that cannot be written into an XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscapeError {
    /// The input bytes are not valid UTF-8.
    MalformedUtf8 {
        /// Byte offset of the first invalid sequence.
        valid_up_to: usize,
    },
    /// The input contains a character outside the XML 1.0 `Char` production.
    ForbiddenChar {
        /// The offending character.
        ch: char,
        /// Byte offset of the character in the input.
        offset: usize,
    },
    /// The input contains the closing delimiter of the comment, CDATA
    /// section or processing instruction it is meant to be stored in.
    Terminator {
        /// The offending sequence, such as `--` or `]]>`.
        sequence: &'static str,
        /// Byte offset of the sequence in the input.
        offset: usize,
    },
}

impl fmt::Display for EscapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedUtf8 { valid_up_to } => {
                write!(f, "malformed UTF-8 after byte {valid_up_to}")
            }
            Self::ForbiddenChar { ch, offset } => write!(
                f,
                "character U+{:04X} at byte {offset} is not allowed in XML",
                *ch as u32
            ),
            Self::Terminator { sequence, offset } => {
                write!(f, "'{sequence}' at byte {offset} would close the enclosing markup")
            }
        }
    }
}

impl std::error::Error for EscapeError {}

/// The error type returned by tree construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A name or key was empty.
    EmptyName,
    /// A name or key is not a valid XML name.
    InvalidName(String),
    /// The handle refers to a destroyed node or to another document.
    UnknownNode(NodeId),
    /// The operation needs an element node.
    NotAnElement(NodeId),
    /// The operation is not permitted on the document node itself.
    DocumentNode,
    /// The node already has a parent slot; detach it first.
    AlreadyAttached(NodeId),
    /// Attaching the node would make it its own ancestor.
    CycleDetected {
        /// The would-be parent.
        parent: NodeId,
        /// The node being attached.
        child: NodeId,
    },
    /// Text content or an attribute value cannot be stored.
    Escape(EscapeError),
}

impl TreeError {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyAttached(_) => ErrorKind::AlreadyAttached,
            Self::Escape(_) => ErrorKind::EscapeFailure,
            Self::EmptyName
            | Self::InvalidName(_)
            | Self::UnknownNode(_)
            | Self::NotAnElement(_)
            | Self::DocumentNode
            | Self::CycleDetected { .. } => ErrorKind::InvalidArgument,
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::InvalidName(name) => write!(f, "'{name}' is not a valid XML name"),
            Self::UnknownNode(id) => write!(f, "{id} does not refer to a live node"),
            Self::NotAnElement(id) => write!(f, "{id} is not an element"),
            Self::DocumentNode => write!(f, "operation not permitted on the document node"),
            Self::AlreadyAttached(id) => {
                write!(f, "{id} is already attached; detach it first")
            }
            Self::CycleDetected { parent, child } => {
                write!(f, "cannot attach {child} beneath its own descendant {parent}")
            }
            Self::Escape(e) => write!(f, "escape failure: {e}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Escape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EscapeError> for TreeError {
    fn from(e: EscapeError) -> Self {
        Self::Escape(e)
    }
}

/// The error type returned when XML input cannot be turned into a `Document`.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Byte offset into the (UTF-8) input where the error was detected, if known.
    pub position: Option<u64>,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    pub(crate) fn at(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position: Some(position),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "parse error at byte {pos}: {}", self.message),
            None => write!(f, "parse error: {}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// The error type returned by [`render_to_file`](crate::serial::render_to_file).
#[derive(Debug)]
pub enum SaveError {
    /// There was nothing to write: the document has no root element or the
    /// requested encoding is unknown.
    Empty,
    /// The target could not be created, written, or flushed.
    Io(io::Error),
    /// The file on disk is shorter than the serialized output.
    ShortWrite {
        /// Number of bytes produced by the serializer.
        expected: u64,
        /// Number of bytes found on disk after writing.
        actual: u64,
    },
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "nothing to save"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ShortWrite { expected, actual } => {
                write!(f, "short write: {actual} of {expected} bytes on disk")
            }
        }
    }
}

impl std::error::Error for SaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SaveError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
