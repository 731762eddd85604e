//! Node type definitions.
//!
//! `NodeKind` carries the per-type payload of an arena node; navigation
//! links live in `NodeData`. `NodeState` is the ownership state every
//! mutating operation checks before it relinks anything.

use std::fmt;

use super::Attributes;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`, and it is the
    /// parent slot of the root element.
    Document,

    /// An element node, e.g., `<svg:rect width="3">`.
    Element {
        /// The element's local name (e.g., `"rect"`).
        name: String,
        /// Namespace prefix (e.g., `"svg"`), if any. Never resolved to a URI.
        prefix: Option<String>,
        /// Attributes in insertion order, stored unescaped.
        attributes: Attributes,
    },

    /// A text node, stored unescaped.
    Text {
        /// The character data.
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The section content (written verbatim).
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text without the delimiters.
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },
}

impl NodeKind {
    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}

/// Ownership state of an arena node.
///
/// A node moves between these two states only through
/// [`Document::append_child`](super::Document::append_child),
/// [`Document::set_root`](super::Document::set_root), and
/// [`Document::unlink`](super::Document::unlink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Not linked into any tree. The node heads a free-standing subtree
    /// owned by the document's arena until it is attached or removed.
    Detached,
    /// Linked into a tree: either some node's child or the document's root
    /// element. The tree owns it.
    Attached,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "detached"),
            Self::Attached => write!(f, "attached"),
        }
    }
}
