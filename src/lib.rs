//! # xmlnest
//!
//! Mutable XML document trees with explicit node ownership.
//!
//! A [`Document`] owns every node in an arena and hands out [`NodeId`]
//! handles. Each node is either `Detached` (a free-standing subtree waiting
//! to be attached) or `Attached` (linked under exactly one parent), and every
//! mutating call checks that state, so a node can never end up with two
//! owners and a destroyed node can never be reached through an old handle.
//! Free-standing [`Element`] values can be built without any document and
//! moved in later.
//!
//! ## Quick Start
//!
//! ```
//! use xmlnest::{Document, Element};
//! use xmlnest::serial::{render_to_string, SaveOptions};
//!
//! let mut doc = Document::new();
//! let root = doc.set_root_element(Element::new(None, "catalog").unwrap());
//!
//! for (id, fruit) in [("1", "Apple"), ("2", "Pear")] {
//!     let item = doc.create_element(None, "item").unwrap();
//!     doc.set_property(item, "id", id).unwrap();
//!     doc.set_content(item, fruit).unwrap();
//!     doc.append_child(root, item).unwrap();
//! }
//!
//! let items = doc.find_all_by_name(root, "item", true).unwrap();
//! assert_eq!(items.len(), 2);
//!
//! let xml = render_to_string(&doc, &SaveOptions::default());
//! assert_eq!(
//!     xml,
//!     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
//!      <catalog><item id=\"1\">Apple</item><item id=\"2\">Pear</item></catalog>\n"
//! );
//! ```

#[macro_use]
mod tracing_macros;

pub mod encoding;
pub mod error;
pub mod parser;
pub mod serial;
pub mod tree;
pub mod util;

// Re-export primary types at the crate root for convenience.
pub use error::{ErrorKind, ParseError, SaveError, TreeError};
pub use parser::ParseOptions;
pub use serial::SaveOptions;
pub use tree::{Document, Element, NodeId, NodeKind, NodeState};
