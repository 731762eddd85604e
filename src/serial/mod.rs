//! XML serialization.
//!
//! This module renders a `Document` tree back to XML text. Text and
//! attribute values are escaped on the way out, so whatever was stored
//! through the tree API re-parses to the same value.

pub mod escape;
mod xml;

pub use xml::{render_node, render_to_bytes, render_to_file, render_to_string, SaveOptions};
