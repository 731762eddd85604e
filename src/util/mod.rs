//! Small helpers shared by the tree and the parser.

pub mod qname;
