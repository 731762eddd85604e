//! XML input.
//!
//! Builds an already-linked `Document` from text, bytes, or a file. The
//! tokenizing is done by `quick-xml`; this module turns its event stream into
//! arena nodes and applies the same character checks the tree API applies,
//! so a parsed document never holds text the serializer cannot write back.
//!
//! DTDs are skipped. Only the five predefined entities and character
//! references are expanded.

mod xml;

use std::path::Path;

use crate::encoding::decode_to_utf8;
use crate::error::ParseError;
use crate::tree::Document;

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Parse options.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use xmlnest::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .encoding("ISO-8859-1")
///     .no_blanks(true)
///     .max_depth(128);
/// ```
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Encoding label that overrides BOM and declaration sniffing for byte
    /// input. Ignored by [`parse_str`].
    pub encoding: Option<String>,
    /// If true, drop whitespace-only text nodes.
    pub no_blanks: bool,
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            no_blanks: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Forces the input encoding for byte and file input.
    #[must_use]
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }

    /// Enables or disables stripping of blank text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Document, ParseError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses an XML string with the given options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML, nests deeper
/// than `options.max_depth`, or contains characters not allowed in XML.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    xml::XmlParser::new(input, options).parse()
}

/// Parses raw XML bytes, detecting their encoding.
///
/// # Errors
///
/// Returns `ParseError` if the bytes cannot be decoded or do not form a
/// well-formed document.
///
/// # Examples
///
/// ```
/// use xmlnest::parser::{parse_bytes, ParseOptions};
///
/// let input = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><p>caf\xE9</p>";
/// let doc = parse_bytes(input, &ParseOptions::default()).unwrap();
/// let p = doc.root_element().unwrap();
/// assert_eq!(doc.content(p).as_deref(), Some("caf\u{E9}"));
/// assert_eq!(doc.encoding.as_deref(), Some("ISO-8859-1"));
/// ```
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    let text = decode_to_utf8(bytes, options.encoding.as_deref())
        .map_err(|e| ParseError::new(e.to_string()))?;
    parse_str_with_options(&text, options)
}

/// Reads and parses an XML file.
///
/// # Errors
///
/// Returns `ParseError` if the file cannot be read or parsed.
pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Document, ParseError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| ParseError::new(format!("cannot read {}: {e}", path.display())))?;
    debug!(path = %path.display(), len = bytes.len(), "parsing file");
    parse_bytes(&bytes, options)
}
