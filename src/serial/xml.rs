//! XML serializer.
//!
//! Renders a `Document` (or any subtree of it) back to XML text, then
//! optionally transcodes and writes it to disk.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::escape::{write_escaped_attr, write_escaped_text};
use crate::encoding::OutputEncoding;
use crate::error::SaveError;
use crate::tree::{Document, NodeId, NodeKind};

/// Options controlling XML serialization output.
///
/// The defaults produce a declaration line followed by the root element on
/// one line, encoded as the document's declared encoding (or UTF-8).
///
/// # Examples
///
/// ```
/// use xmlnest::Document;
/// use xmlnest::serial::{render_to_string, SaveOptions};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = render_to_string(&doc, &SaveOptions::default().format(true));
/// assert!(xml.contains("\n  <child>"));
/// ```
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Output encoding label. `None` means the document's declared encoding,
    /// falling back to UTF-8.
    pub encoding: Option<String>,
    /// Whether to insert newlines and indentation between elements.
    /// Defaults to `false`.
    pub format: bool,
    /// Whether to emit the XML declaration and the whole document, rather
    /// than just the root element. Defaults to `true`.
    pub declaration: bool,
    /// The indentation string used for each level when `format` is `true`.
    /// Defaults to two spaces.
    pub indent: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            format: false,
            declaration: true,
            indent: "  ".to_string(),
        }
    }
}

impl SaveOptions {
    /// Sets the output encoding label, such as `"ISO-8859-1"` or `"UTF-16"`.
    ///
    /// An empty label is the same as not setting one.
    #[must_use]
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = (!label.trim().is_empty()).then(|| label.to_string());
        self
    }

    /// Enables or disables pretty printing.
    ///
    /// Only element-only content is indented. An element with any
    /// non-whitespace text child is written exactly as stored, so formatting
    /// never changes text content.
    #[must_use]
    pub fn format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables the declaration line.
    #[must_use]
    pub fn declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent = s.to_string();
        self
    }

    fn resolve_encoding(&self, doc: &Document) -> Option<OutputEncoding> {
        match self.encoding.as_deref().or(doc.encoding.as_deref()) {
            Some(label) => OutputEncoding::for_label(label),
            None => Some(OutputEncoding::utf8()),
        }
    }
}

/// Renders a document to XML text.
///
/// With `declaration` on, the output is the declaration line followed by
/// every top-level node (prolog comments, the root element, epilogue), each
/// terminated by a newline. With it off, only the root element is written,
/// without a trailing newline.
///
/// Returns an empty string if the document has no root element, the
/// requested encoding label is unknown, or a name, comment or processing
/// instruction holds a character the encoding cannot represent. CDATA
/// sections are split around a character reference instead.
///
/// # Examples
///
/// ```
/// use xmlnest::{Document, Element};
/// use xmlnest::serial::{render_to_string, SaveOptions};
///
/// let mut doc = Document::new();
/// let mut note = Element::new(None, "note").unwrap();
/// note.set_content("a < b").unwrap();
/// doc.set_root_element(note);
///
/// assert_eq!(
///     render_to_string(&doc, &SaveOptions::default()),
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<note>a &lt; b</note>\n"
/// );
/// assert_eq!(
///     render_to_string(&doc, &SaveOptions::default().declaration(false)),
///     "<note>a &lt; b</note>"
/// );
/// ```
#[must_use]
pub fn render_to_string(doc: &Document, options: &SaveOptions) -> String {
    let Some(root) = doc.root_element() else {
        debug!("render skipped: no root element");
        return String::new();
    };
    let Some(encoding) = options.resolve_encoding(doc) else {
        debug!(encoding = ?options.encoding, "render skipped: unknown encoding");
        return String::new();
    };

    let mut writer = Writer {
        doc,
        out: String::new(),
        encoding: &encoding,
        options,
        unencodable: None,
    };

    if !options.declaration {
        writer.node(root, 0, false);
        return writer.finish();
    }

    let version = doc.version.as_deref().unwrap_or("1.0");
    writer.out.push_str("<?xml version=\"");
    writer.out.push_str(version);
    writer.out.push_str("\" encoding=\"");
    writer.out.push_str(encoding.label());
    writer.out.push('"');
    if let Some(standalone) = doc.standalone {
        writer.out.push_str(" standalone=\"");
        writer.out.push_str(if standalone { "yes" } else { "no" });
        writer.out.push('"');
    }
    writer.out.push_str("?>\n");

    for child in doc.children(doc.root()) {
        writer.node(child, 0, false);
        writer.out.push('\n');
    }
    writer.finish()
}

/// Renders a single node and its subtree, without a declaration.
///
/// Works on detached subtrees too. Returns an empty string for a stale
/// handle, the document node, an unknown encoding label, or markup the
/// encoding cannot represent.
#[must_use]
pub fn render_node(doc: &Document, id: NodeId, options: &SaveOptions) -> String {
    if id == doc.root() || !doc.contains(id) {
        return String::new();
    }
    let Some(encoding) = options.resolve_encoding(doc) else {
        return String::new();
    };
    let mut writer = Writer {
        doc,
        out: String::new(),
        encoding: &encoding,
        options,
        unencodable: None,
    };
    writer.node(id, 0, false);
    writer.finish()
}

/// Renders a document and transcodes it into the output encoding.
///
/// UTF-16 output starts with a byte order mark. Returns an empty vector
/// whenever [`render_to_string`] returns an empty string.
#[must_use]
pub fn render_to_bytes(doc: &Document, options: &SaveOptions) -> Vec<u8> {
    let text = render_to_string(doc, options);
    if text.is_empty() {
        return Vec::new();
    }
    match options.resolve_encoding(doc) {
        Some(encoding) => encoding.encode(&text),
        None => Vec::new(),
    }
}

/// Renders a document and writes it to `path`, creating or truncating the
/// file.
///
/// After writing, the file length on disk is compared with the number of
/// bytes produced; a mismatch is reported as [`SaveError::ShortWrite`].
///
/// # Errors
///
/// - [`SaveError::Empty`] if there is nothing to write
/// - [`SaveError::Io`] if the file cannot be created, written, or flushed
/// - [`SaveError::ShortWrite`] if fewer bytes reached the file than were produced
pub fn render_to_file(
    doc: &Document,
    path: impl AsRef<Path>,
    options: &SaveOptions,
) -> Result<(), SaveError> {
    let path = path.as_ref();
    let bytes = render_to_bytes(doc, options);
    if bytes.is_empty() {
        return Err(SaveError::Empty);
    }

    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.flush()?;
    file.sync_all()?;

    let expected = bytes.len() as u64;
    let actual = file.metadata()?.len();
    if actual != expected {
        return Err(SaveError::ShortWrite { expected, actual });
    }
    debug!(path = %path.display(), bytes = expected, "saved document");
    Ok(())
}

impl Document {
    /// Renders the document with default [`SaveOptions`].
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlnest::Document;
    ///
    /// let doc = Document::parse_str("<r a='1'/>").unwrap();
    /// assert_eq!(
    ///     doc.to_xml_string(),
    ///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r a=\"1\"/>\n"
    /// );
    /// ```
    #[must_use]
    pub fn to_xml_string(&self) -> String {
        render_to_string(self, &SaveOptions::default())
    }
}

struct Writer<'a> {
    doc: &'a Document,
    out: String,
    encoding: &'a OutputEncoding,
    options: &'a SaveOptions,
    /// First character of a name or verbatim payload that the output
    /// encoding cannot represent.
    unencodable: Option<char>,
}

impl Writer<'_> {
    fn finish(self) -> String {
        if self.unencodable.is_some() {
            debug!(
                ch = ?self.unencodable,
                encoding = self.encoding.label(),
                "render failed: unencodable markup"
            );
            return String::new();
        }
        self.out
    }

    /// Writes markup that has no escaped form, such as a name or comment
    /// body, and records the first character the encoding cannot hold.
    fn verbatim(&mut self, text: &str) {
        if self.unencodable.is_none() {
            self.unencodable = text.chars().find(|&ch| !self.encoding.can_encode(ch));
        }
        self.out.push_str(text);
    }

    /// Writes a CDATA section, closing and reopening it around characters
    /// the encoding cannot hold so they can be written as references.
    fn cdata(&mut self, content: &str) {
        if content.is_empty() {
            self.out.push_str("<![CDATA[]]>");
            return;
        }
        let mut open = false;
        for ch in content.chars() {
            if self.encoding.can_encode(ch) {
                if !open {
                    self.out.push_str("<![CDATA[");
                    open = true;
                }
                self.out.push(ch);
            } else {
                if open {
                    self.out.push_str("]]>");
                    open = false;
                }
                let _ = write!(self.out, "&#x{:X};", ch as u32);
            }
        }
        if open {
            self.out.push_str("]]>");
        }
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(&self.options.indent);
        }
    }

    fn qualified(&mut self, prefix: Option<&str>, name: &str) {
        if let Some(prefix) = prefix {
            self.verbatim(prefix);
            self.out.push(':');
        }
        self.verbatim(name);
    }

    /// Returns `true` if the element contains only other elements (and
    /// optional whitespace text), meaning it's safe to add indentation.
    fn is_element_only(&self, id: NodeId) -> bool {
        let mut has_element_child = false;
        for child in self.doc.children(id) {
            match self.doc.node(child).map(|n| &n.kind) {
                Some(NodeKind::Element { .. }) => has_element_child = true,
                Some(NodeKind::Text { content }) => {
                    if !content.trim().is_empty() {
                        return false;
                    }
                }
                Some(NodeKind::CData { .. }) => return false,
                _ => {}
            }
        }
        has_element_child
    }

    fn is_blank_text(&self, id: NodeId) -> bool {
        matches!(
            self.doc.node(id).map(|n| &n.kind),
            Some(NodeKind::Text { content }) if content.trim().is_empty()
        )
    }

    fn node(&mut self, id: NodeId, depth: usize, in_element_only: bool) {
        let Some(data) = self.doc.node(id) else {
            return;
        };
        let pretty = self.options.format && in_element_only;
        match &data.kind {
            NodeKind::Element {
                name,
                prefix,
                attributes,
            } => {
                if pretty {
                    self.indent(depth);
                }
                self.out.push('<');
                self.qualified(prefix.as_deref(), name);
                for (key, value) in attributes.iter() {
                    self.out.push(' ');
                    self.verbatim(key);
                    self.out.push_str("=\"");
                    write_escaped_attr(&mut self.out, value, self.encoding);
                    self.out.push('"');
                }

                if data.first_child.is_none() {
                    self.out.push_str("/>");
                } else {
                    self.out.push('>');
                    let element_only = self.options.format && self.is_element_only(id);
                    if element_only {
                        self.out.push('\n');
                    }
                    for child in self.doc.children(id) {
                        if element_only && self.is_blank_text(child) {
                            continue;
                        }
                        self.node(child, depth + 1, element_only);
                    }
                    if element_only {
                        self.indent(depth);
                    }
                    self.out.push_str("</");
                    self.qualified(prefix.as_deref(), name);
                    self.out.push('>');
                }
            }
            NodeKind::Text { content } => {
                write_escaped_text(&mut self.out, content, self.encoding);
                return;
            }
            NodeKind::CData { content } => {
                self.cdata(content);
                return;
            }
            NodeKind::Comment { content } => {
                if pretty {
                    self.indent(depth);
                }
                self.out.push_str("<!--");
                self.verbatim(content);
                self.out.push_str("-->");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                if pretty {
                    self.indent(depth);
                }
                self.out.push_str("<?");
                self.verbatim(target);
                if let Some(d) = data {
                    self.out.push(' ');
                    self.verbatim(d);
                }
                self.out.push_str("?>");
            }
            NodeKind::Document => return,
        }
        if pretty {
            self.out.push('\n');
        }
    }
}
