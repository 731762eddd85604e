//! Tree builder over the `quick-xml` pull reader.

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

use super::ParseOptions;
use crate::error::ParseError;
use crate::serial::escape::check_text;
use crate::tree::{Attributes, Document, NodeId, NodeKind};
use crate::util::qname::{check_name, check_ncname, split_qname};

pub(crate) struct XmlParser<'a> {
    reader: Reader<&'a [u8]>,
    options: &'a ParseOptions,
    doc: Document,
    /// Open elements, innermost last.
    stack: Vec<NodeId>,
    /// Character data not yet flushed into a text node. Entity references
    /// arrive as separate events, so adjacent pieces are joined here.
    text: String,
    seen_root: bool,
}

impl<'a> XmlParser<'a> {
    pub(crate) fn new(input: &'a str, options: &'a ParseOptions) -> Self {
        trace!(input_len = input.len(), "creating XML parser");

        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);

        Self {
            reader,
            options,
            doc: Document::new(),
            stack: Vec::new(),
            text: String::new(),
            seen_root: false,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Document, ParseError> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| self.error(e.to_string()))?;
            match event {
                Event::Start(e) => {
                    self.flush_text()?;
                    self.start_element(&e)?;
                }
                Event::Empty(e) => {
                    self.flush_text()?;
                    self.start_element(&e)?;
                    self.stack.pop();
                }
                Event::End(_) => {
                    self.flush_text()?;
                    self.stack.pop();
                }
                Event::Text(e) => {
                    let text = e.decode().map_err(|err| self.error(err.to_string()))?;
                    self.text.push_str(&text);
                }
                Event::GeneralRef(e) => {
                    let raw = e.decode().map_err(|err| self.error(err.to_string()))?;
                    let resolved = self.resolve_entity(&raw)?;
                    self.text.push_str(&resolved);
                }
                Event::CData(e) => {
                    self.flush_text()?;
                    let content = self.utf8(e.as_ref())?;
                    let Some(&parent) = self.stack.last() else {
                        return Err(self.error("CDATA section outside the root element"));
                    };
                    self.checked(&content)?;
                    self.doc.append_parsed(parent, NodeKind::CData { content });
                }
                Event::Comment(e) => {
                    self.flush_text()?;
                    let content = self.utf8(e.as_ref())?;
                    self.checked(&content)?;
                    let parent = self.current_parent();
                    self.doc.append_parsed(parent, NodeKind::Comment { content });
                }
                Event::PI(e) => {
                    self.flush_text()?;
                    let content = self.utf8(e.as_ref())?;
                    let (target, data) = content
                        .split_once(char::is_whitespace)
                        .unwrap_or((content.as_str(), ""));
                    let data = data.trim();
                    self.checked(data)?;
                    let kind = NodeKind::ProcessingInstruction {
                        target: target.to_string(),
                        data: (!data.is_empty()).then(|| data.to_string()),
                    };
                    let parent = self.current_parent();
                    self.doc.append_parsed(parent, kind);
                }
                Event::Decl(e) => self.declaration(&e)?,
                Event::DocType(_) => {
                    // Internal subsets are not interpreted.
                }
                Event::Eof => break,
            }
        }

        self.flush_text()?;
        if !self.stack.is_empty() {
            return Err(self.error("unexpected end of input: unclosed element"));
        }
        if !self.seen_root {
            return Err(self.error("document has no root element"));
        }
        debug!(nodes = self.doc.node_count(), "parsed document");
        Ok(self.doc)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(message, self.reader.buffer_position())
    }

    fn utf8(&self, bytes: &[u8]) -> Result<String, ParseError> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| self.error(e.to_string()))
    }

    fn checked(&self, text: &str) -> Result<(), ParseError> {
        check_text(text).map_err(|e| self.error(e.to_string()))
    }

    fn current_parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.doc.root())
    }

    fn start_element(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        if self.stack.len() >= self.options.max_depth as usize {
            return Err(self.error(format!(
                "maximum nesting depth {} exceeded",
                self.options.max_depth
            )));
        }

        let qname = self.utf8(e.name().as_ref())?;
        let (prefix, local) = split_qname(&qname);
        check_ncname(local).map_err(|err| self.error(err.to_string()))?;
        if let Some(prefix) = prefix {
            check_ncname(prefix).map_err(|err| self.error(err.to_string()))?;
        }

        let mut attributes = Attributes::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.error(err.to_string()))?;
            let key = self.utf8(attr.key.as_ref())?;
            check_name(&key).map_err(|err| self.error(err.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|err| self.error(err.to_string()))?;
            self.checked(&value)?;
            attributes.insert_unchecked(key, value.into_owned());
        }

        let parent = if let Some(&parent) = self.stack.last() {
            parent
        } else {
            if self.seen_root {
                return Err(self.error("content after the root element"));
            }
            self.seen_root = true;
            self.doc.root()
        };

        let id = self.doc.append_parsed(
            parent,
            NodeKind::Element {
                name: local.to_string(),
                prefix: prefix.map(str::to_string),
                attributes,
            },
        );
        self.stack.push(id);
        Ok(())
    }

    fn flush_text(&mut self) -> Result<(), ParseError> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        let blank = text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
        let Some(&parent) = self.stack.last() else {
            if blank {
                return Ok(());
            }
            return Err(self.error("text outside the root element"));
        };
        if blank && self.options.no_blanks {
            return Ok(());
        }
        self.checked(&text)?;
        self.doc.append_parsed(parent, NodeKind::Text { content: text });
        Ok(())
    }

    fn declaration(&mut self, decl: &BytesDecl<'_>) -> Result<(), ParseError> {
        let version = decl.version().map_err(|e| self.error(e.to_string()))?;
        self.doc.version = Some(self.utf8(&version)?);
        if let Some(encoding) = decl.encoding() {
            let encoding = encoding.map_err(|e| self.error(e.to_string()))?;
            self.doc.encoding = Some(self.utf8(&encoding)?);
        }
        if let Some(standalone) = decl.standalone() {
            let standalone = standalone.map_err(|e| self.error(e.to_string()))?;
            self.doc.standalone = Some(standalone.as_ref() == b"yes");
        }
        Ok(())
    }

    /// Resolves a predefined entity or a character reference.
    fn resolve_entity(&self, raw: &str) -> Result<String, ParseError> {
        if let Some(resolved) = resolve_xml_entity(raw) {
            return Ok(resolved.into());
        }

        let Some(rest) = raw.strip_prefix('#') else {
            return Err(self.error(format!("undefined entity &{raw};")));
        };
        let code = if let Some(hex) = rest.strip_prefix('x') {
            u32::from_str_radix(hex, 16)
        } else {
            rest.parse::<u32>()
        }
        .map_err(|_| self.error(format!("invalid character reference &{raw};")))?;

        let ch = char::from_u32(code)
            .ok_or_else(|| self.error(format!("invalid character reference &{raw};")))?;
        let mut buf = [0u8; 4];
        let s: &str = ch.encode_utf8(&mut buf);
        self.checked(s)?;
        Ok(s.to_string())
    }
}
