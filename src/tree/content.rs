//! Text payload of nodes.

use super::{Document, NodeId, NodeKind};
use crate::error::TreeError;
use crate::serial::escape::{check_bytes, check_cdata, check_comment, check_pi_data, check_text};

impl Document {
    /// Returns the text content of a node.
    ///
    /// For elements this is the concatenation of all text and CDATA
    /// descendants in document order. For text, CDATA, comment, and PI nodes
    /// it is the node's own payload. `None` means the node has no text at
    /// all (or the handle is stale).
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlnest::Document;
    ///
    /// let doc = Document::parse_str("<p>Hello <b>world</b></p>").unwrap();
    /// let p = doc.root_element().unwrap();
    /// assert_eq!(doc.content(p).as_deref(), Some("Hello world"));
    /// ```
    #[must_use]
    pub fn content(&self, id: NodeId) -> Option<String> {
        match &self.node(id)?.kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content.clone()),
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
            NodeKind::Element { .. } | NodeKind::Document => {
                let mut buf = String::new();
                let mut found = false;
                for desc in self.descendants(id) {
                    if let NodeKind::Text { content } | NodeKind::CData { content } =
                        &self.data(desc).kind
                    {
                        buf.push_str(content);
                        found = true;
                    }
                }
                found.then_some(buf)
            }
        }
    }

    /// Returns the text of a text-like node without copying.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Replaces the text content of a node.
    ///
    /// On an element, every existing child is released (their handles become
    /// stale) and a single text node holding `text` is appended; an empty
    /// `text` leaves the element empty. On a text-like node the payload is
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] if `text` cannot appear in XML or, on
    /// a comment, CDATA section or PI, would close it early (`--`, `]]>`,
    /// `?>`). Returns [`TreeError::UnknownNode`] for a stale handle and
    /// [`TreeError::DocumentNode`] for the document node. The node is
    /// unchanged on failure.
    pub fn set_content(&mut self, id: NodeId, text: &str) -> Result<(), TreeError> {
        check_text(text)?;
        if id == self.root {
            return Err(TreeError::DocumentNode);
        }
        match &self.check(id)?.kind {
            NodeKind::Comment { .. } => check_comment(text)?,
            NodeKind::CData { .. } => check_cdata(text)?,
            NodeKind::ProcessingInstruction { .. } => check_pi_data(text)?,
            _ => {}
        }
        if self.data(id).kind.is_element() {
            let mut child = self.data(id).first_child;
            while let Some(c) = child {
                child = self.data(c).next_sibling;
                self.unlink_links(c);
                self.release(c);
            }
            if !text.is_empty() {
                let text_id = self.alloc(NodeKind::Text {
                    content: text.to_string(),
                });
                self.link_last(id, text_id);
            }
        } else {
            match &mut self.data_mut(id)?.kind {
                NodeKind::Text { content }
                | NodeKind::CData { content }
                | NodeKind::Comment { content } => *content = text.to_string(),
                NodeKind::ProcessingInstruction { data, .. } => {
                    *data = (!text.is_empty()).then(|| text.to_string());
                }
                NodeKind::Element { .. } | NodeKind::Document => {}
            }
        }
        trace!(?id, len = text.len(), "set content");
        Ok(())
    }

    /// Like [`set_content`](Self::set_content), for raw bytes that must be
    /// valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] for malformed UTF-8, otherwise as
    /// [`set_content`](Self::set_content).
    pub fn set_content_bytes(&mut self, id: NodeId, bytes: &[u8]) -> Result<(), TreeError> {
        let text = check_bytes(bytes)?;
        self.set_content(id, text)
    }

    /// Appends a text node after the existing children of an element.
    ///
    /// Returns the new text node, or `None` if `text` is empty.
    ///
    /// # Errors
    ///
    /// [`TreeError::Escape`], [`TreeError::UnknownNode`], or
    /// [`TreeError::NotAnElement`].
    pub fn append_content(&mut self, id: NodeId, text: &str) -> Result<Option<NodeId>, TreeError> {
        check_text(text)?;
        if !self.check(id)?.kind.is_element() {
            return Err(TreeError::NotAnElement(id));
        }
        if text.is_empty() {
            return Ok(None);
        }
        let text_id = self.alloc(NodeKind::Text {
            content: text.to_string(),
        });
        self.link_last(id, text_id);
        Ok(Some(text_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{EscapeError, TreeError};
    use crate::tree::{Document, Element, NodeId};

    fn doc_with_root() -> (Document, NodeId) {
        let mut doc = Document::new();
        let Ok(root) = Element::new(None, "root") else {
            panic!("valid name");
        };
        let root = doc.set_root_element(root);
        (doc, root)
    }

    #[test]
    fn test_content_absent_on_empty_element() {
        let (doc, root) = doc_with_root();
        assert_eq!(doc.content(root), None);
    }

    #[test]
    fn test_set_content_replaces_children() {
        let (mut doc, root) = doc_with_root();
        let Ok(child) = doc.create_element(None, "child") else {
            panic!("valid name");
        };
        assert!(doc.append_child(root, child).is_ok());

        assert!(doc.set_content(root, "a < b").is_ok());
        assert!(!doc.contains(child));
        assert_eq!(doc.content(root).as_deref(), Some("a < b"));
        assert_eq!(doc.children(root).count(), 1);
    }

    #[test]
    fn test_set_content_empty_clears() {
        let (mut doc, root) = doc_with_root();
        assert!(doc.set_content(root, "x").is_ok());
        assert!(doc.set_content(root, "").is_ok());
        assert_eq!(doc.first_child(root), None);
        assert_eq!(doc.content(root), None);
    }

    #[test]
    fn test_set_content_forbidden_char_leaves_node() {
        let (mut doc, root) = doc_with_root();
        assert!(doc.set_content(root, "keep").is_ok());
        assert_eq!(
            doc.set_content(root, "bad\u{0}"),
            Err(TreeError::Escape(EscapeError::ForbiddenChar {
                ch: '\u{0}',
                offset: 3
            }))
        );
        assert_eq!(doc.content(root).as_deref(), Some("keep"));
    }

    #[test]
    fn test_set_content_bytes_malformed_utf8() {
        let (mut doc, root) = doc_with_root();
        assert!(doc.set_content(root, "keep").is_ok());
        let result = doc.set_content_bytes(root, b"ok\xFF");
        assert_eq!(
            result,
            Err(TreeError::Escape(EscapeError::MalformedUtf8 { valid_up_to: 2 }))
        );
        assert_eq!(doc.content(root).as_deref(), Some("keep"));
    }

    #[test]
    fn test_set_content_on_text_node() {
        let mut doc = Document::new();
        let Ok(text) = doc.create_text("old") else {
            panic!("valid text");
        };
        assert!(doc.set_content(text, "new").is_ok());
        assert_eq!(doc.node_text(text), Some("new"));
    }

    #[test]
    fn test_set_content_rejects_terminators() {
        let (mut doc, root) = doc_with_root();
        let Ok(comment) = doc.create_comment("note") else {
            panic!("valid comment");
        };
        let Ok(cdata) = doc.create_cdata("raw") else {
            panic!("valid cdata");
        };
        let Ok(pi) = doc.create_pi("t", Some("data")) else {
            panic!("valid pi");
        };
        for id in [comment, cdata, pi] {
            assert!(doc.append_child(root, id).is_ok());
        }

        assert_eq!(
            doc.set_content(comment, "a-->b"),
            Err(TreeError::Escape(EscapeError::Terminator {
                sequence: "--",
                offset: 1
            }))
        );
        assert!(doc.set_content(comment, "dash-").is_err());
        assert!(doc.set_content(cdata, "x]]><evil/>").is_err());
        assert!(doc.set_content(pi, "x?><evil/><?y").is_err());
        assert!(doc.set_content_bytes(pi, b"?>").is_err());

        assert_eq!(doc.node_text(comment), Some("note"));
        assert_eq!(doc.node_text(cdata), Some("raw"));
        assert_eq!(doc.node_text(pi), Some("data"));

        assert!(doc.set_content(root, "a-->b ]]> ?>").is_ok());
        assert_eq!(doc.content(root).as_deref(), Some("a-->b ]]> ?>"));
    }

    #[test]
    fn test_append_content() {
        let (mut doc, root) = doc_with_root();
        assert!(doc.set_content(root, "Hello").is_ok());
        assert!(matches!(doc.append_content(root, ", world"), Ok(Some(_))));
        assert_eq!(doc.content(root).as_deref(), Some("Hello, world"));
        assert_eq!(doc.append_content(root, ""), Ok(None));
    }

    #[test]
    fn test_content_skips_comments() {
        let (mut doc, root) = doc_with_root();
        let Ok(comment) = doc.create_comment("note") else {
            panic!("valid comment");
        };
        let Ok(cdata) = doc.create_cdata("raw") else {
            panic!("valid cdata");
        };
        assert!(doc.append_child(root, comment).is_ok());
        assert!(doc.append_child(root, cdata).is_ok());
        assert_eq!(doc.content(root).as_deref(), Some("raw"));
        assert_eq!(doc.content(comment).as_deref(), Some("note"));
    }
}
