//! Free-standing element trees.
//!
//! An [`Element`] is a node that belongs to no document. It owns its
//! attributes and children outright: moving it moves the whole subtree, and
//! dropping it frees everything built under it. [`Document::import`] and
//! friends take an `Element` by value, which is what makes it impossible to
//! attach the same free-standing node twice.
//!
//! [`Document::import`]: super::Document::import

use super::Attributes;
use crate::error::TreeError;
use crate::serial::escape::{check_bytes, check_comment, check_text};
use crate::util::qname::check_ncname;

/// A child of a free-standing [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// A nested element.
    Element(Element),
    /// Character data, stored unescaped.
    Text(String),
    /// A CDATA section.
    CData(String),
    /// A comment.
    Comment(String),
    /// A processing instruction.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },
}

/// A free-standing, exclusively owned element and its subtree.
///
/// # Examples
///
/// ```
/// use xmlnest::{Document, Element};
///
/// let mut item = Element::new(None, "item").unwrap();
/// item.set_property("id", "1").unwrap();
/// item.set_content("Apple").unwrap();
///
/// let mut catalog = Element::new(None, "catalog").unwrap();
/// catalog.append_child(item);
///
/// let mut doc = Document::new();
/// let root = doc.set_root_element(catalog);
/// assert_eq!(doc.node_name(root), Some("catalog"));
/// ```
///
/// An element that has been attached is gone from the caller's hands:
///
/// ```compile_fail
/// use xmlnest::{Document, Element};
///
/// let mut doc = Document::new();
/// let item = Element::new(None, "item").unwrap();
/// let root = doc.set_root_element(Element::new(None, "root").unwrap());
/// doc.append_element(root, item).unwrap();
/// doc.append_element(root, item).unwrap(); // use of moved value
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub(crate) name: String,
    pub(crate) prefix: Option<String>,
    pub(crate) attributes: Attributes,
    pub(crate) children: Vec<Child>,
}

impl Element {
    /// Creates an element with an optional namespace prefix.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyName`] if `name` is empty and
    /// [`TreeError::InvalidName`] if `name` or `prefix` is not a colon-free
    /// XML name.
    pub fn new(prefix: Option<&str>, name: &str) -> Result<Self, TreeError> {
        check_ncname(name)?;
        if let Some(prefix) = prefix {
            check_ncname(prefix)?;
        }
        Ok(Self {
            name: name.to_string(),
            prefix: prefix.map(str::to_string),
            attributes: Attributes::new(),
            children: Vec::new(),
        })
    }

    /// The local name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Renames the element in place.
    ///
    /// # Errors
    ///
    /// Same as [`Element::new`]; the element is unchanged on failure.
    pub fn rename(&mut self, name: &str) -> Result<(), TreeError> {
        check_ncname(name)?;
        self.name = name.to_string();
        Ok(())
    }

    /// Replaces the namespace prefix.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidName`] for a malformed prefix.
    pub fn set_prefix(&mut self, prefix: Option<&str>) -> Result<(), TreeError> {
        if let Some(prefix) = prefix {
            check_ncname(prefix)?;
        }
        self.prefix = prefix.map(str::to_string);
        Ok(())
    }

    /// The attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the value of attribute `key`.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }

    /// Sets attribute `key`, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// See [`Attributes::set`].
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<(), TreeError> {
        self.attributes.set(key, value)
    }

    /// Sets every valid entry; returns `true` if at least one was applied.
    pub fn set_properties<I, K, V>(&mut self, entries: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.attributes.set_all(entries)
    }

    /// Removes attribute `key`, returning its value.
    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        self.attributes.remove(key)
    }

    /// The children in document order.
    #[must_use]
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Appends `child` after the existing children.
    ///
    /// Returns `self` so siblings can be chained.
    pub fn append_child(&mut self, child: Element) -> &mut Self {
        self.children.push(Child::Element(child));
        self
    }

    /// Appends a text node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] if `text` contains characters that
    /// cannot appear in XML.
    pub fn append_text(&mut self, text: &str) -> Result<(), TreeError> {
        check_text(text)?;
        if !text.is_empty() {
            self.children.push(Child::Text(text.to_string()));
        }
        Ok(())
    }

    /// Appends a comment.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] if `text` contains characters that
    /// cannot appear in XML, contains `--`, or ends with `-`.
    pub fn append_comment(&mut self, text: &str) -> Result<(), TreeError> {
        check_comment(text)?;
        self.children.push(Child::Comment(text.to_string()));
        Ok(())
    }

    /// Returns the concatenated text of all text and CDATA descendants, or
    /// `None` if there is none.
    #[must_use]
    pub fn content(&self) -> Option<String> {
        let mut buf = String::new();
        let found = collect_text(&self.children, &mut buf);
        found.then_some(buf)
    }

    /// Replaces all children with a single text node (none if `text` is empty).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] without touching the children if `text`
    /// cannot be represented.
    pub fn set_content(&mut self, text: &str) -> Result<(), TreeError> {
        check_text(text)?;
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Child::Text(text.to_string()));
        }
        Ok(())
    }

    /// Like [`set_content`](Self::set_content), for raw bytes that must be UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] for malformed UTF-8.
    pub fn set_content_bytes(&mut self, bytes: &[u8]) -> Result<(), TreeError> {
        let text = check_bytes(bytes)?;
        self.set_content(text)
    }

    /// Returns the first direct child element named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyName`] if `name` is empty.
    pub fn find_first_by_name(&self, name: &str) -> Result<Option<&Element>, TreeError> {
        Ok(self.find_all_by_name(name)?.into_iter().next())
    }

    /// Returns every direct child element named `name`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyName`] if `name` is empty.
    pub fn find_all_by_name(&self, name: &str) -> Result<Vec<&Element>, TreeError> {
        if name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        Ok(self
            .children
            .iter()
            .filter_map(|child| match child {
                Child::Element(e) if e.name == name => Some(e),
                _ => None,
            })
            .collect())
    }
}

fn collect_text(children: &[Child], buf: &mut String) -> bool {
    let mut found = false;
    let mut stack = vec![children.iter()];
    while let Some(level) = stack.last_mut() {
        match level.next() {
            Some(Child::Text(text) | Child::CData(text)) => {
                buf.push_str(text);
                found = true;
            }
            Some(Child::Element(element)) => stack.push(element.children.iter()),
            Some(Child::Comment(_) | Child::ProcessingInstruction { .. }) => {}
            None => {
                stack.pop();
            }
        }
    }
    found
}

impl Drop for Element {
    // Flattens the subtree so dropping a deep tree does not recurse.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Child::Element(mut element) = child {
                pending.append(&mut element.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_name() {
        assert_eq!(Element::new(None, ""), Err(TreeError::EmptyName));
    }

    #[test]
    fn test_new_with_prefix() {
        let Ok(el) = Element::new(Some("svg"), "rect") else {
            panic!("valid name");
        };
        assert_eq!(el.prefix(), Some("svg"));
        assert_eq!(el.name(), "rect");
        assert!(Element::new(Some("a:b"), "rect").is_err());
    }

    #[test]
    fn test_build_nested_tree() {
        let Ok(mut root) = Element::new(None, "root") else {
            panic!("valid name");
        };
        let Ok(mut child) = Element::new(None, "child") else {
            panic!("valid name");
        };
        let Ok(sibling) = Element::new(None, "sibling") else {
            panic!("valid name");
        };
        assert!(child.append_text("hi").is_ok());
        root.append_child(child).append_child(sibling);
        assert_eq!(root.content().as_deref(), Some("hi"));
        assert_eq!(root.children().len(), 2);
        assert!(matches!(&root.children()[1], Child::Element(e) if e.name() == "sibling"));
    }

    #[test]
    fn test_append_comment_rejects_terminators() {
        let Ok(mut root) = Element::new(None, "root") else {
            panic!("valid name");
        };
        assert!(root.append_comment("x-->y").is_err());
        assert!(root.append_comment("x-").is_err());
        assert!(root.children().is_empty());
        assert!(root.append_comment(" a - b ").is_ok());
        assert_eq!(root.children(), &[Child::Comment(" a - b ".to_string())]);
    }

    #[test]
    fn test_set_content_replaces_children() {
        let Ok(mut root) = Element::new(None, "root") else {
            panic!("valid name");
        };
        let Ok(child) = Element::new(None, "child") else {
            panic!("valid name");
        };
        root.append_child(child);
        assert!(root.set_content("text").is_ok());
        assert_eq!(root.children(), &[Child::Text("text".to_string())]);
        assert!(root.set_content("").is_ok());
        assert_eq!(root.content(), None);
    }

    #[test]
    fn test_set_content_bytes_malformed() {
        let Ok(mut root) = Element::new(None, "root") else {
            panic!("valid name");
        };
        let _ = root.set_content("keep");
        assert!(root.set_content_bytes(b"\xC3\x28").is_err());
        assert_eq!(root.content().as_deref(), Some("keep"));
    }

    #[test]
    fn test_find_children_by_name() {
        let Ok(mut list) = Element::new(None, "list") else {
            panic!("valid name");
        };
        for (i, name) in ["item", "other", "item"].iter().enumerate() {
            let Ok(mut el) = Element::new(None, name) else {
                panic!("valid name");
            };
            let _ = el.set_property("n", &i.to_string());
            list.append_child(el);
        }
        let Ok(items) = list.find_all_by_name("item") else {
            panic!("non-empty name");
        };
        let ns: Vec<_> = items.iter().filter_map(|e| e.property("n")).collect();
        assert_eq!(ns, vec!["0", "2"]);
        assert!(matches!(list.find_first_by_name("missing"), Ok(None)));
        assert_eq!(list.find_first_by_name(""), Err(TreeError::EmptyName));
    }
}
