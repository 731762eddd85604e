//! Element attributes.
//!
//! Values are stored unescaped; [`crate::serial`] escapes them on output.
//! Writes are checked up front so a stored value is always representable.

use indexmap::IndexMap;

use super::{Document, NodeId, NodeKind};
use crate::error::TreeError;
use crate::serial::escape::check_text;
use crate::util::qname::check_name;

/// An insertion-ordered attribute map with unique keys.
///
/// Overwriting a key keeps its original position, so serialization order is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: IndexMap<String, String>,
}

impl Attributes {
    /// Creates an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Sets `key` to `value` after validating both.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyName`] or [`TreeError::InvalidName`] for a
    /// bad key and [`TreeError::Escape`] if the value cannot be represented.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), TreeError> {
        check_name(key)?;
        check_text(value)?;
        self.insert_unchecked(key.to_string(), value.to_string());
        Ok(())
    }

    /// Applies every valid entry and skips the rest.
    ///
    /// Returns `true` if at least one entry was applied. There is no
    /// atomicity across the batch.
    pub fn set_all<I, K, V>(&mut self, entries: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut applied = false;
        for (key, value) in entries {
            if self.set(key.as_ref(), value.as_ref()).is_ok() {
                applied = true;
            }
        }
        applied
    }

    pub(crate) fn insert_unchecked(&mut self, key: String, value: String) {
        self.entries.insert(key, value);
    }

    /// Removes `key`, returning its value. Later entries keep their order.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies the attributes into an owned map.
    #[must_use]
    pub fn to_map(&self) -> IndexMap<String, String> {
        self.entries.clone()
    }
}

impl Document {
    /// Returns the attributes of an element node, or `None` for other nodes
    /// and stale handles.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> Option<&Attributes> {
        match &self.node(id)?.kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Returns the value of attribute `key` on an element.
    ///
    /// An empty key, a stale handle, or a non-element node all yield `None`.
    #[must_use]
    pub fn property(&self, id: NodeId, key: &str) -> Option<&str> {
        if key.is_empty() {
            return None;
        }
        self.attributes(id)?.get(key)
    }

    /// Returns all attributes of an element as an ordered map.
    ///
    /// The map is empty when the node has no attributes or is not an element.
    #[must_use]
    pub fn properties(&self, id: NodeId) -> IndexMap<String, String> {
        self.attributes(id).map(Attributes::to_map).unwrap_or_default()
    }

    /// Returns `true` if the element has attribute `key`.
    #[must_use]
    pub fn has_property(&self, id: NodeId, key: &str) -> bool {
        self.attributes(id).is_some_and(|a| a.contains(key))
    }

    fn attributes_mut(&mut self, id: NodeId) -> Result<&mut Attributes, TreeError> {
        match &mut self.data_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            _ => Err(TreeError::NotAnElement(id)),
        }
    }

    /// Sets attribute `key` to `value`, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Fails without mutation on a bad key, an unrepresentable value, a stale
    /// handle, or a non-element node.
    pub fn set_property(&mut self, id: NodeId, key: &str, value: &str) -> Result<(), TreeError> {
        self.attributes_mut(id)?.set(key, value)?;
        trace!(?id, key, "set property");
        Ok(())
    }

    /// Sets every entry with a valid key and value; invalid entries are skipped.
    ///
    /// Returns `Ok(true)` if at least one entry was applied and `Ok(false)`
    /// if none was (for example, an empty batch).
    ///
    /// # Errors
    ///
    /// Fails on a stale handle or a non-element node.
    pub fn set_properties<I, K, V>(&mut self, id: NodeId, entries: I) -> Result<bool, TreeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(self.attributes_mut(id)?.set_all(entries))
    }

    /// Removes attribute `key`, returning its old value.
    ///
    /// # Errors
    ///
    /// Fails on a stale handle or a non-element node.
    pub fn remove_property(&mut self, id: NodeId, key: &str) -> Result<Option<String>, TreeError> {
        Ok(self.attributes_mut(id)?.remove(key))
    }
}
