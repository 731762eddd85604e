//! Name lookup over child lists and sibling chains.
//!
//! Both searches are one level deep. With `search_children` the candidates
//! are `scope`'s children; without it they are `scope` itself followed by
//! its following siblings. Only elements match, and only on the local name.

use super::{Document, NodeId};
use crate::error::TreeError;

impl Document {
    fn candidates(&self, scope: NodeId, search_children: bool) -> Result<Candidates<'_>, TreeError> {
        let data = self.check(scope)?;
        let next = if search_children {
            data.first_child
        } else {
            Some(scope)
        };
        Ok(Candidates { doc: self, next })
    }

    /// Returns the first element named `name` in document order.
    ///
    /// # Errors
    ///
    /// [`TreeError::EmptyName`] for an empty name, [`TreeError::UnknownNode`]
    /// for a stale `scope`. Finding nothing is `Ok(None)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlnest::Document;
    ///
    /// let doc = Document::parse_str("<r><a/><b/><a/></r>").unwrap();
    /// let root = doc.root_element().unwrap();
    /// let b = doc.find_first_by_name(root, "b", true).unwrap().unwrap();
    /// assert_eq!(doc.node_name(b), Some("b"));
    /// ```
    pub fn find_first_by_name(
        &self,
        scope: NodeId,
        name: &str,
        search_children: bool,
    ) -> Result<Option<NodeId>, TreeError> {
        if name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        let mut candidates = self.candidates(scope, search_children)?;
        Ok(candidates.find(|&id| self.is_element_named(id, name)))
    }

    /// Returns every element named `name` in document order.
    ///
    /// # Errors
    ///
    /// Same as [`find_first_by_name`](Self::find_first_by_name). Finding
    /// nothing is an empty `Vec`.
    pub fn find_all_by_name(
        &self,
        scope: NodeId,
        name: &str,
        search_children: bool,
    ) -> Result<Vec<NodeId>, TreeError> {
        if name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        Ok(self
            .candidates(scope, search_children)?
            .filter(|&id| self.is_element_named(id, name))
            .collect())
    }

    fn is_element_named(&self, id: NodeId, name: &str) -> bool {
        self.data(id).kind.is_element() && self.node_name(id) == Some(name)
    }
}

struct Candidates<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Candidates<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.data(current).next_sibling;
        Some(current)
    }
}
