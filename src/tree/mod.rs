//! Arena-based XML document tree with explicit node ownership.
//!
//! All nodes of a document live in a `Vec` of slots owned by the `Document`
//! and are referenced by `NodeId`. A `NodeId` records the slot's generation:
//! when a subtree is destroyed its slots are recycled with a bumped
//! generation, so an old handle is rejected with [`TreeError::UnknownNode`]
//! instead of silently aliasing a new node.
//!
//! # Ownership
//!
//! Every non-document node is in exactly one [`NodeState`]:
//!
//! - `Detached`: no parent slot. Fresh nodes from
//!   [`create_element`](Document::create_element) and
//!   [`import`](Document::import), and nodes passed through
//!   [`detach`](Document::detach), start here.
//! - `Attached`: linked as some element's child, or as the root element
//!   (child of the document node).
//!
//! Only detached subtree heads can be attached, so a node can never be
//! owned by two parents. Nodes that belong to no document at all are
//! represented by the free-standing [`Element`] type.
//!
//! Navigation links (parent, siblings) are plain `NodeId`s; ownership runs
//! only from a parent to its children and from the document to its arena.

mod attributes;
mod content;
mod element;
mod find;
mod node;

pub use attributes::Attributes;
pub use element::{Child, Element};
pub use node::{NodeKind, NodeState};

use std::fmt;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{ParseError, TreeError};
use crate::parser::ParseOptions;
use crate::serial::escape::{check_cdata, check_comment, check_pi_data, check_text};
use crate::util::qname::check_ncname;

static NEXT_DOCUMENT_TAG: AtomicU32 = AtomicU32::new(1);

/// A handle to a node inside a [`Document`].
///
/// Handles are non-owning views. They are `Copy` and stay cheap to pass
/// around, but they are only meaningful for the document that issued them
/// and only while the node is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    doc: u32,
    index: NonZeroU32,
    generation: u32,
}

impl NodeId {
    fn as_index(self) -> usize {
        self.index.get() as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}.{}", self.index, self.generation)
    }
}

/// Storage for a single live node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node. `None` for the document node and for detached nodes.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

/// An element being moved out of the arena, with the next child still to
/// be taken from it.
struct Extracting {
    element: Element,
    next: Option<NodeId>,
}

/// An XML document.
///
/// The `Document` owns every node it has issued a `NodeId` for, attached or
/// not. Dropping it releases all of them exactly once. Navigation goes
/// through `&Document`, mutation through `&mut Document`, so the borrow
/// checker enforces the single-writer rule.
///
/// # Examples
///
/// ```
/// use xmlnest::Document;
///
/// let mut doc = Document::new();
/// let root = doc.create_element(None, "catalog").unwrap();
/// doc.set_root(root).unwrap();
///
/// let item = doc.create_element(None, "item").unwrap();
/// doc.set_property(item, "id", "1").unwrap();
/// doc.append_child(root, item).unwrap();
///
/// assert_eq!(doc.root_element(), Some(root));
/// assert_eq!(doc.parent(item), Some(root));
/// ```
#[derive(Debug)]
pub struct Document {
    tag: u32,
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<Slot>,
    /// Recycled slot indices.
    free: Vec<usize>,
    live: usize,
    /// The document node id.
    root: NodeId,
    /// XML version from the declaration (e.g., "1.0"). `None` means the
    /// serializer falls back to "1.0".
    pub version: Option<String>,
    /// Encoding from the declaration (e.g., "UTF-8").
    pub encoding: Option<String>,
    /// Standalone flag from the declaration.
    pub standalone: Option<bool>,
}

impl Document {
    /// Creates a new empty document with no declared version.
    #[must_use]
    pub fn new() -> Self {
        let tag = NEXT_DOCUMENT_TAG.fetch_add(1, Ordering::Relaxed);
        let mut doc = Self {
            tag,
            nodes: Vec::with_capacity(64),
            free: Vec::new(),
            live: 0,
            root: NodeId {
                doc: tag,
                index: NonZeroU32::MIN,
                generation: 0,
            },
            version: None,
            encoding: None,
            standalone: None,
        };
        // Index 0: placeholder (NodeId uses NonZeroU32)
        doc.nodes.push(Slot {
            generation: 0,
            data: None,
        });
        doc.root = doc.alloc(NodeKind::Document);
        debug!(tag, "created document");
        doc
    }

    /// Creates an empty document declaring `version`.
    ///
    /// An empty string means no declared version.
    #[must_use]
    pub fn with_version(version: &str) -> Self {
        let mut doc = Self::new();
        if !version.is_empty() {
            doc.version = Some(version.to_string());
        }
        doc
    }

    /// Parses an XML string into a `Document` with default options.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is not well-formed XML.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlnest::Document;
    ///
    /// let doc = Document::parse_str("<root><child/></root>").unwrap();
    /// let root = doc.root_element().unwrap();
    /// assert_eq!(doc.node_name(root), Some("root"));
    /// ```
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        crate::parser::parse_str(input)
    }

    /// Reads and parses an XML file.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the file cannot be read, cannot be decoded,
    /// or is not well-formed XML.
    pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self, ParseError> {
        crate::parser::parse_file(path, options)
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element, if the document has one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.data(id).kind.is_element())
    }

    // --- Arena ---

    fn slot_data(&self, id: NodeId) -> Option<&NodeData> {
        if id.doc != self.tag {
            return None;
        }
        let slot = self.nodes.get(id.as_index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_ref()
    }

    /// Returns the `NodeData` for a live node, or `None` for a stale or
    /// foreign handle.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.slot_data(id)
    }

    /// Returns `true` if `id` refers to a live node of this document.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot_data(id).is_some()
    }

    fn check(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        self.slot_data(id).ok_or(TreeError::UnknownNode(id))
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, TreeError> {
        if self.slot_data(id).is_none() {
            return Err(TreeError::UnknownNode(id));
        }
        match self.nodes[id.as_index()].data.as_mut() {
            Some(data) => Ok(data),
            None => Err(TreeError::UnknownNode(id)),
        }
    }

    /// Link-following accessor for ids read out of a live node.
    ///
    /// # Panics
    ///
    /// Panics if the arena links are corrupt.
    #[allow(clippy::expect_used)]
    fn data(&self, id: NodeId) -> &NodeData {
        self.nodes[id.as_index()]
            .data
            .as_ref()
            .expect("arena link points at a freed slot")
    }

    #[allow(clippy::expect_used)]
    fn link_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.nodes[id.as_index()]
            .data
            .as_mut()
            .expect("arena link points at a freed slot")
    }

    /// Allocates a detached node.
    ///
    /// Running out of memory or of slot indices is not recoverable.
    #[allow(clippy::expect_used)]
    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = Some(NodeData::new(kind));
        let index = if let Some(index) = self.free.pop() {
            self.nodes[index].data = data;
            index
        } else {
            self.nodes.push(Slot {
                generation: 0,
                data,
            });
            self.nodes.len() - 1
        };
        self.live += 1;
        let raw = u32::try_from(index).expect("node arena exceeds u32::MAX slots");
        NodeId {
            doc: self.tag,
            index: NonZeroU32::new(raw).expect("slot 0 is never allocated"),
            generation: self.nodes[index].generation,
        }
    }

    /// Frees `id` and its whole subtree. `id` must already be unlinked.
    fn release(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            let index = current.as_index();
            let Some(data) = self.nodes[index].data.take() else {
                continue;
            };
            let mut child = data.first_child;
            while let Some(c) = child {
                child = self.data(c).next_sibling;
                stack.push(c);
            }
            let slot = &mut self.nodes[index];
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
            freed += 1;
        }
        self.live -= freed;
        freed
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.prev_sibling
    }

    /// Returns an iterator over the children of a node.
    ///
    /// A stale handle yields nothing.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to the
    /// document node, or to the head of a detached subtree).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.contains(id).then_some(id),
        }
    }

    /// Returns an iterator over all descendants of a node (depth-first).
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// Returns the ownership state of a node.
    ///
    /// The document node itself reports `Attached`: it is owned by the
    /// document and can never be linked elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnknownNode`] for a stale or foreign handle.
    pub fn state(&self, id: NodeId) -> Result<NodeState, TreeError> {
        let data = self.check(id)?;
        if data.parent.is_some() || id == self.root {
            Ok(NodeState::Attached)
        } else {
            Ok(NodeState::Detached)
        }
    }

    /// Returns `true` if `id` is reachable from the document node.
    #[must_use]
    pub fn is_in_tree(&self, id: NodeId) -> bool {
        self.ancestors(id).last() == Some(self.root)
    }

    /// Returns the local name of an element or the target of a PI.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the namespace prefix of an element, if any.
    #[must_use]
    pub fn node_prefix(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { prefix, .. } => prefix.as_deref(),
            _ => None,
        }
    }

    /// Returns `prefix:name` for prefixed elements and `name` otherwise.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        match &self.node(id)?.kind {
            NodeKind::Element {
                name,
                prefix: Some(prefix),
                ..
            } => Some(format!("{prefix}:{name}")),
            NodeKind::Element { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    /// Returns the number of live nodes, including the document node and
    /// detached subtrees.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.live
    }

    // --- Creation ---

    /// Creates a detached element owned by this document.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyName`] or [`TreeError::InvalidName`] for a
    /// bad name or prefix.
    pub fn create_element(&mut self, prefix: Option<&str>, name: &str) -> Result<NodeId, TreeError> {
        check_ncname(name)?;
        if let Some(prefix) = prefix {
            check_ncname(prefix)?;
        }
        let id = self.alloc(NodeKind::Element {
            name: name.to_string(),
            prefix: prefix.map(str::to_string),
            attributes: Attributes::new(),
        });
        trace!(?id, name, "created element");
        Ok(id)
    }

    /// Creates a detached text node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] if `text` cannot appear in XML.
    pub fn create_text(&mut self, text: &str) -> Result<NodeId, TreeError> {
        check_text(text)?;
        Ok(self.alloc(NodeKind::Text {
            content: text.to_string(),
        }))
    }

    /// Creates a detached CDATA section.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] if `text` cannot appear in XML or
    /// contains the `]]>` terminator.
    pub fn create_cdata(&mut self, text: &str) -> Result<NodeId, TreeError> {
        check_cdata(text)?;
        Ok(self.alloc(NodeKind::CData {
            content: text.to_string(),
        }))
    }

    /// Creates a detached comment.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Escape`] if `text` cannot appear in XML,
    /// contains `--`, or ends with `-`.
    pub fn create_comment(&mut self, text: &str) -> Result<NodeId, TreeError> {
        check_comment(text)?;
        Ok(self.alloc(NodeKind::Comment {
            content: text.to_string(),
        }))
    }

    /// Creates a detached processing instruction.
    ///
    /// # Errors
    ///
    /// Returns a name error for a bad target and [`TreeError::Escape`] for
    /// unrepresentable data or data containing `?>`.
    pub fn create_pi(&mut self, target: &str, data: Option<&str>) -> Result<NodeId, TreeError> {
        check_ncname(target)?;
        if let Some(data) = data {
            check_pi_data(data)?;
        }
        Ok(self.alloc(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.map(str::to_string),
        }))
    }

    /// Moves a free-standing element into the arena as a detached subtree.
    pub fn import(&mut self, element: Element) -> NodeId {
        let (id, children) = self.import_one(Child::Element(element));
        let mut stack = vec![(id, children.into_iter())];
        while let Some((parent, pending)) = stack.last_mut() {
            let parent = *parent;
            match pending.next() {
                Some(child) => {
                    let (child_id, grandchildren) = self.import_one(child);
                    self.link_last(parent, child_id);
                    if !grandchildren.is_empty() {
                        stack.push((child_id, grandchildren.into_iter()));
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
        trace!(?id, "imported element");
        id
    }

    /// Allocates one node for `child`, handing back its children unlinked.
    fn import_one(&mut self, child: Child) -> (NodeId, Vec<Child>) {
        match child {
            Child::Element(mut element) => {
                let id = self.alloc(NodeKind::Element {
                    name: std::mem::take(&mut element.name),
                    prefix: element.prefix.take(),
                    attributes: std::mem::take(&mut element.attributes),
                });
                (id, std::mem::take(&mut element.children))
            }
            Child::Text(content) => (self.alloc(NodeKind::Text { content }), Vec::new()),
            Child::CData(content) => (self.alloc(NodeKind::CData { content }), Vec::new()),
            Child::Comment(content) => (self.alloc(NodeKind::Comment { content }), Vec::new()),
            Child::ProcessingInstruction { target, data } => (
                self.alloc(NodeKind::ProcessingInstruction { target, data }),
                Vec::new(),
            ),
        }
    }

    // --- Linking primitives (no validation) ---

    fn link_last(&mut self, parent: NodeId, child: NodeId) {
        self.link_mut(child).parent = Some(parent);

        if let Some(last) = self.data(parent).last_child {
            self.link_mut(last).next_sibling = Some(child);
            self.link_mut(child).prev_sibling = Some(last);
            self.link_mut(parent).last_child = Some(child);
        } else {
            self.link_mut(parent).first_child = Some(child);
            self.link_mut(parent).last_child = Some(child);
        }
    }

    /// Puts `replacement` into `old`'s parent slot and unlinks `old`.
    fn link_replace(&mut self, old: NodeId, replacement: NodeId) {
        let old_data = self.data(old);
        let (parent, prev, next) = (old_data.parent, old_data.prev_sibling, old_data.next_sibling);

        let new_data = self.link_mut(replacement);
        new_data.parent = parent;
        new_data.prev_sibling = prev;
        new_data.next_sibling = next;

        match (prev, parent) {
            (Some(p), _) => self.link_mut(p).next_sibling = Some(replacement),
            (None, Some(parent)) => self.link_mut(parent).first_child = Some(replacement),
            (None, None) => {}
        }
        match (next, parent) {
            (Some(n), _) => self.link_mut(n).prev_sibling = Some(replacement),
            (None, Some(parent)) => self.link_mut(parent).last_child = Some(replacement),
            (None, None) => {}
        }

        let old_data = self.link_mut(old);
        old_data.parent = None;
        old_data.prev_sibling = None;
        old_data.next_sibling = None;
    }

    fn unlink_links(&mut self, id: NodeId) {
        let Some(parent) = self.data(id).parent else {
            return;
        };

        let prev = self.data(id).prev_sibling;
        let next = self.data(id).next_sibling;

        match prev {
            Some(p) => self.link_mut(p).next_sibling = next,
            None => self.link_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.link_mut(n).prev_sibling = prev,
            None => self.link_mut(parent).last_child = prev,
        }

        let data = self.link_mut(id);
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
    }

    /// Fails unless `id` is a live, detached subtree head.
    fn check_detached(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        if id == self.root {
            return Err(TreeError::DocumentNode);
        }
        let data = self.check(id)?;
        if data.parent.is_some() {
            return Err(TreeError::AlreadyAttached(id));
        }
        Ok(data)
    }

    // --- Mutation ---

    /// Makes a detached element the document's root element.
    ///
    /// A previous root element is replaced in place (prolog comments and PIs
    /// keep their positions) and released together with its subtree.
    ///
    /// # Errors
    ///
    /// - [`TreeError::AlreadyAttached`] if `id` is not detached
    /// - [`TreeError::NotAnElement`] if `id` is not an element
    /// - [`TreeError::UnknownNode`] for a stale or foreign handle
    pub fn set_root(&mut self, id: NodeId) -> Result<(), TreeError> {
        if !self.check_detached(id)?.kind.is_element() {
            return Err(TreeError::NotAnElement(id));
        }
        match self.root_element() {
            Some(old) => {
                self.link_replace(old, id);
                self.release(old);
                trace!(?id, ?old, "replaced root element");
            }
            None => {
                self.link_last(self.root, id);
                trace!(?id, "set root element");
            }
        }
        Ok(())
    }

    /// Imports `element` and makes it the root element.
    pub fn set_root_element(&mut self, element: Element) -> NodeId {
        let id = self.import(element);
        match self.root_element() {
            Some(old) => {
                self.link_replace(old, id);
                self.release(old);
            }
            None => self.link_last(self.root, id),
        }
        id
    }

    /// Appends a detached subtree as the last child of `parent`.
    ///
    /// `parent` may itself be detached, so subtrees can be assembled before
    /// they are attached.
    ///
    /// # Errors
    ///
    /// Nothing is modified on failure.
    /// - [`TreeError::AlreadyAttached`] if `child` already has a parent slot
    /// - [`TreeError::NotAnElement`] if `parent` is not an element
    /// - [`TreeError::CycleDetected`] if `parent` lies inside `child`'s subtree
    /// - [`TreeError::UnknownNode`] for stale or foreign handles
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if !self.check(parent)?.kind.is_element() {
            return Err(TreeError::NotAnElement(parent));
        }
        self.check_detached(child)?;
        if self.ancestors(parent).any(|a| a == child) {
            return Err(TreeError::CycleDetected { parent, child });
        }
        self.link_last(parent, child);
        trace!(?parent, ?child, "appended child");
        Ok(())
    }

    /// Imports `element` and appends it as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Fails without importing anything if `parent` is stale or not an element.
    pub fn append_element(&mut self, parent: NodeId, element: Element) -> Result<NodeId, TreeError> {
        if !self.check(parent)?.kind.is_element() {
            return Err(TreeError::NotAnElement(parent));
        }
        let id = self.import(element);
        self.link_last(parent, id);
        Ok(id)
    }

    /// Removes a node from its parent.
    ///
    /// With `destroy == false` the node becomes a detached subtree head and
    /// its handle (returned as `Some`) stays valid for re-attachment. With
    /// `destroy == true` the node and its subtree are released; every handle
    /// into the subtree becomes stale and `None` is returned.
    ///
    /// Unlinking the root element leaves the document without one.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`] for a stale handle,
    /// [`TreeError::DocumentNode`] for the document node.
    pub fn unlink(&mut self, id: NodeId, destroy: bool) -> Result<Option<NodeId>, TreeError> {
        if id == self.root {
            return Err(TreeError::DocumentNode);
        }
        self.check(id)?;
        self.unlink_links(id);
        if destroy {
            self.release(id);
            trace!(?id, "destroyed subtree");
            Ok(None)
        } else {
            trace!(?id, "detached subtree");
            Ok(Some(id))
        }
    }

    /// Detaches a node, keeping it alive. Shorthand for `unlink(id, false)`.
    ///
    /// # Errors
    ///
    /// See [`unlink`](Self::unlink).
    pub fn detach(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        self.unlink(id, false)?;
        Ok(id)
    }

    /// Detaches and releases a subtree. Shorthand for `unlink(id, true)`.
    ///
    /// # Errors
    ///
    /// See [`unlink`](Self::unlink).
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.unlink(id, true)?;
        Ok(())
    }

    /// Moves an element subtree out of the arena into a free-standing
    /// [`Element`], detaching it first if needed.
    ///
    /// Every handle into the subtree becomes stale.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAnElement`] for non-element nodes, otherwise as
    /// [`unlink`](Self::unlink).
    pub fn take(&mut self, id: NodeId) -> Result<Element, TreeError> {
        if id == self.root {
            return Err(TreeError::DocumentNode);
        }
        if !self.check(id)?.kind.is_element() {
            return Err(TreeError::NotAnElement(id));
        }
        self.unlink_links(id);
        self.extract(id)
    }

    /// Frees the subtree under `id` into a free-standing element, one
    /// level at a time.
    fn extract(&mut self, id: NodeId) -> Result<Element, TreeError> {
        let mut current = self.extract_element(id)?;
        let mut parents: Vec<Extracting> = Vec::new();
        loop {
            match current.next {
                Some(child) => {
                    current.next = self.data(child).next_sibling;
                    if self.data(child).kind.is_element() {
                        let nested = self.extract_element(child)?;
                        parents.push(std::mem::replace(&mut current, nested));
                    } else {
                        let leaf = match self.free_slot(child).kind {
                            NodeKind::Text { content } => Child::Text(content),
                            NodeKind::CData { content } => Child::CData(content),
                            NodeKind::Comment { content } => Child::Comment(content),
                            NodeKind::ProcessingInstruction { target, data } => {
                                Child::ProcessingInstruction { target, data }
                            }
                            NodeKind::Element { .. } => return Err(TreeError::NotAnElement(child)),
                            NodeKind::Document => return Err(TreeError::DocumentNode),
                        };
                        current.element.children.push(leaf);
                    }
                }
                None => match parents.pop() {
                    Some(mut parent) => {
                        parent.element.children.push(Child::Element(current.element));
                        current = parent;
                    }
                    None => return Ok(current.element),
                },
            }
        }
    }

    fn extract_element(&mut self, id: NodeId) -> Result<Extracting, TreeError> {
        if !self.data(id).kind.is_element() {
            return Err(TreeError::NotAnElement(id));
        }
        let data = self.free_slot(id);
        let NodeKind::Element {
            name,
            prefix,
            attributes,
        } = data.kind
        else {
            return Err(TreeError::NotAnElement(id));
        };
        Ok(Extracting {
            element: Element {
                name,
                prefix,
                attributes,
                children: Vec::new(),
            },
            next: data.first_child,
        })
    }

    /// Empties a single slot and returns what it held. Links into the
    /// subtree stay readable through the returned data only.
    #[allow(clippy::expect_used)]
    fn free_slot(&mut self, id: NodeId) -> NodeData {
        let index = id.as_index();
        let slot = &mut self.nodes[index];
        let data = slot.data.take().expect("arena link points at a freed slot");
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        data
    }

    /// Renames an element (or the target of a PI) in place.
    ///
    /// # Errors
    ///
    /// Name errors, [`TreeError::UnknownNode`], or
    /// [`TreeError::NotAnElement`] for other node kinds.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), TreeError> {
        check_ncname(new_name)?;
        match &mut self.data_mut(id)?.kind {
            NodeKind::Element { name, .. } | NodeKind::ProcessingInstruction { target: name, .. } => {
                *name = new_name.to_string();
            }
            _ => return Err(TreeError::NotAnElement(id)),
        }
        trace!(?id, new_name, "renamed node");
        Ok(())
    }

    /// Replaces an element's namespace prefix.
    ///
    /// # Errors
    ///
    /// A malformed prefix, a stale handle, or a non-element node.
    pub fn set_prefix(&mut self, id: NodeId, new_prefix: Option<&str>) -> Result<(), TreeError> {
        if let Some(p) = new_prefix {
            check_ncname(p)?;
        }
        match &mut self.data_mut(id)?.kind {
            NodeKind::Element { prefix, .. } => *prefix = new_prefix.map(str::to_string),
            _ => return Err(TreeError::NotAnElement(id)),
        }
        Ok(())
    }

    // --- Parser support ---

    /// Appends without validation. Used by the parser, whose input has
    /// already been checked for well-formedness.
    pub(crate) fn append_parsed(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind);
        self.link_last(parent, id);
        id
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.data(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.data(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.data(current).first_child {
            self.next = Some(child);
            return Some(current);
        }

        if let Some(sibling) = self.doc.data(current).next_sibling {
            self.next = Some(sibling);
            return Some(current);
        }

        // Walk up to find an ancestor with a next sibling
        let mut ancestor = self.doc.data(current).parent;
        while let Some(anc) = ancestor {
            if anc == self.root {
                self.next = None;
                return Some(current);
            }
            if let Some(sibling) = self.doc.data(anc).next_sibling {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.data(anc).parent;
        }

        self.next = None;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn element(doc: &mut Document, name: &str) -> NodeId {
        let Ok(id) = doc.create_element(None, name) else {
            panic!("failed to create element {name}");
        };
        id
    }

    fn doc_with_root(name: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = element(&mut doc, name);
        assert!(doc.set_root(root).is_ok());
        (doc, root)
    }

    #[test]
    fn test_new_document_has_only_document_node() {
        let doc = Document::new();
        assert!(matches!(
            doc.node(doc.root()).map(|n| &n.kind),
            Some(NodeKind::Document)
        ));
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.root_element(), None);
        assert_eq!(doc.version, None);
    }

    #[test]
    fn test_with_version() {
        assert_eq!(Document::with_version("1.1").version.as_deref(), Some("1.1"));
        assert_eq!(Document::with_version("").version, None);
    }

    #[test]
    fn test_create_element_starts_detached() {
        let mut doc = Document::new();
        let id = element(&mut doc, "item");
        assert_eq!(doc.state(id), Ok(NodeState::Detached));
        assert_eq!(doc.parent(id), None);
        assert!(!doc.is_in_tree(id));
    }

    #[test]
    fn test_create_element_rejects_empty_name() {
        let mut doc = Document::new();
        assert_eq!(doc.create_element(None, ""), Err(TreeError::EmptyName));
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn test_set_root_attaches() {
        let (doc, root) = doc_with_root("catalog");
        assert_eq!(doc.root_element(), Some(root));
        assert_eq!(doc.state(root), Ok(NodeState::Attached));
        assert_eq!(doc.parent(root), Some(doc.root()));
        assert!(doc.is_in_tree(root));
    }

    #[test]
    fn test_set_root_twice_fails() {
        let (mut doc, root) = doc_with_root("catalog");
        assert_eq!(doc.set_root(root), Err(TreeError::AlreadyAttached(root)));
    }

    #[test]
    fn test_set_root_replaces_and_releases_previous() {
        let (mut doc, old) = doc_with_root("old");
        let child = element(&mut doc, "child");
        assert!(doc.append_child(old, child).is_ok());
        let new = element(&mut doc, "new");
        assert!(doc.set_root(new).is_ok());

        assert_eq!(doc.root_element(), Some(new));
        assert!(!doc.contains(old));
        assert!(!doc.contains(child));
        assert_eq!(doc.node_count(), 2);
    }

    #[test]
    fn test_set_root_keeps_prolog_position() {
        let (mut doc, old) = doc_with_root("old");
        let Ok(comment) = doc.create_comment(" prolog ") else {
            panic!("valid comment");
        };
        // Prolog comment ahead of the root element.
        let _ = doc.unlink(old, false);
        doc.link_last(doc.root(), comment);
        assert!(doc.set_root(old).is_ok());
        let new = element(&mut doc, "new");
        assert!(doc.set_root(new).is_ok());
        let top: Vec<NodeId> = doc.children(doc.root()).collect();
        assert_eq!(top, vec![comment, new]);
    }

    #[test]
    fn test_set_root_rejects_text() {
        let mut doc = Document::new();
        let Ok(text) = doc.create_text("x") else {
            panic!("valid text");
        };
        assert_eq!(doc.set_root(text), Err(TreeError::NotAnElement(text)));
    }

    #[test]
    fn test_append_multiple_children() {
        let (mut doc, root) = doc_with_root("root");
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        let c = element(&mut doc, "c");
        for id in [a, b, c] {
            assert!(doc.append_child(root, id).is_ok());
        }

        assert_eq!(doc.first_child(root), Some(a));
        assert_eq!(doc.last_child(root), Some(c));
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.next_sibling(b), Some(c));
        assert_eq!(doc.next_sibling(c), None);
        assert_eq!(doc.prev_sibling(c), Some(b));
        assert_eq!(doc.prev_sibling(a), None);
    }

    #[test]
    fn test_append_attached_child_fails_without_mutation() {
        let (mut doc, root) = doc_with_root("root");
        let first = element(&mut doc, "first");
        let other = element(&mut doc, "other");
        assert!(doc.append_child(root, first).is_ok());
        assert!(doc.append_child(root, other).is_ok());

        assert_eq!(
            doc.append_child(other, first),
            Err(TreeError::AlreadyAttached(first))
        );
        assert_eq!(doc.parent(first), Some(root));
        assert_eq!(doc.children(other).count(), 0);
        assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![first, other]);
    }

    #[test]
    fn test_append_to_detached_parent() {
        let mut doc = Document::new();
        let parent = element(&mut doc, "parent");
        let child = element(&mut doc, "child");
        assert!(doc.append_child(parent, child).is_ok());
        assert_eq!(doc.state(child), Ok(NodeState::Attached));
        assert!(!doc.is_in_tree(child));

        assert!(doc.set_root(parent).is_ok());
        assert!(doc.is_in_tree(child));
    }

    #[test]
    fn test_append_cycle_rejected() {
        let mut doc = Document::new();
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        assert!(doc.append_child(a, b).is_ok());
        assert_eq!(
            doc.append_child(b, a),
            Err(TreeError::CycleDetected { parent: b, child: a })
        );
        assert_eq!(
            doc.append_child(a, a),
            Err(TreeError::CycleDetected { parent: a, child: a })
        );
    }

    #[test]
    fn test_append_document_node_rejected() {
        let (mut doc, root) = doc_with_root("root");
        let doc_node = doc.root();
        assert_eq!(doc.append_child(root, doc_node), Err(TreeError::DocumentNode));
    }

    #[test]
    fn test_unlink_keep_then_reattach() {
        let (mut doc, root) = doc_with_root("root");
        let left = element(&mut doc, "left");
        let right = element(&mut doc, "right");
        let leaf = element(&mut doc, "leaf");
        for id in [left, right] {
            assert!(doc.append_child(root, id).is_ok());
        }
        assert!(doc.append_child(left, leaf).is_ok());

        assert_eq!(doc.unlink(leaf, false), Ok(Some(leaf)));
        assert_eq!(doc.state(leaf), Ok(NodeState::Detached));
        assert!(doc.append_child(right, leaf).is_ok());

        assert_eq!(doc.parent(leaf), Some(right));
        assert_eq!(doc.children(left).count(), 0);
    }

    #[test]
    fn test_unlink_destroy_invalidates_subtree() {
        let (mut doc, root) = doc_with_root("root");
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        assert!(doc.append_child(root, a).is_ok());
        assert!(doc.append_child(a, b).is_ok());

        assert_eq!(doc.unlink(a, true), Ok(None));
        assert!(!doc.contains(a));
        assert!(!doc.contains(b));
        assert_eq!(doc.first_child(root), None);
        assert_eq!(doc.set_property(b, "x", "y"), Err(TreeError::UnknownNode(b)));
        assert_eq!(doc.unlink(a, true), Err(TreeError::UnknownNode(a)));
    }

    #[test]
    fn test_stale_handle_not_aliased_by_reused_slot() {
        let (mut doc, root) = doc_with_root("root");
        let a = element(&mut doc, "a");
        assert!(doc.append_child(root, a).is_ok());
        assert!(doc.remove(a).is_ok());
        let b = element(&mut doc, "b");
        assert_ne!(a, b);
        assert_eq!(doc.node_name(a), None);
        assert_eq!(doc.node_name(b), Some("b"));
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let (doc_a, root_a) = doc_with_root("a");
        let (mut doc_b, root_b) = doc_with_root("b");
        assert!(doc_a.contains(root_a));
        assert!(!doc_b.contains(root_a));
        assert_eq!(
            doc_b.append_child(root_a, root_b),
            Err(TreeError::UnknownNode(root_a))
        );
    }

    #[test]
    fn test_unlink_root_element() {
        let (mut doc, root) = doc_with_root("root");
        assert!(doc.detach(root).is_ok());
        assert_eq!(doc.root_element(), None);
        assert_eq!(doc.state(root), Ok(NodeState::Detached));
    }

    #[test]
    fn test_unlink_document_node_rejected() {
        let mut doc = Document::new();
        let doc_node = doc.root();
        assert_eq!(doc.unlink(doc_node, true), Err(TreeError::DocumentNode));
    }

    #[test]
    fn test_take_moves_subtree_to_other_document() {
        let (mut src, root) = doc_with_root("root");
        let item = element(&mut src, "item");
        assert!(src.set_property(item, "id", "7").is_ok());
        assert!(src.append_child(root, item).is_ok());

        let Ok(taken) = src.take(item) else {
            panic!("take should succeed");
        };
        assert!(!src.contains(item));
        assert_eq!(src.node_count(), 2);

        let (mut dst, dst_root) = doc_with_root("other");
        let Ok(moved) = dst.append_element(dst_root, taken) else {
            panic!("append should succeed");
        };
        assert_eq!(dst.property(moved, "id"), Some("7"));
        assert_eq!(dst.parent(moved), Some(dst_root));
    }

    #[test]
    fn test_take_and_import_deep_chain() {
        const DEPTH: usize = 50_000;
        let mut doc = Document::new();
        let mut top = element(&mut doc, "leaf");
        assert!(doc.set_content(top, "bottom").is_ok());
        for _ in 0..DEPTH {
            let parent = element(&mut doc, "n");
            assert!(doc.append_child(parent, top).is_ok());
            top = parent;
        }
        assert_eq!(doc.node_count(), DEPTH + 3);

        let Ok(taken) = doc.take(top) else {
            panic!("take should succeed");
        };
        assert_eq!(doc.node_count(), 1);
        assert_eq!(taken.content().as_deref(), Some("bottom"));

        let id = doc.import(taken);
        assert_eq!(doc.node_count(), DEPTH + 3);
        assert_eq!(doc.descendants(id).count(), DEPTH + 1);
        assert_eq!(doc.content(id).as_deref(), Some("bottom"));
    }

    #[test]
    fn test_import_builds_detached_subtree() {
        let mut doc = Document::new();
        let Ok(mut root) = Element::new(Some("x"), "root") else {
            panic!("valid name");
        };
        let Ok(mut child) = Element::new(None, "child") else {
            panic!("valid name");
        };
        assert!(child.append_text("hi").is_ok());
        root.append_child(child);
        let id = doc.import(root);
        assert_eq!(doc.state(id), Ok(NodeState::Detached));
        assert_eq!(doc.qualified_name(id).as_deref(), Some("x:root"));
        assert_eq!(doc.descendants(id).count(), 2);
    }

    #[test]
    fn test_rename() {
        let (mut doc, root) = doc_with_root("before");
        assert!(doc.rename(root, "after").is_ok());
        assert_eq!(doc.node_name(root), Some("after"));
        assert_eq!(doc.rename(root, ""), Err(TreeError::EmptyName));
        assert_eq!(doc.node_name(root), Some("after"));
    }

    #[test]
    fn test_set_prefix() {
        let (mut doc, root) = doc_with_root("rect");
        assert!(doc.set_prefix(root, Some("svg")).is_ok());
        assert_eq!(doc.qualified_name(root).as_deref(), Some("svg:rect"));
        assert!(doc.set_prefix(root, None).is_ok());
        assert_eq!(doc.node_prefix(root), None);
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let (mut doc, root) = doc_with_root("p");
        let Ok(text) = doc.create_text("hello ") else {
            panic!("valid text");
        };
        let b = element(&mut doc, "b");
        let Ok(b_text) = doc.create_text("world") else {
            panic!("valid text");
        };
        assert!(doc.append_child(root, text).is_ok());
        assert!(doc.append_child(root, b).is_ok());
        assert!(doc.append_child(b, b_text).is_ok());

        let desc: Vec<NodeId> = doc.descendants(root).collect();
        assert_eq!(desc, vec![text, b, b_text]);
        let anc: Vec<NodeId> = doc.ancestors(b_text).collect();
        assert_eq!(anc, vec![b_text, b, root, doc.root()]);
    }

    #[test]
    fn test_create_rejects_markup_terminators() {
        let mut doc = Document::new();
        let before = doc.node_count();
        for result in [
            doc.create_comment("a--b"),
            doc.create_comment("trailing-"),
            doc.create_cdata("a]]>b"),
            doc.create_pi("t", Some("x?><evil/><?y")),
        ] {
            let Err(err) = result else {
                panic!("terminator should be rejected");
            };
            assert_eq!(err.kind(), ErrorKind::EscapeFailure);
        }
        assert_eq!(doc.node_count(), before);
        assert!(doc.create_pi("target", Some("data")).is_ok());
    }

    #[test]
    fn test_dropping_document_releases_detached_nodes() {
        let mut doc = Document::new();
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        assert!(doc.append_child(a, b).is_ok());
        assert_eq!(doc.node_count(), 3);
        drop(doc);
    }
}
