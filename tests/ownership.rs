//! Ownership state transitions through the public API.
//!
//! Every node is either detached or attached, attached exactly when it has a
//! parent slot, and reachable from the document node exactly when it sits
//! under the root element chain.

#![allow(clippy::unwrap_used)]

use xmlnest::{Document, Element, ErrorKind, NodeId, NodeState, TreeError};

fn catalog() -> (Document, NodeId, Vec<NodeId>) {
    let mut doc = Document::new();
    let root = doc.create_element(None, "catalog").unwrap();
    doc.set_root(root).unwrap();
    let mut items = Vec::new();
    for (id, fruit) in [("1", "Apple"), ("2", "Pear")] {
        let item = doc.create_element(None, "item").unwrap();
        doc.set_property(item, "id", id).unwrap();
        doc.set_content(item, fruit).unwrap();
        doc.append_child(root, item).unwrap();
        items.push(item);
    }
    (doc, root, items)
}

/// Checks that the attached flag agrees with having a parent for every live
/// node, and that everything reachable from the document node is attached.
fn assert_ownership_consistent(doc: &Document) {
    for id in doc.descendants(doc.root()) {
        assert_eq!(doc.state(id), Ok(NodeState::Attached), "{id} is reachable");
        assert!(doc.is_in_tree(id));
    }
}

// ---------------------------------------------------------------------------
// Creation and root handling
// ---------------------------------------------------------------------------

#[test]
fn test_created_nodes_are_detached_until_attached() {
    let mut doc = Document::new();
    let node = doc.create_element(None, "lonely").unwrap();
    assert_eq!(doc.state(node), Ok(NodeState::Detached));
    assert!(doc.descendants(doc.root()).all(|id| id != node));
}

#[test]
fn test_create_node_empty_name_is_invalid_argument() {
    let mut doc = Document::new();
    let err = doc.create_element(None, "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(Element::new(None, "").unwrap_err(), TreeError::EmptyName);
}

#[test]
fn test_set_root_requires_detached_node() {
    let (mut doc, root, items) = catalog();
    let err = doc.set_root(items[0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyAttached);
    assert_eq!(doc.root_element(), Some(root));
    assert_eq!(doc.parent(items[0]), Some(root));
}

#[test]
fn test_set_root_on_detached_subtree_root() {
    let (mut doc, _, items) = catalog();
    let moved = doc.detach(items[1]).unwrap();
    doc.set_root(moved).unwrap();
    assert_eq!(doc.root_element(), Some(moved));
    assert_eq!(doc.content(moved).as_deref(), Some("Pear"));
    assert!(!doc.contains(items[0]));
    assert_ownership_consistent(&doc);
}

// ---------------------------------------------------------------------------
// appendChild
// ---------------------------------------------------------------------------

#[test]
fn test_find_all_after_building_catalog() {
    let (doc, root, items) = catalog();
    assert_eq!(doc.find_all_by_name(root, "item", true).unwrap(), items);
    assert_ownership_consistent(&doc);
}

#[test]
fn test_append_attached_child_fails_without_mutating_either_parent() {
    let (mut doc, root, items) = catalog();
    let other = doc.create_element(None, "other").unwrap();

    let err = doc.append_child(other, items[0]).unwrap_err();
    assert_eq!(err, TreeError::AlreadyAttached(items[0]));
    assert_eq!(err.kind(), ErrorKind::AlreadyAttached);

    assert_eq!(doc.children(root).collect::<Vec<_>>(), items);
    assert_eq!(doc.children(other).count(), 0);
    assert_eq!(doc.state(other), Ok(NodeState::Detached));
}

#[test]
fn test_append_root_element_under_child_is_rejected() {
    let (mut doc, root, items) = catalog();
    assert_eq!(
        doc.append_child(items[0], root).unwrap_err().kind(),
        ErrorKind::AlreadyAttached
    );
    assert_ownership_consistent(&doc);
}

#[test]
fn test_detached_subtree_built_then_attached() {
    let (mut doc, root, _) = catalog();
    let group = doc.create_element(None, "group").unwrap();
    let leaf = doc.create_element(None, "leaf").unwrap();
    doc.append_child(group, leaf).unwrap();
    assert!(!doc.is_in_tree(leaf));

    doc.append_child(root, group).unwrap();
    assert!(doc.is_in_tree(leaf));
    assert_ownership_consistent(&doc);
}

// ---------------------------------------------------------------------------
// unlink
// ---------------------------------------------------------------------------

#[test]
fn test_unlink_keep_then_reparent() {
    let (mut doc, root, items) = catalog();
    let shelf = doc.create_element(None, "shelf").unwrap();
    doc.append_child(root, shelf).unwrap();

    let pear = doc.unlink(items[1], false).unwrap().unwrap();
    assert_eq!(doc.state(pear), Ok(NodeState::Detached));
    doc.append_child(shelf, pear).unwrap();

    assert_eq!(doc.find_all_by_name(shelf, "item", true).unwrap(), vec![pear]);
    assert_eq!(
        doc.find_all_by_name(root, "item", true).unwrap(),
        vec![items[0]]
    );
    assert_eq!(doc.content(pear).as_deref(), Some("Pear"));
    assert_ownership_consistent(&doc);
}

#[test]
fn test_unlink_destroy_then_lookup_not_found() {
    let (mut doc, root, items) = catalog();
    assert_eq!(doc.unlink(items[0], true).unwrap(), None);

    let found = doc.find_all_by_name(root, "item", true).unwrap();
    assert_eq!(found, vec![items[1]]);
    assert!(!found.contains(&items[0]));

    // The destroyed handle is rejected rather than reaching freed memory.
    assert_eq!(
        doc.append_child(root, items[0]).unwrap_err(),
        TreeError::UnknownNode(items[0])
    );
    assert_eq!(doc.property(items[0], "id"), None);
    assert_ownership_consistent(&doc);
}

#[test]
fn test_destroyed_slots_are_reused_without_aliasing() {
    let (mut doc, root, items) = catalog();
    let before = doc.node_count();
    doc.remove(items[0]).unwrap();
    assert_eq!(doc.node_count(), before - 2);

    let fresh = doc.create_element(None, "fresh").unwrap();
    doc.append_child(root, fresh).unwrap();
    assert_ne!(fresh, items[0]);
    assert!(!doc.contains(items[0]));
}

// ---------------------------------------------------------------------------
// Moving subtrees between documents
// ---------------------------------------------------------------------------

#[test]
fn test_take_and_append_element_across_documents() {
    let (mut src, _, items) = catalog();
    let apple = src.take(items[0]).unwrap();
    assert_eq!(apple.property("id"), Some("1"));

    let mut dst = Document::new();
    let basket = dst.set_root_element(Element::new(None, "basket").unwrap());
    let moved = dst.append_element(basket, apple).unwrap();
    assert_eq!(dst.content(moved).as_deref(), Some("Apple"));
    assert_ownership_consistent(&dst);

    // Handles from the source document mean nothing here.
    assert!(!dst.contains(items[1]));
}

#[test]
fn test_change_name() {
    let (mut doc, root, items) = catalog();
    doc.rename(items[0], "fruit").unwrap();
    assert_eq!(doc.find_first_by_name(root, "fruit", true).unwrap(), Some(items[0]));
    assert_eq!(doc.rename(items[0], "").unwrap_err().kind(), ErrorKind::InvalidArgument);
}
