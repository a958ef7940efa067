// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Key-addressed edits applied in place to a node tree.
//!
//! Misses are reported as `None`/`false`, never as errors.

use crate::{Child, ChildAttr, Node};

/// Depth-first search (root included) for the first node whose key is `key`.
///
/// `children` is always searched; `extra` adds the other named arrays.
pub fn find_by_key<'a>(root: &'a Node, key: &str, extra: &[ChildAttr]) -> Option<&'a Node> {
    if root.key.as_deref() == Some(key) {
        return Some(root);
    }
    root.child_nodes(extra)
        .find_map(|child| find_by_key(child, key, extra))
}

/// Mutable variant of [`find_by_key`].
pub fn find_by_key_mut<'a>(
    root: &'a mut Node,
    key: &str,
    extra: &[ChildAttr],
) -> Option<&'a mut Node> {
    if root.key.as_deref() == Some(key) {
        return Some(root);
    }
    root.child_nodes_mut(extra)
        .find_map(|child| find_by_key_mut(child, key, extra))
}

fn find_parent_mut<'a>(
    node: &'a mut Node,
    key: &str,
    extra: &[ChildAttr],
) -> Option<&'a mut Node> {
    if node.has_child_key(key, extra) {
        return Some(node);
    }
    node.child_nodes_mut(extra)
        .find_map(|child| find_parent_mut(child, key, extra))
}

/// Remove the immediate child of `root` keyed `key` (one level only).
pub fn remove_by_key(root: &mut Node, key: &str, extra: &[ChildAttr]) -> Option<Node> {
    for attr in ChildAttr::ALL {
        if attr != ChildAttr::Children && !extra.contains(&attr) {
            continue;
        }
        let Some(slot) = root.slot_mut(attr) else {
            continue;
        };
        if let Some(pos) = slot.iter().position(|c| c.key() == Some(key)) {
            return slot.remove(pos).into_node();
        }
    }
    None
}

/// Locate the parent of the node keyed `key` anywhere below `root`, then
/// remove it from that parent.
pub fn remove_deep(root: &mut Node, key: &str, extra: &[ChildAttr]) -> Option<Node> {
    let parent = find_parent_mut(root, key, extra)?;
    remove_by_key(parent, key, extra)
}

/// Append `node` to the `children` of the node keyed `parent_key`, or of
/// `root` when no parent is given.
///
/// Returns `true` when the tree changed, `false` when the parent is missing.
pub fn add_node(root: &mut Node, node: Node, parent_key: Option<&str>) -> bool {
    let parent = match parent_key {
        Some(key) => match find_by_key_mut(root, key, &[]) {
            Some(parent) => parent,
            None => return false,
        },
        None => root,
    };
    parent.slot_entry(ChildAttr::Children).push(Child::Node(node));
    true
}

/// For each node: shallow-merge it onto the child of `root[attr]` with the
/// same key (keeping that child in place), or append it when no such child
/// exists.
///
/// Returns `true` when at least one node was applied.
pub fn upsert(root: &mut Node, nodes: impl IntoIterator<Item = Node>, attr: ChildAttr) -> bool {
    let mut changed = false;
    for node in nodes {
        changed = true;
        let slot = root.slot_entry(attr);
        let pos = node
            .key
            .as_deref()
            .and_then(|k| slot.iter().position(|c| c.key() == Some(k)));
        if let Some(i) = pos {
            if let Some(existing) = slot[i].as_node_mut() {
                existing.merge_from(node);
                continue;
            }
        }
        slot.push(Child::Node(node));
    }
    changed
}

/// Shallow-merge each keyed node onto the node with the same key anywhere in
/// the tree (all child arrays searched). Unkeyed and unmatched nodes are
/// ignored. Returns how many nodes were merged.
pub fn update(root: &mut Node, nodes: impl IntoIterator<Item = Node>) -> usize {
    let mut merged = 0;
    for node in nodes {
        let Some(key) = node.key.clone() else {
            continue;
        };
        if let Some(existing) = find_by_key_mut(root, &key, &ChildAttr::ALL) {
            existing.merge_from(node);
            merged += 1;
        }
    }
    merged
}
