// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Server-pushed tree edits and the locally held tree they apply to.

use crate::{ops, ChildAttr, Node};

/// One incremental edit pushed by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TreePatch {
    /// Replace the whole tree.
    Set(Node),
    /// Append nodes under `to` (or the root).
    Add {
        /// Nodes to append.
        nodes: Vec<Node>,
        /// Parent key; `None` means the root.
        to: Option<String>,
    },
    /// Shallow-merge nodes onto existing nodes with the same key, anywhere.
    Update {
        /// Keyed partial nodes.
        nodes: Vec<Node>,
    },
    /// Merge-or-append nodes into `attr` of `to` (or the root).
    Upsert {
        /// Candidate nodes.
        nodes: Vec<Node>,
        /// Parent key; `None` means the root.
        to: Option<String>,
        /// Child array to upsert into.
        attr: ChildAttr,
    },
    /// Remove nodes by key, anywhere in the tree.
    Remove {
        /// Keys to remove.
        keys: Vec<String>,
    },
}

/// The locally held tree, with a revision counter bumped on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneTree {
    root: Option<Node>,
    revision: u64,
}

impl SceneTree {
    /// Empty tree (nothing received yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Current root, if a tree has been set.
    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Number of changes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Look a node up by key in every child array.
    pub fn find(&self, key: &str) -> Option<&Node> {
        self.root
            .as_ref()
            .and_then(|root| ops::find_by_key(root, key, &ChildAttr::ALL))
    }

    /// Drop the tree.
    pub fn clear(&mut self) {
        if self.root.take().is_some() {
            self.revision += 1;
        }
    }

    /// Apply one patch in place. Returns `true` when the tree changed.
    ///
    /// Edits other than [`TreePatch::Set`] are no-ops until a tree exists;
    /// unknown keys are skipped.
    pub fn apply(&mut self, patch: TreePatch) -> bool {
        let changed = match patch {
            TreePatch::Set(node) => {
                self.root = Some(node);
                true
            }
            TreePatch::Add { nodes, to } => {
                let Some(root) = self.root.as_mut() else {
                    return false;
                };
                let mut changed = false;
                for node in nodes {
                    changed |= ops::add_node(root, node, to.as_deref());
                }
                changed
            }
            TreePatch::Update { nodes } => {
                let Some(root) = self.root.as_mut() else {
                    return false;
                };
                ops::update(root, nodes) > 0
            }
            TreePatch::Upsert { nodes, to, attr } => {
                let Some(root) = self.root.as_mut() else {
                    return false;
                };
                let target = match to.as_deref() {
                    Some(key) => ops::find_by_key_mut(root, key, &ChildAttr::ALL),
                    None => Some(root),
                };
                match target {
                    Some(target) => ops::upsert(target, nodes, attr),
                    None => false,
                }
            }
            TreePatch::Remove { keys } => {
                let Some(root) = self.root.as_mut() else {
                    return false;
                };
                let mut changed = false;
                for key in &keys {
                    changed |= ops::remove_deep(root, key, &ChildAttr::ALL).is_some();
                }
                changed
            }
        };
        if changed {
            self.revision += 1;
        }
        changed
    }
}
