#![forbid(unsafe_code)]

//! NodeSet type for document-subset canonicalization.
//!
//! A `NodeSet` is the set of nodes a reference selects, identified by their
//! `NodeId`.  It supports the two operations a same-document reference
//! needs: selecting a subtree and subtracting the enveloped signature.

use roxmltree::{Node, NodeId};
use std::collections::HashSet;

/// A set of XML document nodes identified by `NodeId`.
#[derive(Debug, Clone)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// Create a node set for the subtree rooted at `root`, leaving out
    /// comment nodes.  `#id` references select exactly this set.
    pub fn tree_without_comments(root: Node<'_, '_>) -> Self {
        Self {
            nodes: root
                .descendants()
                .filter(|n| !n.is_comment())
                .map(|n| n.id())
                .collect(),
        }
    }

    /// Create a node set for the subtree rooted at `root`, comments included.
    pub fn tree_with_comments(root: Node<'_, '_>) -> Self {
        Self {
            nodes: root.descendants().map(|n| n.id()).collect(),
        }
    }

    /// Check whether the node set contains a node.
    pub fn contains(&self, node: &Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    /// Remove `root` and all of its descendants.
    pub fn remove_subtree(&mut self, root: Node<'_, '_>) {
        for n in root.descendants() {
            self.nodes.remove(&n.id());
        }
    }
}
