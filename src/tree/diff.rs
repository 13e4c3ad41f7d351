//! Hash-pruned diff between two state trees

use super::node::StateNode;
use super::tree::StructuredStateTree;
use crate::model::PathKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Keys that must be created in (`add`) or deleted from (`remove`) the
/// compared tree to match the authoritative one
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    pub add: Vec<PathKey>,
    pub remove: Vec<PathKey>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Work done by a diff walk
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Node positions examined, root included
    pub visited: usize,
}

impl StructuredStateTree {
    /// Keys to add to / remove from `other` so that it matches `self`.
    ///
    /// `self` is authoritative, so swapping the arguments is not the
    /// inverse operation in general. Identical subtrees are pruned by
    /// subtree hash; placeholders are never reported; a node whose own
    /// attributes differ is not reported either, only its descendants are
    /// compared.
    pub fn diff(&self, other: &StructuredStateTree) -> TreeDiff {
        self.diff_with_stats(other).0
    }

    /// Same as [`diff`](Self::diff), also returning how many node positions
    /// the walk examined
    pub fn diff_with_stats(&self, other: &StructuredStateTree) -> (TreeDiff, DiffStats) {
        let mut result = TreeDiff::default();
        let mut stats = DiffStats::default();
        diff_nodes(Some(self.root()), Some(other.root()), &mut result, &mut stats);
        (result, stats)
    }
}

fn diff_nodes(
    mine: Option<&StateNode>,
    theirs: Option<&StateNode>,
    result: &mut TreeDiff,
    stats: &mut DiffStats,
) {
    match (mine, theirs) {
        (None, None) => {}
        (Some(node), None) => collect_present(node, &mut result.add, stats),
        (None, Some(node)) => collect_present(node, &mut result.remove, stats),
        (Some(mine), Some(theirs)) => {
            stats.visited += 1;
            if mine.subtree_hash() == theirs.subtree_hash() {
                return;
            }
            let segments: BTreeSet<_> = mine
                .children
                .keys()
                .chain(theirs.children.keys())
                .collect();
            for segment in segments {
                diff_nodes(
                    mine.child(segment),
                    theirs.child(segment),
                    result,
                    stats,
                );
            }
        }
    }
}

/// Record every real node of a one-sided subtree
fn collect_present(node: &StateNode, out: &mut Vec<PathKey>, stats: &mut DiffStats) {
    stats.visited += 1;
    if !node.is_placeholder() {
        out.push(node.key().clone());
    }
    for child in node.children() {
        collect_present(child, out, stats);
    }
}
