//! Structured hash trees for per-tenant fabric state
//!
//! Each tenant's state is a tree of nodes addressed by path keys where:
//! - A node's content hash covers its own non-identity attributes
//! - A node's subtree hash covers its content hash and all descendants
//! - Equal subtree hashes let the diff skip whole subtrees

mod diff;
mod forest;
mod node;
#[allow(clippy::module_inception)]
mod tree;

pub use diff::{DiffStats, TreeDiff};
pub use forest::StateForest;
pub use node::StateNode;
pub use tree::StructuredStateTree;
