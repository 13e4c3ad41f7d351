//! Per-tenant structured hash tree

use super::node::StateNode;
use crate::model::{Attributes, Hash, PathKey};
use crate::{Error, Result};

/// A tree of state nodes addressed by path keys
///
/// The root is a permanent placeholder at the empty key. Every mutation
/// rehashes only the nodes on the path from the touched node up to the
/// root, so the root's subtree hash always summarizes the whole tenant.
#[derive(Clone, Debug)]
pub struct StructuredStateTree {
    root: StateNode,
}

impl StructuredStateTree {
    /// Create an empty tree
    pub fn new() -> Self {
        StructuredStateTree {
            root: StateNode::placeholder(PathKey::root()),
        }
    }

    /// Build a tree from `(key, attributes)` entries
    pub fn from_entries(entries: impl IntoIterator<Item = (PathKey, Attributes)>) -> Result<Self> {
        let mut tree = StructuredStateTree::new();
        for (key, attributes) in entries {
            tree.upsert(&key, attributes)?;
        }
        Ok(tree)
    }

    pub fn root(&self) -> &StateNode {
        &self.root
    }

    /// Digest of the whole tree, `Hash::ZERO` when the tree is empty
    pub fn root_hash(&self) -> Hash {
        if self.is_empty() {
            Hash::ZERO
        } else {
            self.root.subtree_hash()
        }
    }

    /// True when no node is left under the root (a drained tenant)
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Number of real (non-placeholder) nodes
    pub fn len(&self) -> usize {
        fn count(node: &StateNode) -> usize {
            let own = usize::from(!node.is_placeholder());
            own + node.children().map(count).sum::<usize>()
        }
        self.root.children().map(count).sum()
    }

    /// Create or update the node at `key`, creating placeholder ancestors
    /// as needed. Re-upserting identical attributes changes no hash.
    pub fn upsert(&mut self, key: &PathKey, attributes: Attributes) -> Result<()> {
        if key.is_empty() {
            return Err(Error::MalformedKey("cannot upsert the root key".into()));
        }
        upsert_at(&mut self.root, key, 0, attributes);
        Ok(())
    }

    /// Remove the resource at `key`.
    ///
    /// A node that still has children is demoted to a placeholder. Any
    /// ancestor left as a childless placeholder is dropped. Returns whether
    /// anything changed; removing a missing key is a no-op.
    pub fn remove(&mut self, key: &PathKey) -> bool {
        if key.is_empty() {
            return false;
        }
        remove_at(&mut self.root, key, 0)
    }

    /// Look up a node, placeholders included
    pub fn get(&self, key: &PathKey) -> Option<&StateNode> {
        let mut node = &self.root;
        for segment in key.segments() {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// True when a real resource exists at `key`
    pub fn contains(&self, key: &PathKey) -> bool {
        self.get(key).is_some_and(|n| !n.is_placeholder())
    }

    /// All real keys in depth-first key order
    pub fn keys(&self) -> Vec<PathKey> {
        self.entries().into_iter().map(|(key, _)| key).collect()
    }

    /// All real nodes as `(key, attributes)` in depth-first key order
    pub fn entries(&self) -> Vec<(PathKey, Attributes)> {
        fn walk(node: &StateNode, out: &mut Vec<(PathKey, Attributes)>) {
            if !node.is_placeholder() {
                out.push((node.key().clone(), node.attributes().clone()));
            }
            for child in node.children() {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }
}

impl Default for StructuredStateTree {
    fn default() -> Self {
        StructuredStateTree::new()
    }
}

fn upsert_at(node: &mut StateNode, key: &PathKey, depth: usize, attributes: Attributes) {
    let segments = key.segments();
    let segment = &segments[depth];
    let child = node
        .children
        .entry(segment.clone())
        .or_insert_with(|| StateNode::placeholder(PathKey::new(segments[..=depth].to_vec())));

    if depth + 1 == segments.len() {
        child.set_resource(attributes);
    } else {
        upsert_at(child, key, depth + 1, attributes);
    }
    node.rehash();
}

fn remove_at(node: &mut StateNode, key: &PathKey, depth: usize) -> bool {
    let segments = key.segments();
    let segment = &segments[depth];
    let Some(child) = node.children.get_mut(segment) else {
        return false;
    };

    let changed = if depth + 1 == segments.len() {
        if child.is_placeholder() {
            false
        } else {
            child.clear_resource();
            true
        }
    } else {
        remove_at(child, key, depth + 1)
    };

    if changed {
        if child.is_placeholder() && child.children.is_empty() {
            node.children.remove(segment);
        }
        node.rehash();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(pairs: &[(&str, &str)]) -> PathKey {
        PathKey::from_pairs(pairs.iter().copied())
    }

    fn attrs(name: &str, value: serde_json::Value) -> Attributes {
        let mut a = Attributes::new();
        a.insert(name.to_string(), value);
        a
    }

    #[test]
    fn test_upsert_creates_placeholder_ancestors() {
        let mut tree = StructuredStateTree::new();
        let deep = key(&[("Tenant", "t1"), ("BridgeDomain", "bd1"), ("Subnet", "10.0.0.1/24")]);
        tree.upsert(&deep, Attributes::new()).unwrap();

        assert!(tree.contains(&deep));
        assert_eq!(tree.len(), 1);

        let bd = tree.get(&key(&[("Tenant", "t1"), ("BridgeDomain", "bd1")])).unwrap();
        assert!(bd.is_placeholder());
        let tenant = tree.get(&key(&[("Tenant", "t1")])).unwrap();
        assert!(tenant.is_placeholder());
        assert!(!tree.contains(tenant.key()));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut tree = StructuredStateTree::new();
        let k = key(&[("L3Outside", "o1")]);
        tree.upsert(&k, attrs("vrf_name", json!("ctx1"))).unwrap();
        let before = tree.root_hash();

        tree.upsert(&k, attrs("vrf_name", json!("ctx1"))).unwrap();
        assert_eq!(tree.root_hash(), before);

        tree.upsert(&k, attrs("vrf_name", json!("ctx2"))).unwrap();
        assert_ne!(tree.root_hash(), before);
    }

    #[test]
    fn test_hash_independent_of_insert_order() {
        let a = key(&[("L3Outside", "o1")]);
        let b = key(&[("L3Outside", "o1"), ("ExternalNetwork", "inet1")]);
        let c = key(&[("VRF", "ctx1")]);

        let mut t1 = StructuredStateTree::new();
        t1.upsert(&a, Attributes::new()).unwrap();
        t1.upsert(&b, Attributes::new()).unwrap();
        t1.upsert(&c, Attributes::new()).unwrap();

        let mut t2 = StructuredStateTree::new();
        t2.upsert(&c, Attributes::new()).unwrap();
        t2.upsert(&b, Attributes::new()).unwrap();
        t2.upsert(&a, Attributes::new()).unwrap();

        assert_eq!(t1.root_hash(), t2.root_hash());
    }

    #[test]
    fn test_remove_prunes_placeholder_ancestors() {
        let mut tree = StructuredStateTree::new();
        let deep = key(&[("Tenant", "t1"), ("BridgeDomain", "bd1"), ("Subnet", "s1")]);
        tree.upsert(&deep, Attributes::new()).unwrap();

        assert!(tree.remove(&deep));
        assert!(tree.is_empty());
        assert_eq!(tree.root_hash(), Hash::ZERO);
        assert!(tree.get(&key(&[("Tenant", "t1")])).is_none());
    }

    #[test]
    fn test_remove_keeps_real_ancestor() {
        let mut tree = StructuredStateTree::new();
        let parent = key(&[("L3Outside", "o1")]);
        let child = key(&[("L3Outside", "o1"), ("ExternalNetwork", "inet1")]);
        tree.upsert(&parent, Attributes::new()).unwrap();
        let parent_only = tree.root_hash();
        tree.upsert(&child, Attributes::new()).unwrap();

        assert!(tree.remove(&child));
        assert!(tree.contains(&parent));
        assert_eq!(tree.root_hash(), parent_only);
    }

    #[test]
    fn test_remove_with_children_demotes_to_placeholder() {
        let mut tree = StructuredStateTree::new();
        let parent = key(&[("L3Outside", "o1")]);
        let child = key(&[("L3Outside", "o1"), ("ExternalNetwork", "inet1")]);
        tree.upsert(&parent, attrs("descr", json!("x"))).unwrap();
        tree.upsert(&child, Attributes::new()).unwrap();

        assert!(tree.remove(&parent));
        assert!(!tree.contains(&parent));
        assert!(tree.get(&parent).unwrap().is_placeholder());
        assert!(tree.contains(&child));

        let expected = StructuredStateTree::from_entries([(child, Attributes::new())]).unwrap();
        assert_eq!(tree.root_hash(), expected.root_hash());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut tree = StructuredStateTree::new();
        tree.upsert(&key(&[("VRF", "ctx1")]), Attributes::new()).unwrap();
        let before = tree.root_hash();

        assert!(!tree.remove(&key(&[("VRF", "ctx2")])));
        assert!(!tree.remove(&key(&[("VRF", "ctx1"), ("Subnet", "s")])));
        assert!(!tree.remove(&PathKey::root()));
        assert_eq!(tree.root_hash(), before);
    }

    #[test]
    fn test_remove_placeholder_key_is_noop() {
        let mut tree = StructuredStateTree::new();
        let deep = key(&[("Tenant", "t1"), ("VRF", "ctx1")]);
        tree.upsert(&deep, Attributes::new()).unwrap();
        let before = tree.root_hash();

        assert!(!tree.remove(&key(&[("Tenant", "t1")])));
        assert_eq!(tree.root_hash(), before);
    }

    #[test]
    fn test_upsert_root_key_rejected() {
        let mut tree = StructuredStateTree::new();
        assert!(matches!(
            tree.upsert(&PathKey::root(), Attributes::new()),
            Err(Error::MalformedKey(_))
        ));
    }

    #[test]
    fn test_keys_and_entries_skip_placeholders() {
        let mut tree = StructuredStateTree::new();
        let deep = key(&[("Tenant", "t1"), ("VRF", "ctx1")]);
        tree.upsert(&deep, attrs("descr", json!("vrf"))).unwrap();

        assert_eq!(tree.keys(), vec![deep.clone()]);
        let entries = tree.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.get("descr"), Some(&json!("vrf")));
    }
}
