//! State tree node and its hashing rules

use crate::model::{Attributes, Hash, KeySegment, PathKey};
use std::collections::BTreeMap;

const RESOURCE_DOMAIN: &[u8] = b"fabric_sync/resource/v1";
const SUBTREE_DOMAIN: &[u8] = b"fabric_sync/subtree/v1";

/// A node in a structured state tree
///
/// A node is either a real resource (it was upserted at its key) or a
/// placeholder that only exists because a descendant needs it as an
/// ancestor. Placeholders carry `Hash::ZERO` as their content hash.
#[derive(Clone, Debug)]
pub struct StateNode {
    key: PathKey,
    attributes: Attributes,
    content_hash: Hash,
    subtree_hash: Hash,
    placeholder: bool,
    pub(crate) children: BTreeMap<KeySegment, StateNode>,
}

impl StateNode {
    /// Create a placeholder with no children
    pub(crate) fn placeholder(key: PathKey) -> Self {
        let mut node = StateNode {
            key,
            attributes: Attributes::new(),
            content_hash: Hash::ZERO,
            subtree_hash: Hash::ZERO,
            placeholder: true,
            children: BTreeMap::new(),
        };
        node.rehash();
        node
    }

    pub fn key(&self) -> &PathKey {
        &self.key
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn content_hash(&self) -> Hash {
        self.content_hash
    }

    pub fn subtree_hash(&self) -> Hash {
        self.subtree_hash
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn children(&self) -> impl Iterator<Item = &StateNode> {
        self.children.values()
    }

    pub fn child(&self, segment: &KeySegment) -> Option<&StateNode> {
        self.children.get(segment)
    }

    /// Turn this node into a real resource carrying `attributes`.
    /// The caller is responsible for rehashing ancestors.
    pub(crate) fn set_resource(&mut self, attributes: Attributes) {
        self.content_hash = content_digest(&attributes);
        self.attributes = attributes;
        self.placeholder = false;
        self.rehash();
    }

    /// Demote this node back to a placeholder
    pub(crate) fn clear_resource(&mut self) {
        self.attributes.clear();
        self.content_hash = Hash::ZERO;
        self.placeholder = true;
        self.rehash();
    }

    /// Recompute `subtree_hash` from the content hash and the children's
    /// subtree hashes. Children must already be up to date.
    pub(crate) fn rehash(&mut self) {
        let flag = [self.placeholder as u8];
        let mut parts: Vec<&[u8]> = Vec::with_capacity(3 + self.children.len() * 3);
        parts.push(SUBTREE_DOMAIN);
        parts.push(self.content_hash.as_bytes());
        parts.push(&flag);
        for (segment, child) in &self.children {
            parts.push(segment.type_tag.as_bytes());
            parts.push(segment.value.as_bytes());
            parts.push(child.subtree_hash.as_bytes());
        }
        self.subtree_hash = Hash::digest_many(&parts);
    }
}

/// Digest over a resource's non-identity attributes.
///
/// Values are rendered as compact JSON; object keys inside values are
/// already sorted, so equal attribute sets always hash the same.
pub(crate) fn content_digest(attributes: &Attributes) -> Hash {
    let rendered: Vec<(&str, String)> = attributes
        .iter()
        .map(|(name, value)| (name.as_str(), value.to_string()))
        .collect();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(1 + rendered.len() * 2);
    parts.push(RESOURCE_DOMAIN);
    for (name, value) in &rendered {
        parts.push(name.as_bytes());
        parts.push(value.as_bytes());
    }
    Hash::digest_many(&parts)
}
