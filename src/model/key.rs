//! Path keys addressing nodes of a state tree

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Separator between type-tag and identity value in a segment's textual form
pub const SEGMENT_SEPARATOR: char = '|';

/// Stable external identifier of a tenant
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        TenantId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId(s)
    }
}

impl From<&TenantId> for TenantId {
    fn from(id: &TenantId) -> Self {
        id.clone()
    }
}

/// One level of a path key: `(type-tag, identity-value)`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeySegment {
    pub type_tag: String,
    pub value: String,
}

impl KeySegment {
    pub fn new(type_tag: impl Into<String>, value: impl Into<String>) -> Self {
        KeySegment {
            type_tag: type_tag.into(),
            value: value.into(),
        }
    }

    /// Parse the `"<type-tag>|<identity-value>"` form.
    ///
    /// The split happens at the first separator, so identity values may
    /// themselves contain `|`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once(SEGMENT_SEPARATOR) {
            Some((tag, value)) if !tag.is_empty() => Ok(KeySegment::new(tag, value)),
            _ => Err(Error::MalformedKey(text.to_string())),
        }
    }

    /// Render the `"<type-tag>|<identity-value>"` form
    pub fn to_text(&self) -> String {
        format!("{}{}{}", self.type_tag, SEGMENT_SEPARATOR, self.value)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.type_tag, SEGMENT_SEPARATOR, self.value)
    }
}

/// Ordered sequence of segments from root ancestor to leaf.
///
/// The empty key addresses the tree's root.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathKey(Vec<KeySegment>);

impl PathKey {
    pub fn root() -> Self {
        PathKey(Vec::new())
    }

    pub fn new(segments: Vec<KeySegment>) -> Self {
        PathKey(segments)
    }

    /// Build a key from `(type-tag, value)` pairs
    pub fn from_pairs<T, V>(pairs: impl IntoIterator<Item = (T, V)>) -> Self
    where
        T: Into<String>,
        V: Into<String>,
    {
        PathKey(
            pairs
                .into_iter()
                .map(|(t, v)| KeySegment::new(t, v))
                .collect(),
        )
    }

    /// Parse a key from its per-segment textual form
    pub fn parse<S: AsRef<str>>(segments: &[S]) -> Result<Self> {
        segments
            .iter()
            .map(|s| KeySegment::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(PathKey)
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(KeySegment::to_text).collect()
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&KeySegment> {
        self.0.last()
    }

    /// Key of the direct ancestor, `None` for the root
    pub fn parent(&self) -> Option<PathKey> {
        if self.0.is_empty() {
            None
        } else {
            Some(PathKey(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Key extended by one segment
    pub fn child(&self, segment: KeySegment) -> PathKey {
        let mut segments = self.0.clone();
        segments.push(segment);
        PathKey(segments)
    }

    pub fn starts_with(&self, prefix: &PathKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, "]")
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_strings().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PathKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let segments = Vec::<String>::deserialize(deserializer)?;
        PathKey::parse(&segments).map_err(serde::de::Error::custom)
    }
}

/// A path key together with the tenant whose tree it addresses
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopedKey {
    pub tenant: TenantId,
    pub key: PathKey,
}

impl ScopedKey {
    pub fn new(tenant: impl Into<TenantId>, key: PathKey) -> Self {
        ScopedKey {
            tenant: tenant.into(),
            key,
        }
    }
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.key)
    }
}
