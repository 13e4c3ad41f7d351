//! Registry of resource type descriptors

use crate::model::{Resource, TenantId, SEGMENT_SEPARATOR};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One identity attribute and the path segment type it is rendered under
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySegment {
    pub type_tag: String,
    pub attribute: String,
}

/// Describes how a resource type maps onto a path key.
///
/// Identity attributes are listed root-first; each contributes one key
/// segment. The last segment is always tagged with the type's own tag, so
/// a `Subnet` under a bridge domain reads
/// `[BridgeDomain|bd1, Subnet|10.0.0.1/24]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub tag: String,
    pub identity: Vec<IdentitySegment>,
    /// Non-identity attributes the type is known to carry. Informational
    /// only: resources are never checked against this list.
    #[serde(default)]
    pub other_attributes: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(tag: impl Into<String>) -> Self {
        ResourceDescriptor {
            tag: tag.into(),
            identity: Vec::new(),
            other_attributes: Vec::new(),
        }
    }

    /// Append an identity attribute rendered under an ancestor's tag
    pub fn parent(mut self, type_tag: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.identity.push(IdentitySegment {
            type_tag: type_tag.into(),
            attribute: attribute.into(),
        });
        self
    }

    /// Append an identity attribute rendered under this type's own tag
    pub fn own(self, attribute: impl Into<String>) -> Self {
        let tag = self.tag.clone();
        self.parent(tag, attribute)
    }

    pub fn attrs(mut self, names: &[&str]) -> Self {
        self.other_attributes
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn identity_attributes(&self) -> impl Iterator<Item = &str> {
        self.identity.iter().map(|s| s.attribute.as_str())
    }

    /// Construct a skeleton from identity values in declaration order
    pub fn build(&self, tenant: impl Into<TenantId>, values: &[String]) -> Result<Resource> {
        if values.len() != self.identity.len() {
            return Err(Error::InvalidResource(format!(
                "{} takes {} identity values, got {}",
                self.tag,
                self.identity.len(),
                values.len()
            )));
        }
        let mut resource = Resource::new(tenant, self.tag.clone());
        for (segment, value) in self.identity.iter().zip(values) {
            resource
                .identity
                .insert(segment.attribute.clone(), value.clone());
        }
        Ok(resource)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(Error::Config(format!("type {}: {}", self.tag, reason)));

        if self.tag.is_empty() || self.tag.contains(SEGMENT_SEPARATOR) {
            return invalid("tag must be non-empty and free of '|'".into());
        }
        match self.identity.last() {
            None => return invalid("identity list is empty".into()),
            Some(last) if last.type_tag != self.tag => {
                return invalid(format!("last segment is tagged {}", last.type_tag));
            }
            Some(_) => {}
        }
        let mut seen = BTreeSet::new();
        for segment in &self.identity {
            if segment.type_tag.is_empty() || segment.type_tag.contains(SEGMENT_SEPARATOR) {
                return invalid(format!("bad segment tag '{}'", segment.type_tag));
            }
            if !seen.insert(segment.attribute.as_str()) {
                return invalid(format!("duplicate identity attribute {}", segment.attribute));
            }
        }
        Ok(())
    }
}

/// Maps type-tags to descriptors; populated once at startup
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    descriptors: BTreeMap<String, ResourceDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Registry preloaded with the builtin fabric catalog
    pub fn builtin() -> Self {
        let mut registry = TypeRegistry::new();
        for descriptor in super::catalog::builtin_descriptors() {
            registry
                .descriptors
                .insert(descriptor.tag.clone(), descriptor);
        }
        registry
    }

    /// Add a descriptor; duplicate tags and malformed descriptors are
    /// configuration errors
    pub fn register(&mut self, descriptor: ResourceDescriptor) -> Result<()> {
        descriptor.validate()?;
        if self.descriptors.contains_key(&descriptor.tag) {
            return Err(Error::Config(format!(
                "type {} registered twice",
                descriptor.tag
            )));
        }
        self.descriptors.insert(descriptor.tag.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.get(tag)
    }

    /// Like [`get`](Self::get) but fails with `UnknownResourceType`
    pub fn resolve(&self, tag: &str) -> Result<&ResourceDescriptor> {
        self.get(tag)
            .ok_or_else(|| Error::UnknownResourceType(tag.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
