//! Resource key codec
//!
//! Converts between a resource's type + identity attributes and the path
//! key that addresses it in a state tree, so tree nodes can stand in for
//! resources without materializing them.

mod catalog;
mod registry;

pub use registry::{IdentitySegment, ResourceDescriptor, TypeRegistry};

use crate::model::{KeySegment, PathKey, Resource, TenantId};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of decoding a path key: the resource's type-tag and its identity
/// values in declaration order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedKey {
    pub type_tag: String,
    pub values: Vec<String>,
}

/// Outcome of building a skeleton for a key
#[derive(Clone, Debug, PartialEq)]
pub enum Skeleton {
    /// The type is registered; identity attributes carry their real names
    Known(Resource),
    /// The type is not registered; identity values are named after their
    /// segment tags. Good enough to address the object for deletion.
    UnknownType(Resource),
}

impl Skeleton {
    pub fn into_resource(self) -> Resource {
        match self {
            Skeleton::Known(r) | Skeleton::UnknownType(r) => r,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Skeleton::Known(_))
    }
}

/// Bidirectional mapping between resources and path keys
#[derive(Clone, Debug)]
pub struct ResourceKeyCodec {
    registry: Arc<TypeRegistry>,
}

impl ResourceKeyCodec {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        ResourceKeyCodec { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Derive the path key of a resource.
    ///
    /// Fails with `UnknownResourceType` for unregistered kinds and with
    /// `InvalidResource` when an identity attribute is missing.
    pub fn encode(&self, resource: &Resource) -> Result<PathKey> {
        let descriptor = self.registry.resolve(&resource.kind)?;
        descriptor
            .identity
            .iter()
            .map(|segment| {
                resource
                    .identity_value(&segment.attribute)
                    .map(|value| KeySegment::new(segment.type_tag.clone(), value))
                    .ok_or_else(|| {
                        Error::InvalidResource(format!(
                            "{} is missing identity attribute {}",
                            resource.kind, segment.attribute
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(PathKey::new)
    }

    /// Key of a resource for tree placement: [`encode`](Self::encode), or the
    /// key it was resolved from when its kind is not registered
    pub fn key_for(&self, resource: &Resource) -> Result<PathKey> {
        match self.encode(resource) {
            Err(Error::UnknownResourceType(kind)) => resource
                .source_key
                .clone()
                .ok_or(Error::UnknownResourceType(kind)),
            other => other,
        }
    }

    /// Split a key into its type-tag and identity values
    pub fn decode(&self, key: &PathKey) -> Result<DecodedKey> {
        let last = key
            .last()
            .ok_or_else(|| Error::MalformedKey("empty key".into()))?;
        Ok(DecodedKey {
            type_tag: last.type_tag.clone(),
            values: key.segments().iter().map(|s| s.value.clone()).collect(),
        })
    }

    /// Decode the textual `"<type-tag>|<identity-value>"` form
    pub fn decode_text<S: AsRef<str>>(&self, segments: &[S]) -> Result<DecodedKey> {
        self.decode(&PathKey::parse(segments)?)
    }

    /// Build an identity-only resource for `key`.
    ///
    /// Only a key whose shape contradicts its registered type is an error
    /// (`MalformedKey`); an unregistered type yields
    /// [`Skeleton::UnknownType`].
    pub fn skeleton(&self, tenant: &TenantId, key: &PathKey) -> Result<Skeleton> {
        let decoded = self.decode(key)?;
        let Some(descriptor) = self.registry.get(&decoded.type_tag) else {
            return Ok(Skeleton::UnknownType(generic_skeleton(tenant, key)));
        };

        let shape_matches = descriptor.identity.len() == key.len()
            && descriptor
                .identity
                .iter()
                .zip(key.segments())
                .all(|(expected, actual)| expected.type_tag == actual.type_tag);
        if !shape_matches {
            return Err(Error::MalformedKey(format!(
                "{} does not match the shape of {}",
                key, descriptor.tag
            )));
        }

        descriptor
            .build(tenant.clone(), &decoded.values)
            .map(Skeleton::Known)
    }
}

fn generic_skeleton(tenant: &TenantId, key: &PathKey) -> Resource {
    let kind = key
        .last()
        .map(|s| s.type_tag.clone())
        .unwrap_or_default();
    let mut used = BTreeSet::new();
    let mut resource = Resource::new(tenant.clone(), kind);
    for (i, segment) in key.segments().iter().enumerate() {
        let mut name = segment.type_tag.clone();
        if !used.insert(name.clone()) {
            name = format!("{}_{}", segment.type_tag, i);
            used.insert(name.clone());
        }
        resource.identity.insert(name, segment.value.clone());
    }
    resource.source_key = Some(key.clone());
    resource
}
