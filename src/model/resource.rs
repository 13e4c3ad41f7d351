//! Fabric resources as seen by the reconciliation core

use super::key::{PathKey, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Non-identity attributes of a resource, kept sorted for stable hashing
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Identity of a resource within its tenant: kind plus identity values
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    pub tenant: TenantId,
    pub kind: String,
    pub identity: BTreeMap<String, String>,
}

/// A fabric object: a type tag, its identity attributes and whatever
/// other attributes are known.
///
/// A resource with no non-identity attributes is a *skeleton*; it is still
/// enough to address the object for deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub tenant: TenantId,
    pub kind: String,
    #[serde(default)]
    pub identity: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: Attributes,
    /// Key this resource was resolved from, kept so that resources of
    /// unregistered kinds can still be located in a tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<PathKey>,
}

impl Resource {
    pub fn new(tenant: impl Into<TenantId>, kind: impl Into<String>) -> Self {
        Resource {
            tenant: tenant.into(),
            kind: kind.into(),
            identity: BTreeMap::new(),
            attributes: Attributes::new(),
            source_key: None,
        }
    }

    /// Set an identity attribute
    pub fn with_identity(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.identity.insert(name.into(), value.into());
        self
    }

    /// Set a non-identity attribute
    pub fn with_attr(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn identity_value(&self, name: &str) -> Option<&str> {
        self.identity.get(name).map(String::as_str)
    }

    pub fn is_skeleton(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Copy of this resource with every non-identity attribute dropped
    pub fn skeleton(&self) -> Resource {
        Resource {
            tenant: self.tenant.clone(),
            kind: self.kind.clone(),
            identity: self.identity.clone(),
            attributes: Attributes::new(),
            source_key: self.source_key.clone(),
        }
    }

    pub fn id(&self) -> ResourceId {
        ResourceId {
            tenant: self.tenant.clone(),
            kind: self.kind.clone(),
            identity: self.identity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_skeleton() {
        let res = Resource::new("t1", "L3Outside")
            .with_identity("name", "o1")
            .with_attr("vrf_name", "ctx1");

        assert!(!res.is_skeleton());
        assert_eq!(res.identity_value("name"), Some("o1"));

        let skel = res.skeleton();
        assert!(skel.is_skeleton());
        assert_eq!(skel.id(), res.id());
    }

    #[test]
    fn test_json_defaults() {
        let res: Resource =
            serde_json::from_str(r#"{"tenant":"t1","kind":"Tenant","identity":{"name":"t1"}}"#)
                .unwrap();
        assert!(res.is_skeleton());
        assert_eq!(res.tenant, TenantId::new("t1"));
    }
}
