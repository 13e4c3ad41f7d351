//! Resource manager: the persistent resource store seen from the core

use crate::model::{Resource, ResourceId, TenantId};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// Access to the persisted form of resources
///
/// Implementations own their transaction and retry semantics; the core
/// treats every call as atomic and never retries.
pub trait ResourceManager: Send + Sync {
    /// Fetch the persisted copy of the resource identified by `skeleton`.
    ///
    /// Returns `Ok(None)` when nothing is stored, and
    /// `Err(Error::UnknownResourceType)` when the store does not know the
    /// resource's kind.
    fn get(&self, skeleton: &Resource) -> Result<Option<Resource>>;

    /// Create or overwrite a resource
    fn create(&self, resource: &Resource) -> Result<()>;

    /// Delete a resource; deleting a missing resource is not an error
    fn delete(&self, resource: &Resource) -> Result<()>;

    /// Every resource stored for a tenant
    fn list(&self, tenant: &TenantId) -> Result<Vec<Resource>>;
}

/// In-process resource manager backed by a map
#[derive(Debug, Default)]
pub struct InMemoryResourceManager {
    resources: RwLock<BTreeMap<ResourceId, Resource>>,
    /// Kinds this manager pretends not to know
    unsupported: RwLock<BTreeSet<String>>,
    /// Kinds whose every operation fails as a backend outage
    failing: RwLock<BTreeSet<String>>,
}

impl InMemoryResourceManager {
    pub fn new() -> Self {
        InMemoryResourceManager::default()
    }

    /// Make `get` fail with `UnknownResourceType` for `kind`
    pub fn reject_kind(&self, kind: impl Into<String>) {
        self.unsupported.write().insert(kind.into());
    }

    /// Make every operation on `kind` fail with `Error::Store`
    pub fn fail_kind(&self, kind: impl Into<String>) {
        self.failing.write().insert(kind.into());
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    fn check_available(&self, kind: &str) -> Result<()> {
        if self.failing.read().contains(kind) {
            return Err(Error::Store(format!("backend unavailable for {}", kind)));
        }
        Ok(())
    }

    fn check_kind(&self, kind: &str) -> Result<()> {
        self.check_available(kind)?;
        if self.unsupported.read().contains(kind) {
            return Err(Error::UnknownResourceType(kind.to_string()));
        }
        Ok(())
    }
}

impl ResourceManager for InMemoryResourceManager {
    fn get(&self, skeleton: &Resource) -> Result<Option<Resource>> {
        self.check_kind(&skeleton.kind)?;
        Ok(self.resources.read().get(&skeleton.id()).cloned())
    }

    fn create(&self, resource: &Resource) -> Result<()> {
        self.check_kind(&resource.kind)?;
        self.resources
            .write()
            .insert(resource.id(), resource.clone());
        Ok(())
    }

    fn delete(&self, resource: &Resource) -> Result<()> {
        self.check_available(&resource.kind)?;
        self.resources.write().remove(&resource.id());
        Ok(())
    }

    fn list(&self, tenant: &TenantId) -> Result<Vec<Resource>> {
        Ok(self
            .resources
            .read()
            .values()
            .filter(|r| &r.tenant == tenant)
            .cloned()
            .collect())
    }
}
