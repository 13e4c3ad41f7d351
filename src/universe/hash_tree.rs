//! Universe backed by a resource manager and kept as in-memory hash trees

use super::{
    adopt_payload, apply_serve, apply_to_forest, resolve_keys, PushPayload, Universe,
};
use crate::codec::{ResourceKeyCodec, TypeRegistry};
use crate::model::{Resource, ScopedKey, TenantId};
use crate::store::ResourceManager;
use crate::tree::{StateForest, StructuredStateTree};
use crate::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct HashTreeConfig {
    pub registry: Arc<TypeRegistry>,
    pub manager: Arc<dyn ResourceManager>,
}

/// Universe whose state mirrors a [`ResourceManager`].
///
/// Pushes write through to the manager and then update the trees, so the
/// trees stay current without polling. `observe` rebuilds the trees of the
/// tracked tenants from the manager.
pub struct HashTreeUniverse {
    codec: ResourceKeyCodec,
    manager: Arc<dyn ResourceManager>,
    state: StateForest,
    /// `None` until `serve` is first called; every tenant is tracked then
    served: Option<BTreeSet<TenantId>>,
}

impl HashTreeUniverse {
    pub fn codec(&self) -> &ResourceKeyCodec {
        &self.codec
    }

    pub fn manager(&self) -> &Arc<dyn ResourceManager> {
        &self.manager
    }

    fn rebuild_tenant(&self, tenant: &TenantId) -> Result<StructuredStateTree> {
        let mut tree = StructuredStateTree::new();
        for resource in self.manager.list(tenant)? {
            // same placement as push, so unregistered kinds survive a rebuild
            match self.codec.key_for(&resource) {
                Ok(key) => tree.upsert(&key, resource.attributes)?,
                Err(e) => {
                    warn!(tenant = %tenant, kind = %resource.kind, error = %e, "Skipping stored resource")
                }
            }
        }
        Ok(tree)
    }
}

impl Universe for HashTreeUniverse {
    type Config = HashTreeConfig;

    fn initialize(config: HashTreeConfig) -> Result<Self> {
        Ok(HashTreeUniverse {
            codec: ResourceKeyCodec::new(config.registry),
            manager: config.manager,
            state: StateForest::new(),
            served: None,
        })
    }

    fn observe(&mut self) -> Result<()> {
        let tenants: Vec<TenantId> = match &self.served {
            Some(served) => served.iter().cloned().collect(),
            None => self.state.tenants().cloned().collect(),
        };
        for tenant in tenants {
            let tree = self.rebuild_tenant(&tenant)?;
            debug!(tenant = %tenant, nodes = tree.len(), "Observed tenant");
            self.state.insert(tenant, tree);
        }
        Ok(())
    }

    fn state(&self) -> &StateForest {
        &self.state
    }

    fn get_resources(&self, keys: &[ScopedKey]) -> Result<Vec<Resource>> {
        resolve_keys(&self.codec, keys, |skeleton| self.manager.get(skeleton))
    }

    fn push_resources(&mut self, payload: PushPayload) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        let payload = adopt_payload(&self.codec, payload);
        for resource in &payload.delete {
            self.manager.delete(resource)?;
        }
        for resource in &payload.create {
            match self.codec.key_for(resource) {
                Ok(_) => self.manager.create(resource)?,
                Err(e) => {
                    warn!(tenant = %resource.tenant, kind = %resource.kind, error = %e, "Refusing to store resource")
                }
            }
        }
        apply_to_forest(&self.codec, &mut self.state, self.served.as_ref(), &payload)?;
        info!(
            created = payload.create.len(),
            deleted = payload.delete.len(),
            "Pushed resources"
        );
        Ok(())
    }

    fn serve(&mut self, tenants: &[TenantId]) -> Result<()> {
        apply_serve(&mut self.state, &mut self.served, tenants);
        Ok(())
    }

    fn cleanup_state(&mut self, tenant: &TenantId) -> Result<()> {
        self.state.remove(tenant);
        if let Some(served) = self.served.as_mut() {
            served.remove(tenant);
        }
        debug!(tenant = %tenant, "Cleaned up tenant state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathKey;
    use crate::store::InMemoryResourceManager;
    use crate::Error;

    fn universe(manager: Arc<InMemoryResourceManager>) -> HashTreeUniverse {
        HashTreeUniverse::initialize(HashTreeConfig {
            registry: Arc::new(TypeRegistry::builtin()),
            manager,
        })
        .unwrap()
    }

    fn l3out(name: &str) -> Resource {
        Resource::new("t1", "L3Outside")
            .with_identity("name", name)
            .with_attr("vrf_name", "ctx1")
    }

    fn scoped(pairs: &[(&str, &str)]) -> ScopedKey {
        ScopedKey::new("t1", PathKey::from_pairs(pairs.iter().copied()))
    }

    #[test]
    fn test_push_writes_through_and_updates_tree() {
        let manager = Arc::new(InMemoryResourceManager::new());
        let mut u = universe(manager.clone());

        u.push_resources(PushPayload {
            create: vec![l3out("o1")],
            delete: vec![],
        })
        .unwrap();

        assert_eq!(manager.len(), 1);
        let tree = u.state().get(&TenantId::new("t1")).unwrap();
        assert!(tree.contains(&PathKey::from_pairs([("L3Outside", "o1")])));
    }

    #[test]
    fn test_push_is_idempotent() {
        let manager = Arc::new(InMemoryResourceManager::new());
        let mut u = universe(manager.clone());
        let payload = PushPayload {
            create: vec![l3out("o1"), l3out("o2")],
            delete: vec![],
        };

        u.push_resources(payload.clone()).unwrap();
        let root = u.state().root_hash(&TenantId::new("t1"));
        u.push_resources(payload).unwrap();

        assert_eq!(u.state().root_hash(&TenantId::new("t1")), root);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_push_empty_is_noop() {
        let mut u = universe(Arc::new(InMemoryResourceManager::new()));
        u.push_resources(PushPayload::default()).unwrap();
        assert!(u.state().is_empty());
    }

    #[test]
    fn test_push_skips_invalid_resource() {
        let manager = Arc::new(InMemoryResourceManager::new());
        let mut u = universe(manager.clone());
        let invalid = Resource::new("t1", "ExternalNetwork").with_identity("name", "inet1");

        u.push_resources(PushPayload {
            create: vec![invalid, l3out("o1")],
            delete: vec![],
        })
        .unwrap();

        assert_eq!(manager.len(), 1);
        assert_eq!(u.state().get(&TenantId::new("t1")).unwrap().len(), 1);
    }

    #[test]
    fn test_get_resources_prefers_persisted() {
        let manager = Arc::new(InMemoryResourceManager::new());
        manager.create(&l3out("o1")).unwrap();
        let u = universe(manager);

        let resolved = u
            .get_resources(&[scoped(&[("L3Outside", "o1")]), scoped(&[("L3Outside", "o2")])])
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0], l3out("o1"));
        assert!(resolved[1].is_skeleton());
        assert_eq!(resolved[1].identity_value("name"), Some("o2"));
    }

    #[test]
    fn test_get_resources_degrades_per_key() {
        let manager = Arc::new(InMemoryResourceManager::new());
        manager.create(&l3out("o1")).unwrap();
        manager.reject_kind("VRF");
        let u = universe(manager);

        let resolved = u
            .get_resources(&[
                scoped(&[("VRF", "ctx1")]),
                scoped(&[("VRF", "ctx1"), ("L3Outside", "o1")]),
                scoped(&[("Mystery", "m1")]),
                scoped(&[("L3Outside", "o1")]),
            ])
            .unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].kind, "VRF");
        assert!(resolved[0].is_skeleton());
        assert_eq!(resolved[1].kind, "Mystery");
        assert_eq!(resolved[2], l3out("o1"));
    }

    #[test]
    fn test_observe_rebuilds_served_tenants() {
        let manager = Arc::new(InMemoryResourceManager::new());
        manager.create(&l3out("o1")).unwrap();
        manager
            .create(&Resource::new("t2", "VRF").with_identity("name", "ctx"))
            .unwrap();
        let mut u = universe(manager);

        u.serve(&[TenantId::new("t1")]).unwrap();
        assert!(u.state().get(&TenantId::new("t1")).unwrap().is_empty());

        u.observe().unwrap();
        assert_eq!(u.state().get(&TenantId::new("t1")).unwrap().len(), 1);
        assert!(u.state().get(&TenantId::new("t2")).is_none());
    }

    #[test]
    fn test_serve_releases_dropped_tenants() {
        let mut u = universe(Arc::new(InMemoryResourceManager::new()));
        u.serve(&[TenantId::new("t1"), TenantId::new("t2")]).unwrap();
        assert_eq!(u.state().len(), 2);

        u.serve(&[TenantId::new("t2")]).unwrap();
        assert_eq!(
            u.state().tenants().cloned().collect::<Vec<_>>(),
            vec![TenantId::new("t2")]
        );
    }

    #[test]
    fn test_cleanup_state() {
        let mut u = universe(Arc::new(InMemoryResourceManager::new()));
        u.serve(&[TenantId::new("t1")]).unwrap();
        u.cleanup_state(&TenantId::new("t1")).unwrap();

        assert!(u.state().is_empty());
        u.observe().unwrap();
        assert!(u.state().is_empty());
    }

    #[test]
    fn test_get_resources_surfaces_store_failure() {
        let manager = Arc::new(InMemoryResourceManager::new());
        manager.create(&l3out("o1")).unwrap();
        manager.fail_kind("L3Outside");
        let u = universe(manager);

        let err = u
            .get_resources(&[scoped(&[("VRF", "ctx1")]), scoped(&[("L3Outside", "o1")])])
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_optimized_state_is_full_state() {
        let mut u = universe(Arc::new(InMemoryResourceManager::new()));
        u.push_resources(PushPayload {
            create: vec![l3out("o1")],
            delete: vec![],
        })
        .unwrap();

        let optimized = u.get_optimized_state(&StateForest::new()).unwrap();
        assert!(matches!(optimized, std::borrow::Cow::Borrowed(_)));
        assert_eq!(
            optimized.root_hash(&TenantId::new("t1")),
            u.state().root_hash(&TenantId::new("t1"))
        );
    }
}
