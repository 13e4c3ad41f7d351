//! Universe persisted as a single snapshot file

use super::{
    adopt_payload, apply_serve, apply_to_forest, resolve_keys, PushPayload, Universe,
};
use crate::codec::{ResourceKeyCodec, TypeRegistry};
use crate::model::{Resource, ScopedKey, TenantId};
use crate::store::SnapshotFile;
use crate::tree::StateForest;
use crate::Result;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub struct SnapshotConfig {
    pub registry: Arc<TypeRegistry>,
    pub path: PathBuf,
}

/// Universe whose backing store is a [`SnapshotFile`].
///
/// Node attributes are the persisted form, so resources resolve from the
/// trees themselves. Every mutation is written back to the file.
pub struct SnapshotUniverse {
    codec: ResourceKeyCodec,
    file: SnapshotFile,
    state: StateForest,
    served: Option<BTreeSet<TenantId>>,
}

impl SnapshotUniverse {
    pub fn file(&self) -> &SnapshotFile {
        &self.file
    }

    /// Write the current state back to the snapshot file
    pub fn persist(&self) -> Result<()> {
        let digest = self.file.save(&self.state)?;
        debug!(path = %self.file.path().display(), digest = %digest.short(), "Saved snapshot");
        Ok(())
    }

    fn lookup(&self, skeleton: &Resource) -> Result<Option<Resource>> {
        let key = self.codec.encode(skeleton)?;
        let node = self
            .state
            .get(&skeleton.tenant)
            .and_then(|tree| tree.get(&key))
            .filter(|node| !node.is_placeholder());
        Ok(node.map(|node| {
            let mut resource = skeleton.clone();
            resource.attributes = node.attributes().clone();
            resource
        }))
    }
}

impl Universe for SnapshotUniverse {
    type Config = SnapshotConfig;

    fn initialize(config: SnapshotConfig) -> Result<Self> {
        let file = SnapshotFile::new(&config.path);
        let state = file.load_or_empty()?;
        Ok(SnapshotUniverse {
            codec: ResourceKeyCodec::new(config.registry),
            file,
            state,
            served: None,
        })
    }

    fn observe(&mut self) -> Result<()> {
        let mut state = self.file.load_or_empty()?;
        if let Some(served) = self.served.as_ref() {
            state.retain_tenants(served);
            for tenant in served {
                state.tree_mut(tenant);
            }
        }
        self.state = state;
        Ok(())
    }

    fn state(&self) -> &StateForest {
        &self.state
    }

    /// Only tenants whose root hash differs from `reference`
    fn get_optimized_state(&self, reference: &StateForest) -> Result<Cow<'_, StateForest>> {
        let changed: StateForest = self
            .state
            .iter()
            .filter(|(tenant, tree)| reference.root_hash(tenant) != Some(tree.root_hash()))
            .map(|(tenant, tree)| (tenant.clone(), tree.clone()))
            .collect();
        debug!(
            tenants = self.state.len(),
            changed = changed.len(),
            "Computed optimized state"
        );
        Ok(Cow::Owned(changed))
    }

    fn get_resources(&self, keys: &[ScopedKey]) -> Result<Vec<Resource>> {
        resolve_keys(&self.codec, keys, |skeleton| self.lookup(skeleton))
    }

    fn push_resources(&mut self, payload: PushPayload) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        let payload = adopt_payload(&self.codec, payload);
        apply_to_forest(&self.codec, &mut self.state, self.served.as_ref(), &payload)?;
        self.persist()?;
        info!(
            created = payload.create.len(),
            deleted = payload.delete.len(),
            "Pushed resources to snapshot"
        );
        Ok(())
    }

    /// The file is rewritten only when the tracked tenants change
    fn serve(&mut self, tenants: &[TenantId]) -> Result<()> {
        if apply_serve(&mut self.state, &mut self.served, tenants) {
            self.persist()?;
        }
        Ok(())
    }

    fn cleanup_state(&mut self, tenant: &TenantId) -> Result<()> {
        self.state.remove(tenant);
        if let Some(served) = self.served.as_mut() {
            served.remove(tenant);
        }
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathKey;
    use tempfile::tempdir;

    fn open(path: PathBuf) -> SnapshotUniverse {
        SnapshotUniverse::initialize(SnapshotConfig {
            registry: Arc::new(TypeRegistry::builtin()),
            path,
        })
        .unwrap()
    }

    fn vrf(tenant: &str, name: &str) -> Resource {
        Resource::new(tenant, "VRF")
            .with_identity("name", name)
            .with_attr("policy_enforcement_pref", "enforced")
    }

    #[test]
    fn test_push_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("observed.snap");

        let mut u = open(path.clone());
        u.push_resources(PushPayload {
            create: vec![vrf("t1", "ctx1")],
            delete: vec![],
        })
        .unwrap();

        let reopened = open(path);
        let tree = reopened.state().get(&TenantId::new("t1")).unwrap();
        assert!(tree.contains(&PathKey::from_pairs([("VRF", "ctx1")])));
    }

    #[test]
    fn test_get_resources_from_tree_attributes() {
        let dir = tempdir().unwrap();
        let mut u = open(dir.path().join("s.snap"));
        u.push_resources(PushPayload {
            create: vec![vrf("t1", "ctx1")],
            delete: vec![],
        })
        .unwrap();

        let resolved = u
            .get_resources(&[
                ScopedKey::new("t1", PathKey::from_pairs([("VRF", "ctx1")])),
                ScopedKey::new("t1", PathKey::from_pairs([("VRF", "ctx2")])),
            ])
            .unwrap();
        assert_eq!(resolved[0], vrf("t1", "ctx1"));
        assert!(resolved[1].is_skeleton());
    }

    #[test]
    fn test_optimized_state_skips_unchanged_tenants() {
        let dir = tempdir().unwrap();
        let mut u = open(dir.path().join("s.snap"));
        u.push_resources(PushPayload {
            create: vec![vrf("same", "ctx"), vrf("changed", "ctx")],
            delete: vec![],
        })
        .unwrap();

        let mut reference = StateForest::new();
        reference.insert(
            TenantId::new("same"),
            u.state().get(&TenantId::new("same")).unwrap().clone(),
        );
        reference.tree_mut(&TenantId::new("changed"));

        let optimized = u.get_optimized_state(&reference).unwrap();
        assert_eq!(
            optimized.tenants().cloned().collect::<Vec<_>>(),
            vec![TenantId::new("changed")]
        );
    }

    #[test]
    fn test_observe_reloads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.snap");
        let mut reader = open(path.clone());
        let mut writer = open(path);

        writer
            .push_resources(PushPayload {
                create: vec![vrf("t1", "ctx1")],
                delete: vec![],
            })
            .unwrap();
        assert!(reader.state().is_empty());

        reader.observe().unwrap();
        assert_eq!(reader.state().get(&TenantId::new("t1")).unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_state_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.snap");
        let mut u = open(path.clone());
        u.serve(&[TenantId::new("t1"), TenantId::new("t2")]).unwrap();
        u.cleanup_state(&TenantId::new("t1")).unwrap();

        let reopened = open(path);
        assert_eq!(
            reopened.state().tenants().cloned().collect::<Vec<_>>(),
            vec![TenantId::new("t2")]
        );
    }

    #[test]
    fn test_serve_writes_only_on_tenant_change() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.snap");
        let mut u = open(path.clone());

        u.serve(&[]).unwrap();
        assert!(!path.exists());

        u.serve(&[TenantId::new("t1")]).unwrap();
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
        let mut reopened = open(path.clone());
        reopened.serve(&[]).unwrap();
        assert!(!path.exists());
        assert!(reopened.state().is_empty());
    }

    #[test]
    fn test_serve_same_tenants_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.snap");
        let mut u = open(path.clone());
        u.serve(&[TenantId::new("t1")]).unwrap();

        let mut reopened = open(path.clone());
        std::fs::remove_file(&path).unwrap();
        reopened.serve(&[TenantId::new("t1")]).unwrap();
        assert!(!path.exists());
        assert!(reopened.state().contains(&TenantId::new("t1")));
    }
}
