//! Universes: comparable representations of fabric state
//!
//! A universe holds one side of the comparison, either desired or observed,
//! as a [`StateForest`]. Any two universes using the same key scheme can be
//! reconciled against each other.

mod hash_tree;
mod snapshot;

pub use hash_tree::{HashTreeConfig, HashTreeUniverse};
pub use snapshot::{SnapshotConfig, SnapshotUniverse};

use crate::codec::{ResourceKeyCodec, Skeleton};
use crate::model::{Resource, ScopedKey, TenantId};
use crate::tree::StateForest;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Resolved resources to create and delete in a universe
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub create: Vec<Resource>,
    pub delete: Vec<Resource>,
}

impl PushPayload {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

/// The capabilities a state representation needs to take part in
/// reconciliation.
///
/// Instances are not internally synchronized: callers serialize `observe`,
/// `push_resources` and reconcile passes against the same instance.
pub trait Universe {
    type Config;

    /// One-time setup, called before anything else
    fn initialize(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Refresh local state from the backing source. May be a no-op when
    /// another writer keeps the state current.
    fn observe(&mut self) -> Result<()>;

    /// Current state snapshot
    fn state(&self) -> &StateForest;

    /// View of this universe's state restricted to tenants that could
    /// differ from `reference`. A missing tenant means "no information",
    /// not "empty".
    fn get_optimized_state(&self, _reference: &StateForest) -> Result<Cow<'_, StateForest>> {
        Ok(Cow::Borrowed(self.state()))
    }

    /// Resolve keys into resources, preferring the persisted form and
    /// degrading to skeletons. One bad key never fails the batch.
    fn get_resources(&self, keys: &[ScopedKey]) -> Result<Vec<Resource>>;

    /// Apply creates and deletes. Empty payloads are a no-op and applying
    /// the same payload twice leaves the same end state.
    fn push_resources(&mut self, payload: PushPayload) -> Result<()>;

    /// Track exactly `tenants`; state of dropped tenants is released
    fn serve(&mut self, tenants: &[TenantId]) -> Result<()>;

    /// Discard any state retained for a drained tenant
    fn cleanup_state(&mut self, tenant: &TenantId) -> Result<()>;
}

/// Resolve keys through `codec`, asking `lookup` for the full form of every
/// known type.
///
/// Malformed keys are skipped; unknown types and resources the store lacks
/// fall back to skeletons. Any other store error is returned.
pub(crate) fn resolve_keys<F>(
    codec: &ResourceKeyCodec,
    keys: &[ScopedKey],
    lookup: F,
) -> Result<Vec<Resource>>
where
    F: Fn(&Resource) -> Result<Option<Resource>>,
{
    let mut resources = Vec::with_capacity(keys.len());
    for scoped in keys {
        let skeleton = match codec.skeleton(&scoped.tenant, &scoped.key) {
            Ok(skeleton) => skeleton,
            Err(e) if e.is_recoverable() => {
                warn!(tenant = %scoped.tenant, key = %scoped.key, error = %e, "Skipping unresolvable key");
                continue;
            }
            Err(e) => return Err(e),
        };

        match skeleton {
            Skeleton::UnknownType(resource) => {
                warn!(tenant = %scoped.tenant, kind = %resource.kind, "Resource type is not registered, using skeleton");
                resources.push(resource);
            }
            Skeleton::Known(resource) => match lookup(&resource) {
                Ok(Some(full)) => resources.push(full),
                Ok(None) => resources.push(resource),
                Err(Error::UnknownResourceType(kind)) => {
                    warn!(tenant = %scoped.tenant, kind = %kind, "Resource type unknown to the store, using skeleton");
                    resources.push(resource);
                }
                Err(e) => return Err(e),
            },
        }
    }
    Ok(resources)
}

/// Rebuild the identity of resources a peer resolved without knowing their
/// type, so they address the same stored object on this side.
///
/// Such resources carry the key they were resolved from; when `codec` knows
/// the type the identity is re-derived under the registered attribute names.
pub(crate) fn adopt_payload(codec: &ResourceKeyCodec, payload: PushPayload) -> PushPayload {
    let adopt = |resource: Resource| -> Resource {
        let Some(key) = resource.source_key.as_ref() else {
            return resource;
        };
        match codec.skeleton(&resource.tenant, key) {
            Ok(Skeleton::Known(mut known)) => {
                debug!(tenant = %known.tenant, kind = %known.kind, "Adopted peer skeleton");
                known.attributes = resource.attributes;
                known
            }
            _ => resource,
        }
    };
    PushPayload {
        create: payload.create.into_iter().map(&adopt).collect(),
        delete: payload.delete.into_iter().map(&adopt).collect(),
    }
}

/// Mirror a push payload into `forest`.
///
/// Deletes are applied before creates. Resources whose key cannot be
/// derived are logged and skipped, and so are tenants outside `served`.
pub(crate) fn apply_to_forest(
    codec: &ResourceKeyCodec,
    forest: &mut StateForest,
    served: Option<&BTreeSet<TenantId>>,
    payload: &PushPayload,
) -> Result<()> {
    let tracked = |tenant: &TenantId| served.map_or(true, |s| s.contains(tenant));

    for resource in &payload.delete {
        match codec.key_for(resource) {
            Ok(key) => {
                if let Some(tree) = forest.get_mut(&resource.tenant) {
                    tree.remove(&key);
                }
            }
            Err(e) => {
                warn!(tenant = %resource.tenant, kind = %resource.kind, error = %e, "Cannot place deleted resource in tree")
            }
        }
    }

    for resource in &payload.create {
        if !tracked(&resource.tenant) {
            debug!(tenant = %resource.tenant, kind = %resource.kind, "Tenant not served, skipping tree update");
            continue;
        }
        match codec.key_for(resource) {
            Ok(key) => forest
                .tree_mut(&resource.tenant)
                .upsert(&key, resource.attributes.clone())?,
            Err(e) => {
                warn!(tenant = %resource.tenant, kind = %resource.kind, error = %e, "Cannot place created resource in tree")
            }
        }
    }
    Ok(())
}

/// Replace the served set, releasing dropped tenants and starting newly
/// served ones with an empty tree.
///
/// Returns whether `forest` gained or lost a tenant.
pub(crate) fn apply_serve(
    forest: &mut StateForest,
    served: &mut Option<BTreeSet<TenantId>>,
    tenants: &[TenantId],
) -> bool {
    let keep: BTreeSet<TenantId> = tenants.iter().cloned().collect();
    let released = forest.retain_tenants(&keep);
    for tenant in &released {
        info!(tenant = %tenant, "Released tenant state");
    }
    let mut changed = !released.is_empty();
    for tenant in &keep {
        if !forest.contains(tenant) {
            debug!(tenant = %tenant, "Serving new tenant");
            forest.tree_mut(tenant);
            changed = true;
        }
    }
    *served = Some(keep);
    changed
}
