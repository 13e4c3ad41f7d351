//! Reconciliation of one universe onto another
//!
//! A pass diffs every tenant the target reports, aggregates the keys across
//! tenants, resolves them in one batch from the desired side and hands a
//! single payload to the target's push.

use crate::model::{ScopedKey, TenantId};
use crate::tree::{StateForest, StructuredStateTree};
use crate::universe::{PushPayload, Universe};
use crate::Result;
use serde::Serialize;
use tracing::{debug, info};

/// Keys found out of sync during one pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Keys present on the desired side and missing on the target
    pub create: Vec<ScopedKey>,
    /// Keys present on the target and missing on the desired side
    pub delete: Vec<ScopedKey>,
    /// Drained desired tenants the target no longer reports
    pub drained: Vec<TenantId>,
}

impl ChangeSet {
    /// True when neither side needs a create or delete
    pub fn is_converged(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

/// Result of a reconcile pass
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Nothing differed; no push was issued
    InSync,
    /// A push was issued with this many creates and deletes
    Applied { created: usize, deleted: usize },
}

/// Diff `desired` against `target`, tenant by tenant.
///
/// Only tenants present in `target` are diffed; a desired tenant missing
/// from `target` is treated as "no information". Drained desired tenants
/// absent from `target` are listed in [`ChangeSet::drained`] instead.
pub fn compute_changes(desired: &StateForest, target: &StateForest) -> ChangeSet {
    let empty = StructuredStateTree::new();
    let mut changes = ChangeSet::default();

    for (tenant, target_tree) in target.iter() {
        let desired_tree = desired.get(tenant).unwrap_or(&empty);
        let diff = desired_tree.diff(target_tree);
        if !diff.is_empty() {
            debug!(
                tenant = %tenant,
                add = diff.add.len(),
                remove = diff.remove.len(),
                "Tenant out of sync"
            );
        }
        changes.create.extend(
            diff.add
                .into_iter()
                .map(|key| ScopedKey::new(tenant.clone(), key)),
        );
        changes.delete.extend(
            diff.remove
                .into_iter()
                .map(|key| ScopedKey::new(tenant.clone(), key)),
        );
    }

    changes.drained = desired
        .iter()
        .filter(|(tenant, tree)| tree.is_empty() && !target.contains(tenant))
        .map(|(tenant, _)| tenant.clone())
        .collect();

    changes
}

/// Converge `target` onto `desired`.
///
/// Store failures from resolution or push are returned unchanged; the
/// engine never retries.
pub fn reconcile<D, T>(desired: &D, target: &mut T) -> Result<ReconcileOutcome>
where
    D: Universe + ?Sized,
    T: Universe + ?Sized,
{
    let my_state = desired.state();
    let changes = {
        let other_state = target.get_optimized_state(my_state)?;
        compute_changes(my_state, &other_state)
    };

    for tenant in &changes.drained {
        info!(tenant = %tenant, "Removing drained tenant");
        target.cleanup_state(tenant)?;
    }

    if changes.is_converged() {
        debug!("Universes are in sync");
        return Ok(ReconcileOutcome::InSync);
    }

    let payload = PushPayload {
        create: desired.get_resources(&changes.create)?,
        delete: desired.get_resources(&changes.delete)?,
    };
    let outcome = ReconcileOutcome::Applied {
        created: payload.create.len(),
        deleted: payload.delete.len(),
    };
    info!(
        create = changes.create.len(),
        delete = changes.delete.len(),
        "Pushing reconciliation changes"
    );
    target.push_resources(payload)?;
    Ok(outcome)
}
