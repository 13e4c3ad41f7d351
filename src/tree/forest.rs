//! Tenant-partitioned collection of state trees

use super::tree::StructuredStateTree;
use crate::model::{Hash, TenantId};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping from tenant to its state tree
#[derive(Clone, Debug, Default)]
pub struct StateForest {
    trees: BTreeMap<TenantId, StructuredStateTree>,
}

impl StateForest {
    pub fn new() -> Self {
        StateForest::default()
    }

    pub fn get(&self, tenant: &TenantId) -> Option<&StructuredStateTree> {
        self.trees.get(tenant)
    }

    pub fn get_mut(&mut self, tenant: &TenantId) -> Option<&mut StructuredStateTree> {
        self.trees.get_mut(tenant)
    }

    pub fn contains(&self, tenant: &TenantId) -> bool {
        self.trees.contains_key(tenant)
    }

    /// Tree for `tenant`, created empty if absent
    pub fn tree_mut(&mut self, tenant: &TenantId) -> &mut StructuredStateTree {
        self.trees.entry(tenant.clone()).or_default()
    }

    pub fn insert(&mut self, tenant: TenantId, tree: StructuredStateTree) {
        self.trees.insert(tenant, tree);
    }

    pub fn remove(&mut self, tenant: &TenantId) -> Option<StructuredStateTree> {
        self.trees.remove(tenant)
    }

    pub fn tenants(&self) -> impl Iterator<Item = &TenantId> {
        self.trees.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TenantId, &StructuredStateTree)> {
        self.trees.iter()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Root hash of a tenant's tree, `None` when the tenant is untracked
    pub fn root_hash(&self, tenant: &TenantId) -> Option<Hash> {
        self.trees.get(tenant).map(StructuredStateTree::root_hash)
    }

    /// Tenants whose tree has no nodes left
    pub fn drained_tenants(&self) -> Vec<TenantId> {
        self.trees
            .iter()
            .filter(|(_, tree)| tree.is_empty())
            .map(|(tenant, _)| tenant.clone())
            .collect()
    }

    /// Drop every tenant not in `keep`, returning the dropped ones
    pub fn retain_tenants(&mut self, keep: &BTreeSet<TenantId>) -> Vec<TenantId> {
        let dropped: Vec<TenantId> = self
            .trees
            .keys()
            .filter(|t| !keep.contains(*t))
            .cloned()
            .collect();
        for tenant in &dropped {
            self.trees.remove(tenant);
        }
        dropped
    }
}

impl FromIterator<(TenantId, StructuredStateTree)> for StateForest {
    fn from_iter<I: IntoIterator<Item = (TenantId, StructuredStateTree)>>(iter: I) -> Self {
        StateForest {
            trees: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, PathKey};

    #[test]
    fn test_tree_mut_creates_empty() {
        let mut forest = StateForest::new();
        let t1 = TenantId::new("t1");
        assert!(forest.get(&t1).is_none());

        forest.tree_mut(&t1);
        assert!(forest.get(&t1).unwrap().is_empty());
        assert_eq!(forest.root_hash(&t1), Some(Hash::ZERO));
        assert_eq!(forest.drained_tenants(), vec![t1]);
    }

    #[test]
    fn test_drained_tenants_excludes_populated() {
        let mut forest = StateForest::new();
        let t1 = TenantId::new("t1");
        let t2 = TenantId::new("t2");
        forest
            .tree_mut(&t1)
            .upsert(&PathKey::from_pairs([("VRF", "ctx")]), Attributes::new())
            .unwrap();
        forest.tree_mut(&t2);

        assert_eq!(forest.drained_tenants(), vec![t2]);
    }

    #[test]
    fn test_retain_tenants() {
        let mut forest: StateForest = ["a", "b", "c"]
            .into_iter()
            .map(|t| (TenantId::new(t), StructuredStateTree::new()))
            .collect();
        let keep: BTreeSet<TenantId> = [TenantId::new("b")].into_iter().collect();

        let dropped = forest.retain_tenants(&keep);
        assert_eq!(dropped, vec![TenantId::new("a"), TenantId::new("c")]);
        assert_eq!(forest.tenants().collect::<Vec<_>>(), vec![&TenantId::new("b")]);
    }
}
