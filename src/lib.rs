//! # fabric_sync
//!
//! Hash-tree state reconciliation for multi-tenant network fabrics.
//!
//! Desired and observed fabric state are each held as a forest of
//! Merkle-style trees, one per tenant. Every node carries a hash over its
//! own attributes and a hash over its whole subtree, so two trees can be
//! compared by descending only where subtree hashes differ.
//!
//! ## Core Concepts
//!
//! - **Path keys**: ordered `type|value` segments addressing a resource in
//!   its tenant's tree
//! - **Universes**: one side of the comparison, able to observe, resolve
//!   keys into resources and apply pushes
//! - **Reconcile**: diff two universes and push the difference into the
//!   target as one batch
//!
//! ## Example
//!
//! ```ignore
//! use fabric_sync::{engine, HashTreeConfig, HashTreeUniverse, Universe};
//!
//! let mut observed = HashTreeUniverse::initialize(config)?;
//! observed.serve(&tenants)?;
//! engine::reconcile(&desired, &mut observed)?;
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod model;
pub mod store;
pub mod tree;
pub mod universe;

mod error;

pub use codec::{ResourceDescriptor, ResourceKeyCodec, Skeleton, TypeRegistry};
pub use config::FabricConfig;
pub use engine::{compute_changes, reconcile, ChangeSet, ReconcileOutcome};
pub use error::{Error, Result};
pub use model::{Attributes, Hash, KeySegment, PathKey, Resource, ScopedKey, TenantId};
pub use store::{InMemoryResourceManager, ResourceManager, SnapshotFile};
pub use tree::{StateForest, StateNode, StructuredStateTree, TreeDiff};
pub use universe::{
    HashTreeConfig, HashTreeUniverse, PushPayload, SnapshotConfig, SnapshotUniverse, Universe,
};

/// Snapshot format version
pub const VERSION: u32 = 1;

/// Magic bytes for snapshot file identification
pub const MAGIC: &[u8; 8] = b"FABSTATE";
