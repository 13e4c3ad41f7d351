//! Backing stores for universe state
//!
//! - [`ResourceManager`]: the persistent resource store, consulted for full
//!   resource attributes and written to on push
//! - [`SnapshotFile`]: compressed single-file snapshot of a state forest

mod manager;
mod snapshot;

pub use manager::{InMemoryResourceManager, ResourceManager};
pub use snapshot::{forest_digest, SnapshotFile};
