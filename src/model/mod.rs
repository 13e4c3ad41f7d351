//! Core data model types for fabric_sync

mod hash;
mod key;
mod resource;

pub use hash::Hash;
pub use key::{KeySegment, PathKey, ScopedKey, TenantId, SEGMENT_SEPARATOR};
pub use resource::{Attributes, Resource, ResourceId};
