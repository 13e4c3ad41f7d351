//! Error types for fabric_sync

use thiserror::Error;

/// Result type alias for fabric_sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding, diffing or reconciling state
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A path key segment could not be split into type-tag and identity value
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// The type-tag is not present in the registry
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// A resource is missing a required identity attribute
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// The backing store rejected or failed an operation
    #[error("Store error: {0}")]
    Store(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid snapshot file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Errors that degrade a single key during resolution instead of
    /// aborting the reconcile pass
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MalformedKey(_) | Error::UnknownResourceType(_))
    }
}
