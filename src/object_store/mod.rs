mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

/// Bytes written to the store but not yet visible under any key.
#[derive(Debug)]
pub struct StagedObject {
    token: String,
    byte_size: u64,
}

impl StagedObject {
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

/// Abstraction over the flat content store.
/// Keys are the sanitized filenames recorded in the catalog.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write bytes to a private staging location.
    async fn stage(&self, data: Bytes) -> Result<StagedObject, ObjectStoreError>;
    /// Publish staged bytes under `key`, failing with `AlreadyExists` rather
    /// than replacing an existing object. The staging location is released
    /// whether or not publishing succeeds.
    async fn promote(&self, staged: StagedObject, key: &str) -> Result<(), ObjectStoreError>;
    /// Drop staged bytes that will not be published.
    async fn discard(&self, staged: StagedObject) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    /// Remove an object. Returns false when there was nothing to remove.
    async fn delete(&self, key: &str) -> Result<bool, ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}
