mod azure;
mod local;

pub use azure::AzureBlobStore;
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
    #[error("Invalid object name: {0}")]
    InvalidName(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over blob storage backends.
///
/// Blob names are `<timestamp-millis>-<file name>` and double as metadata keys.
/// `put` never overwrites: a second `put` under a live name fails with
/// `AlreadyExists`. Backends do not retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a new object and return the URL it is retrievable at.
    async fn put(&self, name: &str, data: Bytes, content_type: &str)
        -> Result<String, ObjectStoreError>;
    async fn get(&self, name: &str) -> Result<Bytes, ObjectStoreError>;
    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, name: &str) -> Result<bool, ObjectStoreError>;
    /// Names of every stored object.
    async fn list(&self) -> Result<Vec<String>, ObjectStoreError>;
    /// Public URL an object with this name is (or would be) served from.
    fn url_for(&self, name: &str) -> String;
}
