mod cosmos;
pub mod db;
mod media;
pub mod models;
mod relay;
mod tables;

pub use cosmos::{CosmosStore, COLLECTION_ID, DATABASE_ID};
pub use db::{Database, DatabaseError};
pub use relay::RelayClient;
pub use tables::*;

use async_trait::async_trait;
use thiserror::Error;

use models::{FileType, MediaRecord};

#[derive(Debug, Error)]
pub enum MetadataStoreError {
    #[error("Record already exists: {0}")]
    Conflict(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over the document store holding media metadata.
///
/// Records are addressed by name plus partition key (the file type).
/// `create` is insert-only; there is no update.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if the id is taken.
    async fn create(&self, record: &MediaRecord) -> Result<MediaRecord, MetadataStoreError>;
    /// Full snapshot of every record, newest first.
    async fn query(&self) -> Result<Vec<MediaRecord>, MetadataStoreError>;
    async fn delete(&self, name: &str, file_type: FileType) -> Result<(), MetadataStoreError>;
}
