//! Upload and delete sequences spanning the object store and the metadata store.
//!
//! The two stores fail independently and there is no transaction across them.
//! Each sequence runs its steps strictly in order and logs every state
//! transition, so an interrupted sequence can be found afterwards by
//! [`MediaWorkflow::reconcile`].
//!
//! Upload: `Selecting -> Uploading -> Recording -> Committed`. A failed object
//! write leaves nothing behind. A failed metadata write leaves an orphaned
//! object that is deliberately not rolled back.
//!
//! Delete: `Deleting -> RemovingRecord -> Committed`. A failed object delete
//! keeps the metadata. A failed metadata delete leaves a dangling record.

mod reconcile;

pub use reconcile::{ReconcileError, ReconcileReport, RepairStats};

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::models::{FileType, MediaRecord};
use crate::storage::{MetadataStore, MetadataStoreError};

// ============================================================================
// Selection
// ============================================================================

/// A file picked for upload, held by the caller until the upload commits.
///
/// Owns its bytes; dropping or replacing a selection releases them.
#[derive(Debug, Clone)]
pub struct Selection {
    content_type: String,
    data: Bytes,
    file_name: String,
    file_type: FileType,
}

impl Selection {
    /// The file type is derived from the extension and the content type is
    /// guessed from it. Any directory part of `file_name` is dropped.
    pub fn new(file_name: &str, data: Bytes) -> Self {
        let file_name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name)
            .to_string();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();

        Self {
            file_type: FileType::from_file_name(&file_name),
            content_type,
            data,
            file_name,
        }
    }

    /// Use the content type reported by the client instead of the guess.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Declare the file type explicitly (e.g. the upload slot it was picked from).
    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}

/// Blob name and metadata key for a file uploaded at `now`.
pub fn blob_name(now: DateTime<Utc>, file_name: &str) -> String {
    format!("{}-{}", now.timestamp_millis(), file_name)
}

// ============================================================================
// States and errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    ObjectWrite,
    MetadataWrite,
    ObjectDelete,
    MetadataDelete,
}

/// Position of one upload or delete sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Selecting,
    Uploading,
    Recording,
    Deleting,
    RemovingRecord,
    Committed,
    Failed(FailedStep),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Selecting => "selecting",
            SyncState::Uploading => "uploading",
            SyncState::Recording => "recording",
            SyncState::Deleting => "deleting",
            SyncState::RemovingRecord => "removing-record",
            SyncState::Committed => "committed",
            SyncState::Failed(FailedStep::ObjectWrite) => "failed(object-write)",
            SyncState::Failed(FailedStep::MetadataWrite) => "failed(metadata-write)",
            SyncState::Failed(FailedStep::ObjectDelete) => "failed(object-delete)",
            SyncState::Failed(FailedStep::MetadataDelete) => "failed(metadata-delete)",
        };
        f.write_str(s)
    }
}

/// Coarse classification of a workflow failure, for callers that map it to
/// a user-facing signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidSelection,
    KeyConflict,
    MetadataStoreUnavailable,
    NotFound,
    ObjectStoreUnavailable,
    PermissionDenied,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    #[error("Failed to store object {name}: {source}")]
    ObjectWrite {
        name: String,
        source: ObjectStoreError,
    },
    #[error("Object {name} was stored but its metadata was not recorded: {source}")]
    MetadataWrite {
        name: String,
        url: String,
        source: MetadataStoreError,
    },
    #[error("Failed to delete object {name}: {source}")]
    ObjectDelete {
        name: String,
        source: ObjectStoreError,
    },
    #[error("Object {name} was deleted but its metadata remains: {source}")]
    MetadataDelete {
        name: String,
        source: MetadataStoreError,
    },
    #[error("Media not found: {0}")]
    NotFound(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidSelection(_) => ErrorKind::InvalidSelection,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::ObjectWrite { source, .. } | WorkflowError::ObjectDelete { source, .. } => {
                match source {
                    ObjectStoreError::AlreadyExists(_) => ErrorKind::KeyConflict,
                    ObjectStoreError::NotFound(_) => ErrorKind::NotFound,
                    ObjectStoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
                    ObjectStoreError::InvalidName(_) => ErrorKind::InvalidSelection,
                    _ => ErrorKind::ObjectStoreUnavailable,
                }
            }
            WorkflowError::MetadataWrite { source, .. }
            | WorkflowError::MetadataDelete { source, .. } => match source {
                MetadataStoreError::Conflict(_) => ErrorKind::KeyConflict,
                MetadataStoreError::NotFound(_) => ErrorKind::NotFound,
                _ => ErrorKind::MetadataStoreUnavailable,
            },
        }
    }

    /// The step a sequence stopped at, if it got past validation.
    pub fn failed_step(&self) -> Option<FailedStep> {
        match self {
            WorkflowError::ObjectWrite { .. } => Some(FailedStep::ObjectWrite),
            WorkflowError::MetadataWrite { .. } => Some(FailedStep::MetadataWrite),
            WorkflowError::ObjectDelete { .. } => Some(FailedStep::ObjectDelete),
            WorkflowError::MetadataDelete { .. } => Some(FailedStep::MetadataDelete),
            WorkflowError::InvalidSelection(_) | WorkflowError::NotFound(_) => None,
        }
    }
}

fn transition(name: &str, state: SyncState) {
    tracing::info!(blob = %name, state = %state, "Media sync transition");
}

// ============================================================================
// Workflow
// ============================================================================

/// Runs upload and delete sequences over an object store and a metadata store.
#[derive(Clone)]
pub struct MediaWorkflow {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
}

impl MediaWorkflow {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata, objects }
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Full metadata snapshot, newest first.
    pub async fn snapshot(&self) -> Result<Vec<MediaRecord>, MetadataStoreError> {
        self.metadata.query().await
    }

    pub async fn upload(&self, selection: &Selection) -> Result<MediaRecord, WorkflowError> {
        self.upload_at(selection, Utc::now()).await
    }

    /// Upload with an explicit upload time, which fixes the blob name.
    pub async fn upload_at(
        &self,
        selection: &Selection,
        now: DateTime<Utc>,
    ) -> Result<MediaRecord, WorkflowError> {
        if selection.file_name().is_empty() {
            return Err(WorkflowError::InvalidSelection(
                "file name must not be empty".to_string(),
            ));
        }

        let name = blob_name(now, selection.file_name());
        transition(&name, SyncState::Selecting);

        // Phase 1: object
        transition(&name, SyncState::Uploading);
        let url = match self
            .objects
            .put(&name, selection.data().clone(), selection.content_type())
            .await
        {
            Ok(url) => url,
            Err(e) => {
                transition(&name, SyncState::Failed(FailedStep::ObjectWrite));
                tracing::error!(blob = %name, error = %e, "Object upload failed");
                return Err(WorkflowError::ObjectWrite { name, source: e });
            }
        };

        // Phase 2: metadata. No compensating delete on failure.
        transition(&name, SyncState::Recording);
        let record = MediaRecord::new(name.clone(), url.clone(), selection.file_type(), now);
        let record = match self.metadata.create(&record).await {
            Ok(record) => record,
            Err(e) => {
                transition(&name, SyncState::Failed(FailedStep::MetadataWrite));
                tracing::error!(
                    blob = %name,
                    url = %url,
                    error = %e,
                    "Metadata write failed; object is orphaned"
                );
                return Err(WorkflowError::MetadataWrite {
                    name,
                    url,
                    source: e,
                });
            }
        };

        transition(&name, SyncState::Committed);
        Ok(record)
    }

    /// Delete the object, then its metadata record.
    pub async fn delete(&self, name: &str, file_type: FileType) -> Result<(), WorkflowError> {
        transition(name, SyncState::Deleting);
        let object_absent = match self.objects.delete(name).await {
            Ok(()) => false,
            Err(ObjectStoreError::NotFound(_)) => {
                tracing::warn!(blob = %name, "Object already absent; removing metadata");
                true
            }
            Err(e) => {
                transition(name, SyncState::Failed(FailedStep::ObjectDelete));
                tracing::error!(blob = %name, error = %e, "Object delete failed; metadata kept");
                return Err(WorkflowError::ObjectDelete {
                    name: name.to_string(),
                    source: e,
                });
            }
        };

        transition(name, SyncState::RemovingRecord);
        match self.metadata.delete(name, file_type).await {
            Ok(()) => {}
            Err(MetadataStoreError::NotFound(_)) if object_absent => {
                transition(name, SyncState::Failed(FailedStep::MetadataDelete));
                return Err(WorkflowError::NotFound(name.to_string()));
            }
            Err(MetadataStoreError::NotFound(_)) => {
                tracing::warn!(blob = %name, "Metadata already absent");
            }
            Err(e) => {
                transition(name, SyncState::Failed(FailedStep::MetadataDelete));
                tracing::error!(
                    blob = %name,
                    error = %e,
                    "Metadata delete failed; record is dangling"
                );
                return Err(WorkflowError::MetadataDelete {
                    name: name.to_string(),
                    source: e,
                });
            }
        }

        transition(name, SyncState::Committed);
        Ok(())
    }
}
