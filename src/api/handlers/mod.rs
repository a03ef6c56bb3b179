mod admin;
mod media;
mod metadata;
mod objects;

use crate::api::response::ApiError;
use crate::gallery::GalleryError;
use crate::storage::MetadataStoreError;
use crate::workflow::{ErrorKind, WorkflowError};

pub use admin::{health, reconcile_report, reconcile_repair};
pub use media::{delete_media, list_media, upload_media};
pub use metadata::{create_metadata, delete_metadata, list_metadata};
pub use objects::serve_object;

/// Map a MetadataStoreError to an ApiError
fn metadata_error(e: MetadataStoreError) -> ApiError {
    match e {
        MetadataStoreError::Conflict(name) => {
            ApiError::conflict(format!("A record named '{name}' already exists"))
        }
        MetadataStoreError::NotFound(name) => ApiError::not_found(format!("No record named '{name}'")),
        _ => ApiError::internal(e.to_string()),
    }
}

/// Map a WorkflowError to an ApiError
fn workflow_error(e: WorkflowError) -> ApiError {
    let error = match e.kind() {
        ErrorKind::InvalidSelection => ApiError::bad_request(e.to_string()),
        ErrorKind::KeyConflict => ApiError::conflict(e.to_string()),
        ErrorKind::NotFound => ApiError::not_found(e.to_string()),
        ErrorKind::PermissionDenied => ApiError::forbidden(e.to_string()),
        ErrorKind::MetadataStoreUnavailable | ErrorKind::ObjectStoreUnavailable => match &e {
            WorkflowError::MetadataWrite { .. } => ApiError::bad_gateway(e.to_string()),
            _ => ApiError::internal(e.to_string()),
        },
    };

    match e {
        WorkflowError::MetadataWrite { name, .. } => error.with_orphan(name),
        _ => error,
    }
}

fn gallery_error(e: GalleryError) -> ApiError {
    match e {
        GalleryError::UnknownMedia(name) => ApiError::not_found(format!("Media '{name}' not found")),
        GalleryError::NothingSelected => ApiError::bad_request(e.to_string()),
        GalleryError::Workflow(e) => workflow_error(e),
        GalleryError::Refresh(e) => metadata_error(e),
    }
}
