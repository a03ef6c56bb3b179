//! Metadata relay: lets clients without database credentials read and write
//! media records through this service.

use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use super::metadata_error;
use crate::api::response::{ApiError, AppJson};
use crate::storage::models::{sort_by_recency, FileType, MediaRecord};
use crate::AppState;

/// Route: POST /api/metadata
pub async fn create_metadata(
    State(state): State<Arc<AppState>>,
    AppJson(record): AppJson<MediaRecord>,
) -> Result<Json<MediaRecord>, ApiError> {
    if record.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    if record.id != record.name {
        return Err(ApiError::bad_request("id must equal name"));
    }

    let created = state
        .workflow
        .metadata()
        .create(&record)
        .await
        .map_err(metadata_error)?;

    tracing::debug!(blob = %created.name, file_type = %created.file_type, "Relayed metadata create");
    Ok(Json(created))
}

/// Route: GET /api/metadata
///
/// Records are returned newest first whatever order the backend produced.
pub async fn list_metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MediaRecord>>, ApiError> {
    let mut records = state
        .workflow
        .metadata()
        .query()
        .await
        .map_err(metadata_error)?;
    sort_by_recency(&mut records);
    Ok(Json(records))
}

/// Route: DELETE /api/metadata/:file_type/:name
pub async fn delete_metadata(
    State(state): State<Arc<AppState>>,
    Path((file_type, name)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file_type: FileType = file_type
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Unknown file type '{file_type}'")))?;

    state
        .workflow
        .metadata()
        .delete(&name, file_type)
        .await
        .map_err(metadata_error)?;

    tracing::debug!(blob = %name, file_type = %file_type, "Relayed metadata delete");
    Ok(Json(serde_json::json!({})))
}
