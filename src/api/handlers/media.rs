use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{gallery_error, workflow_error};
use crate::api::response::{ApiError, AppQuery};
use crate::gallery::{Filter, Gallery};
use crate::storage::models::{FileType, MediaRecord};
use crate::workflow::Selection;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListMediaParams {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MediaCounts {
    pub audio: usize,
    pub image: usize,
    pub other: usize,
    pub video: usize,
}

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub counts: MediaCounts,
    pub filter: Filter,
    pub items: Vec<MediaRecord>,
    pub search: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Route: POST /api/media
///
/// Multipart fields: `file` (required) and `fileType` (optional override of
/// the type derived from the extension).
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<MediaRecord>, ApiError> {
    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut file_content_type: Option<String> = None;
    let mut file_type: Option<FileType> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_content_type = field.content_type().map(|s| s.to_string());

                let data = field.bytes().await.map_err(multipart_error)?;

                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }

                file_data = Some(data);
            }
            "fileType" => {
                let text = field.text().await.map_err(multipart_error)?;
                let parsed = text
                    .parse::<FileType>()
                    .map_err(|e| ApiError::bad_request(format!("Invalid fileType: {e}")))?;
                file_type = Some(parsed);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let file_data = file_data.ok_or_else(|| ApiError::bad_request("file field is required"))?;
    let file_name = file_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("file field must carry a file name"))?;

    let mut selection = Selection::new(&file_name, file_data);
    // Prefer the part's Content-Type over the guess from the extension
    if let Some(ct) = file_content_type.filter(|ct| ct != "application/octet-stream") {
        selection = selection.with_content_type(ct);
    }
    if let Some(file_type) = file_type {
        selection = selection.with_file_type(file_type);
    }

    let record = state
        .workflow
        .upload(&selection)
        .await
        .map_err(workflow_error)?;

    tracing::debug!(blob = %record.name, file_type = %record.file_type, "Uploaded media");
    Ok(Json(record))
}

/// Route: GET /api/media?filter=&search=
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListMediaParams>,
) -> Result<Json<MediaListResponse>, ApiError> {
    let filter = params
        .filter
        .as_deref()
        .unwrap_or_default()
        .parse::<Filter>()
        .map_err(|e| ApiError::bad_request(format!("Invalid filter: {e}")))?;
    let search = params.search.unwrap_or_default();

    let mut gallery = Gallery::new(state.workflow.clone());
    gallery.set_filter(filter);
    gallery.set_search(search.clone());
    gallery.refresh().await.map_err(gallery_error)?;

    let groups = gallery.groups();
    let counts = MediaCounts {
        audio: groups.audio.len(),
        image: groups.image.len(),
        other: groups.other.len(),
        video: groups.video.len(),
    };

    Ok(Json(MediaListResponse {
        counts,
        filter,
        items: gallery.visible().into_iter().cloned().collect(),
        search,
    }))
}

/// Route: DELETE /api/media/:name
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut gallery = Gallery::new(state.workflow.clone());
    gallery.refresh().await.map_err(gallery_error)?;
    gallery.delete(&name).await.map_err(gallery_error)?;

    tracing::debug!(blob = %name, "Deleted media");
    Ok(Json(serde_json::json!({})))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}
