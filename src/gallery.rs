//! Gallery view state derived from a metadata snapshot.
//!
//! [`view`] and [`group`] are pure functions of their inputs. [`Gallery`] is
//! the per-session state around them: the last snapshot, the active filter
//! and search term, and the file currently selected for upload.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::models::{FileType, MediaRecord};
use crate::storage::MetadataStoreError;
use crate::workflow::{MediaWorkflow, Selection, WorkflowError};

/// Media-type filter offered to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Audio,
    Image,
    Video,
}

impl Filter {
    pub fn matches(&self, file_type: FileType) -> bool {
        match self {
            Filter::All => true,
            Filter::Audio => file_type == FileType::Audio,
            Filter::Image => file_type == FileType::Image,
            Filter::Video => file_type == FileType::Video,
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Filter::All),
            "audio" => Ok(Filter::Audio),
            "image" => Ok(Filter::Image),
            "video" => Ok(Filter::Video),
            _ => Err(format!("unknown filter '{s}'")),
        }
    }
}

/// Records passing `filter` whose name contains `search`, ignoring case.
/// Snapshot order is preserved.
pub fn view<'a>(snapshot: &'a [MediaRecord], filter: Filter, search: &str) -> Vec<&'a MediaRecord> {
    let needle = search.to_lowercase();
    snapshot
        .iter()
        .filter(|r| filter.matches(r.file_type))
        .filter(|r| needle.is_empty() || r.name.to_lowercase().contains(&needle))
        .collect()
}

/// Records split by how they are rendered.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Groups<'a> {
    pub audio: Vec<&'a MediaRecord>,
    pub image: Vec<&'a MediaRecord>,
    pub other: Vec<&'a MediaRecord>,
    pub video: Vec<&'a MediaRecord>,
}

pub fn group<'a>(records: &[&'a MediaRecord]) -> Groups<'a> {
    let mut groups = Groups::default();
    for &record in records {
        match record.file_type {
            FileType::Audio => groups.audio.push(record),
            FileType::Image => groups.image.push(record),
            FileType::Other => groups.other.push(record),
            FileType::Video => groups.video.push(record),
        }
    }
    groups
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("No file selected")]
    NothingSelected,
    #[error("Media not in gallery: {0}")]
    UnknownMedia(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("Failed to refresh gallery: {0}")]
    Refresh(#[from] MetadataStoreError),
}

/// One user's gallery session.
pub struct Gallery {
    filter: Filter,
    search: String,
    selection: Option<Selection>,
    snapshot: Vec<MediaRecord>,
    workflow: MediaWorkflow,
}

impl Gallery {
    pub fn new(workflow: MediaWorkflow) -> Self {
        Self {
            filter: Filter::All,
            search: String::new(),
            selection: None,
            snapshot: Vec::new(),
            workflow,
        }
    }

    /// Re-read the full metadata snapshot.
    pub async fn refresh(&mut self) -> Result<(), GalleryError> {
        self.snapshot = self.workflow.snapshot().await?;
        Ok(())
    }

    /// Hold a file for upload, releasing any previous selection.
    pub fn select(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Upload the selected file. On success the selection is released and the
    /// snapshot refreshed; on failure the selection is kept for a retry.
    pub async fn upload_selected(&mut self) -> Result<MediaRecord, GalleryError> {
        let selection = self.selection.as_ref().ok_or(GalleryError::NothingSelected)?;
        let record = self.workflow.upload(selection).await?;
        self.selection = None;
        self.refresh().await?;
        Ok(record)
    }

    /// Delete a media item shown in the gallery, then refresh.
    pub async fn delete(&mut self, name: &str) -> Result<(), GalleryError> {
        let file_type = self
            .snapshot
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.file_type)
            .ok_or_else(|| GalleryError::UnknownMedia(name.to_string()))?;

        self.workflow.delete(name, file_type).await?;
        self.refresh().await
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn snapshot(&self) -> &[MediaRecord] {
        &self.snapshot
    }

    /// Records visible under the current filter and search term.
    pub fn visible(&self) -> Vec<&MediaRecord> {
        view(&self.snapshot, self.filter, &self.search)
    }

    pub fn groups(&self) -> Groups<'_> {
        group(&self.visible())
    }
}
