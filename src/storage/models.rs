use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a media item derived from its file extension.
///
/// Doubles as the partition key of the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Audio,
    Image,
    Other,
    Video,
}

impl FileType {
    /// Derive a file type from the extension of a file name.
    ///
    /// Only the last `.`-separated segment is considered, case-insensitively.
    /// Names without an extension are `Other`.
    pub fn from_file_name(file_name: &str) -> Self {
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return FileType::Other;
        };
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" => FileType::Image,
            "mp4" | "webm" | "mov" => FileType::Video,
            "mp3" | "wav" | "m4a" => FileType::Audio,
            _ => FileType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Audio => "audio",
            FileType::Image => "image",
            FileType::Other => "other",
            FileType::Video => "video",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(FileType::Audio),
            "image" => Ok(FileType::Image),
            "other" => Ok(FileType::Other),
            "video" => Ok(FileType::Video),
            _ => Err(format!("unknown file type '{s}'")),
        }
    }
}

/// Metadata for one stored media object.
///
/// `id` and `name` carry the same value: `<timestamp-millis>-<original file name>`.
/// It is both the blob name in the object store and the primary key in the
/// metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub file_type: FileType,
    pub timestamp: DateTime<Utc>,
}

impl MediaRecord {
    pub fn new(name: String, url: String, file_type: FileType, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: name.clone(),
            name,
            url,
            file_type,
            timestamp,
        }
    }
}

/// Sort records newest first. Ties on timestamp are broken by name, descending,
/// so that the order is total and stable across backends.
pub fn sort_by_recency(records: &mut [MediaRecord]) {
    records.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.name.cmp(&a.name))
    });
}
