use async_trait::async_trait;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{sort_by_recency, FileType, MediaRecord};
use super::tables::*;
use super::{MetadataStore, MetadataStoreError};

impl Database {
    // ========================================================================
    // Media record operations
    // ========================================================================

    /// Insert a media record. Returns `false` without writing if the id is taken.
    pub fn insert_media(&self, record: &MediaRecord) -> Result<bool, DatabaseError> {
        debug_assert!(!record.id.is_empty(), "record id must not be empty");

        let write_txn = self.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(MEDIA)?;
            if table.get(record.id.as_str())?.is_some() {
                false
            } else {
                let data = rmp_serde::to_vec_named(record)?;
                table.insert(record.id.as_str(), data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Get a media record by name
    pub fn get_media(&self, name: &str) -> Result<Option<MediaRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(MEDIA)?;

        match table.get(name)? {
            Some(data) => {
                let record: MediaRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// All media records, newest first
    pub fn list_media(&self) -> Result<Vec<MediaRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(MEDIA)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let record: MediaRecord = rmp_serde::from_slice(value.value())?;
            records.push(record);
        }

        sort_by_recency(&mut records);
        Ok(records)
    }

    /// Delete a record addressed by name and partition.
    ///
    /// Returns `false` if no record with that name exists in that partition.
    pub fn delete_media(&self, name: &str, file_type: FileType) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let in_partition = {
            let table = write_txn.open_table(MEDIA)?;
            let result = match table.get(name)? {
                Some(data) => {
                    let record: MediaRecord = rmp_serde::from_slice(data.value())?;
                    record.file_type == file_type
                }
                None => false,
            };
            result
        };

        if in_partition {
            let mut table = write_txn.open_table(MEDIA)?;
            table.remove(name)?;
        }

        write_txn.commit()?;
        Ok(in_partition)
    }
}

#[async_trait]
impl MetadataStore for Database {
    async fn create(&self, record: &MediaRecord) -> Result<MediaRecord, MetadataStoreError> {
        if !self.insert_media(record)? {
            return Err(MetadataStoreError::Conflict(record.id.clone()));
        }
        tracing::debug!(name = %record.name, file_type = %record.file_type, "Inserted media record");
        Ok(record.clone())
    }

    async fn query(&self) -> Result<Vec<MediaRecord>, MetadataStoreError> {
        Ok(self.list_media()?)
    }

    async fn delete(&self, name: &str, file_type: FileType) -> Result<(), MetadataStoreError> {
        if !self.delete_media(name, file_type)? {
            if let Some(existing) = self.get_media(name)? {
                tracing::warn!(
                    name = %name,
                    requested = %file_type,
                    stored = %existing.file_type,
                    "Delete addressed the wrong partition"
                );
            }
            return Err(MetadataStoreError::NotFound(name.to_string()));
        }
        tracing::debug!(name = %name, file_type = %file_type, "Deleted media record");
        Ok(())
    }
}
