use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;

use super::MediaWorkflow;
use crate::object_store::ObjectStoreError;
use crate::storage::models::MediaRecord;
use crate::storage::MetadataStoreError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to list objects: {0}")]
    Objects(#[from] ObjectStoreError),
    #[error("Failed to query metadata: {0}")]
    Metadata(#[from] MetadataStoreError),
}

/// Differences between the object store and the metadata store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Objects with no metadata record
    pub orphans: Vec<String>,
    /// Records whose object is gone
    pub dangling: Vec<MediaRecord>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.orphans.is_empty() && self.dangling.is_empty()
    }
}

/// Outcome of a repair pass
#[derive(Debug, Default, Serialize)]
pub struct RepairStats {
    pub orphans_deleted: u64,
    /// Orphans younger than the grace period, or without a timestamp prefix
    pub orphans_skipped: u64,
    pub dangling_removed: u64,
    pub failures: u64,
}

/// Upload time encoded in a blob name's `<millis>-` prefix.
fn uploaded_at(name: &str) -> Option<DateTime<Utc>> {
    let (millis, _) = name.split_once('-')?;
    DateTime::from_timestamp_millis(millis.parse().ok()?)
}

impl MediaWorkflow {
    /// Compare both stores and report orphans and dangling records.
    ///
    /// Metadata is read before objects: a record only exists after its object
    /// was written, so an upload finishing mid-sweep cannot show up as dangling.
    /// It can show up as an orphan, which `repair` protects with a grace period.
    pub async fn reconcile(&self) -> Result<ReconcileReport, ReconcileError> {
        let records = self.metadata.query().await?;
        let objects = self.objects.list().await?;

        let recorded: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let stored: HashSet<&str> = objects.iter().map(|n| n.as_str()).collect();

        let orphans: Vec<String> = objects
            .iter()
            .filter(|name| !recorded.contains(name.as_str()))
            .cloned()
            .collect();
        let dangling: Vec<MediaRecord> = records
            .iter()
            .filter(|r| !stored.contains(r.name.as_str()))
            .cloned()
            .collect();

        if !orphans.is_empty() || !dangling.is_empty() {
            tracing::warn!(
                orphans = orphans.len(),
                dangling = dangling.len(),
                "Stores are out of sync"
            );
        }

        Ok(ReconcileReport { orphans, dangling })
    }

    /// Delete orphans older than `grace` and remove dangling records.
    ///
    /// Individual failures are logged and counted; the pass keeps going.
    pub async fn repair(
        &self,
        report: &ReconcileReport,
        grace: TimeDelta,
        now: DateTime<Utc>,
    ) -> RepairStats {
        let mut stats = RepairStats::default();

        for name in &report.orphans {
            match uploaded_at(name) {
                Some(at) if now - at >= grace => match self.objects.delete(name).await {
                    Ok(()) | Err(ObjectStoreError::NotFound(_)) => {
                        tracing::info!(blob = %name, "Deleted orphaned object");
                        stats.orphans_deleted += 1;
                    }
                    Err(e) => {
                        tracing::error!(blob = %name, error = %e, "Failed to delete orphaned object");
                        stats.failures += 1;
                    }
                },
                _ => stats.orphans_skipped += 1,
            }
        }

        for record in &report.dangling {
            match self.metadata.delete(&record.name, record.file_type).await {
                Ok(()) | Err(MetadataStoreError::NotFound(_)) => {
                    tracing::info!(blob = %record.name, "Removed dangling metadata record");
                    stats.dangling_removed += 1;
                }
                Err(e) => {
                    tracing::error!(blob = %record.name, error = %e, "Failed to remove dangling record");
                    stats.failures += 1;
                }
            }
        }

        stats
    }
}
