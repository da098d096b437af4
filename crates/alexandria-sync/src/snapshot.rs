//! Snapshot aggregation and backup.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use alexandria_core::defaults::{BACKUP_BASE_NAME, BACKUP_EXTENSION};
use alexandria_core::{BlobStore, FieldFilter, RelationalStore, Result, Snapshot};

/// Blob name for a snapshot taken at `at`: `{base}-{YYYYMMDDTHHMMSS.mmmZ}.json`.
pub fn snapshot_name(base_name: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}.{}",
        base_name,
        at.format("%Y%m%dT%H%M%S%.3fZ"),
        BACKUP_EXTENSION
    )
}

/// Reads the whole relational dataset and persists it as a JSON blob.
///
/// The four collection reads run concurrently and are not isolated from
/// concurrent writers, so a snapshot may reference a tag that was created or
/// deleted mid-read. Restore skips such references.
#[derive(Clone)]
pub struct SnapshotBuilder {
    relational: Arc<dyn RelationalStore>,
    blobs: Arc<dyn BlobStore>,
    base_name: String,
}

impl SnapshotBuilder {
    pub fn new(relational: Arc<dyn RelationalStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            relational,
            blobs,
            base_name: BACKUP_BASE_NAME.to_string(),
        }
    }

    /// Set the blob name prefix.
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = base_name.into();
        self
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Read every collection concurrently into one [`Snapshot`].
    ///
    /// The first failing read is returned and the reads still in flight are
    /// dropped.
    pub async fn aggregate(&self) -> Result<Snapshot> {
        let filter = FieldFilter::new();
        let (documents, links, journal_entries, tags) = tokio::try_join!(
            self.relational.find_all_documents(&filter),
            self.relational.find_all_links(),
            self.relational.find_all_entries(),
            self.relational.find_all_tags(),
        )?;

        Ok(Snapshot {
            documents,
            journal_entries,
            links,
            tags,
        })
    }

    /// Aggregate, serialize and save a snapshot. Returns its location.
    ///
    /// Nothing is written when any read fails.
    pub async fn backup(&self) -> Result<String> {
        let start = Instant::now();

        let snapshot = match self.aggregate().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    subsystem = "sync",
                    component = "snapshot",
                    op = "backup",
                    error = %e,
                    "Snapshot aggregation failed, no backup written"
                );
                return Err(e);
            }
        };

        let data = snapshot.to_vec()?;
        let name = snapshot_name(&self.base_name, Utc::now());
        let location = self.blobs.save(&name, data).await?;

        info!(
            subsystem = "sync",
            component = "snapshot",
            op = "backup",
            snapshot_id = %name,
            location = %location,
            result_count = snapshot.entity_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Backup written"
        );
        Ok(location)
    }
}
