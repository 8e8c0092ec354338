//! services/booth/src/history.rs
//!
//! The archive of completed generations: newest-first, capped, persisted on every change.

use crate::blob_cache::BlobCache;
use crate::error::{BoothError, BoothResult};
use crate::store::records::{history_to_stored, migrate_history};
use crate::store::{PersistentStore, HISTORY_KEY};
use chrono::Utc;
use dream_booth_core::domain::{HistoryRecord, ImageRef, PhotoRecord, Position};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Maximum number of archived entries; the oldest are evicted beyond this.
pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveOutcome {
    Added(HistoryRecord),
    /// The photo, or an identical original/result pair, is already archived.
    Duplicate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// `Some(true)`: gallery only. `Some(false)`: canvas only. `None`: everything.
    pub parked_only: Option<bool>,
}

pub struct HistoryManager {
    store: Arc<PersistentStore>,
    blob_cache: Option<Arc<BlobCache>>,
    records: RwLock<Vec<HistoryRecord>>,
}

impl HistoryManager {
    pub async fn load(store: Arc<PersistentStore>, blob_cache: Option<Arc<BlobCache>>) -> Self {
        let mut records = store.load(HISTORY_KEY, migrate_history).await;
        records.truncate(HISTORY_CAP);
        info!(count = records.len(), "Loaded history");
        Self {
            store,
            blob_cache,
            records: RwLock::new(records),
        }
    }

    /// Takes ownership of a finished photo and files it at the front of the archive.
    ///
    /// If the write fails the entry is still kept in memory and `Storage` is returned.
    pub async fn archive(&self, photo: PhotoRecord) -> BoothResult<ArchiveOutcome> {
        let result_image_ref = match photo.result_image.clone() {
            Some(result) => result,
            None => {
                return Err(BoothError::InvalidTransition {
                    id: photo.id,
                    phase: photo.kind(),
                    action: "archive",
                })
            }
        };
        let id = HistoryRecord::id_for_photo(photo.id);

        let (record, evicted) = {
            let mut records = self.records.write().await;
            let duplicate = records.iter().any(|r| {
                r.id == id
                    || (r.original_image_ref == photo.original_image
                        && r.source_result_ref == result_image_ref)
            });
            if duplicate {
                debug!(id = %id, "Ignoring duplicate archive request");
                return Ok(ArchiveOutcome::Duplicate);
            }

            // Keep insertion timestamps non-decreasing even if the clock steps back.
            let now = Utc::now();
            let created_at = match records.first() {
                Some(newest) if newest.created_at > now => newest.created_at,
                _ => now,
            };

            let record = HistoryRecord {
                id,
                name: photo.display_name.trim().to_string(),
                dream: photo.dream_text.trim().to_string(),
                original_image_ref: photo.original_image.clone(),
                source_result_ref: result_image_ref.clone(),
                result_image_ref,
                created_at,
                position: photo.display_position(),
                is_parked: false,
            };
            records.insert(0, record.clone());
            let evicted = if records.len() > HISTORY_CAP {
                records.split_off(HISTORY_CAP)
            } else {
                Vec::new()
            };

            info!(id = %record.id, evicted = evicted.len(), "Archived photo");
            let saved = self.persist(&records).await;
            self.forget_blobs(&evicted).await;
            saved?;
            (record, evicted)
        };
        debug!(evicted = evicted.len(), "Archive complete");
        Ok(ArchiveOutcome::Added(record))
    }

    /// Points an entry's result at its local cached copy.
    pub async fn attach_cached_result(&self, id: &str, local: ImageRef) -> BoothResult<()> {
        self.modify(id, |record| record.result_image_ref = local).await
    }

    pub async fn park(&self, id: &str) -> BoothResult<()> {
        self.modify(id, |record| record.is_parked = true).await
    }

    pub async fn unpark(&self, id: &str) -> BoothResult<()> {
        self.modify(id, |record| record.is_parked = false).await
    }

    pub async fn reposition(&self, id: &str, position: Position) -> BoothResult<()> {
        self.modify(id, |record| record.position = position).await
    }

    /// Removes an entry for good, along with its cached image.
    pub async fn delete(&self, id: &str) -> BoothResult<()> {
        let removed = {
            let mut records = self.records.write().await;
            let index = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| BoothError::NotFound(format!("history entry {}", id)))?;
            let removed = records.remove(index);
            let saved = self.persist(&records).await;
            self.forget_blobs(std::slice::from_ref(&removed)).await;
            saved?;
            removed
        };
        info!(id = %removed.id, "Deleted history entry");
        Ok(())
    }

    /// Newest first. Ordering never depends on position.
    pub async fn list(&self, filter: HistoryFilter) -> Vec<HistoryRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| filter.parked_only.map_or(true, |parked| r.is_parked == parked))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<HistoryRecord> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn modify<F>(&self, id: &str, change: F) -> BoothResult<()>
    where
        F: FnOnce(&mut HistoryRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BoothError::NotFound(format!("history entry {}", id)))?;
        change(record);
        self.persist(&records).await
    }

    async fn persist(&self, records: &[HistoryRecord]) -> BoothResult<()> {
        self.store
            .save(HISTORY_KEY, &history_to_stored(records))
            .await?;
        Ok(())
    }

    async fn forget_blobs(&self, records: &[HistoryRecord]) {
        let Some(cache) = &self.blob_cache else {
            return;
        };
        for record in records {
            cache.remove(&record.id).await;
        }
    }
}
