//! services/booth/src/blob_cache.rs
//!
//! Local copies of generated images, keyed by history id, so entries stay viewable
//! after the remote URL they came from has expired. Every operation is best-effort:
//! failures are logged and reported as `false`/`None`, never raised.

use crate::adapters::blob_store::path_from_file_ref;
use crate::data_url;
use bytes::Bytes;
use dream_booth_core::domain::{ImageKind, ImageRef};
use dream_booth_core::ports::{BlobStore, ImageFetchService, PortError, PortResult};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Size assumed for every cached image when estimating usage.
pub const ESTIMATED_BYTES_PER_ITEM: u64 = 200 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub estimated_size_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
}

pub struct BlobCache {
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn ImageFetchService>,
}

impl BlobCache {
    pub fn new(store: Arc<dyn BlobStore>, fetcher: Arc<dyn ImageFetchService>) -> Self {
        Self { store, fetcher }
    }

    /// Resolves `source` to bytes and stores them under `id`.
    pub async fn put(&self, id: &str, source: &ImageRef) -> bool {
        let data = match self.resolve(source).await {
            Ok(data) => data,
            Err(e) => {
                error!(id, error = %e, "Failed to download image for caching");
                return false;
            }
        };
        match self.store.put(id, data).await {
            Ok(()) => true,
            Err(e) => {
                error!(id, error = %e, "Failed to cache image");
                false
            }
        }
    }

    /// A reference that resolves without the network, or `None` if nothing is cached.
    pub async fn get(&self, id: &str) -> Option<ImageRef> {
        match self.store.local_ref(id).await {
            Ok(local) => local,
            Err(e) => {
                warn!(id, error = %e, "Failed to read cached image");
                None
            }
        }
    }

    pub async fn remove(&self, id: &str) -> bool {
        match self.store.remove(id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id, error = %e, "Failed to delete cached image");
                false
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.store.clear().await {
            error!(error = %e, "Failed to clear image cache");
        }
    }

    /// Every cached entry as a `data:` URL. `on_progress(current, total, message)` is
    /// called after each item; entries that cannot be read are skipped.
    pub async fn export_all<F>(&self, mut on_progress: F) -> BTreeMap<String, String>
    where
        F: FnMut(usize, usize, &str),
    {
        let ids = match self.store.keys().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Failed to list cached images");
                return BTreeMap::new();
            }
        };
        let total = ids.len();

        let mut exported = BTreeMap::new();
        let mut entries = stream::iter(ids.into_iter().enumerate())
            .then(|(index, id)| async move {
                let data = self.store.get(&id).await;
                (index, id, data)
            })
            .boxed();

        while let Some((index, id, data)) = entries.next().await {
            let message = match data {
                Ok(Some(data)) => {
                    exported.insert(id.clone(), data_url::encode(&data));
                    format!("exported {}", id)
                }
                Ok(None) => format!("skipped {} (missing)", id),
                Err(e) => {
                    warn!(id = %id, error = %e, "Skipping unreadable cached image");
                    format!("skipped {} ({})", id, e)
                }
            };
            on_progress(index + 1, total, &message);
            // Large caches must not monopolize the runtime.
            tokio::task::yield_now().await;
        }
        exported
    }

    /// Reverse of `export_all`, one entry at a time.
    pub async fn import_all(&self, images: &BTreeMap<String, String>) -> ImportReport {
        let mut report = ImportReport::default();
        for (id, encoded) in images {
            let stored = match data_url::decode(encoded) {
                Ok((_, data)) => self.store.put(id, data).await,
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    error!(id = %id, error = %e, "Failed to import cached image");
                    report.failed += 1;
                }
            }
            tokio::task::yield_now().await;
        }
        debug!(imported = report.imported, failed = report.failed, "Import finished");
        report
    }

    /// Approximate usage; the size is a per-item estimate, not a measurement.
    pub async fn stats(&self) -> CacheStats {
        let count = match self.store.keys().await {
            Ok(ids) => ids.len(),
            Err(e) => {
                warn!(error = %e, "Failed to count cached images");
                0
            }
        };
        CacheStats {
            count,
            estimated_size_label: size_label(count as u64 * ESTIMATED_BYTES_PER_ITEM),
        }
    }

    async fn resolve(&self, source: &ImageRef) -> PortResult<Bytes> {
        match source.kind() {
            ImageKind::Data => data_url::decode(source.as_str()).map(|(_, data)| data),
            ImageKind::Remote => self.fetcher.fetch(source.as_str()).await,
            ImageKind::Local => {
                let path = path_from_file_ref(source)?;
                tokio::fs::read(path)
                    .await
                    .map(Bytes::from)
                    .map_err(|e| PortError::Unexpected(e.to_string()))
            }
            ImageKind::Cached => {
                let key = source.cache_key().unwrap_or_default();
                self.store
                    .get(key)
                    .await?
                    .ok_or_else(|| PortError::NotFound(source.to_string()))
            }
            ImageKind::Other => Err(PortError::Unexpected(format!(
                "cannot resolve image reference '{}'",
                source
            ))),
        }
    }
}

fn size_label(bytes: u64) -> String {
    if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryBlobStore;
    use async_trait::async_trait;

    struct StaticFetcher;

    #[async_trait]
    impl ImageFetchService for StaticFetcher {
        async fn fetch(&self, url: &str) -> PortResult<Bytes> {
            if url.contains("expired") {
                Err(PortError::Remote("image download failed: 403".into()))
            } else {
                Ok(Bytes::from_static(b"GIF89a-remote"))
            }
        }
    }

    fn cache() -> BlobCache {
        BlobCache::new(Arc::new(MemoryBlobStore::new()), Arc::new(StaticFetcher))
    }

    #[tokio::test]
    async fn caches_remote_and_inline_sources() {
        let cache = cache();
        assert!(cache.put("remote", &ImageRef::from("https://cdn/a.gif")).await);
        assert!(cache.put("inline", &ImageRef::from("data:,hello")).await);

        let local = cache.get("remote").await.unwrap();
        assert_eq!(local.kind(), ImageKind::Data);
        assert!(cache.get("absent").await.is_none());
    }

    #[tokio::test]
    async fn copies_from_a_local_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let files = crate::adapters::FileBlobStore::open(dir.path().join("old images"))
            .await
            .unwrap();
        files.put("old", Bytes::from_static(b"GIF89a-local")).await.unwrap();
        let source = files.local_ref("old").await.unwrap().unwrap();
        assert_eq!(source.kind(), ImageKind::Local);

        let cache = cache();
        assert!(cache.put("copy", &source).await);
        let (_, data) = data_url::decode(cache.get("copy").await.unwrap().as_str()).unwrap();
        assert_eq!(&data[..], b"GIF89a-local");
    }

    #[tokio::test]
    async fn failed_download_is_not_fatal() {
        let cache = cache();
        assert!(!cache.put("gone", &ImageRef::from("https://cdn/expired.png")).await);
        assert!(!cache.put("odd", &ImageRef::from("mystery")).await);
        assert_eq!(cache.stats().await.count, 0);
    }

    #[tokio::test]
    async fn export_reports_progress_and_import_restores() {
        let source = cache();
        source.put("a", &ImageRef::from("data:,one")).await;
        source.put("b", &ImageRef::from("https://cdn/b.gif")).await;

        let mut progress = Vec::new();
        let exported = source
            .export_all(|current, total, _| progress.push((current, total)))
            .await;
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
        assert_eq!(exported.len(), 2);
        assert!(exported["b"].starts_with("data:image/gif;base64,"));

        let mut payload = exported.clone();
        payload.insert("broken".into(), "not a data url".into());

        let target = cache();
        let report = target.import_all(&payload).await;
        assert_eq!(report, ImportReport { imported: 2, failed: 1 });
        assert_eq!(target.get("a").await, source.get("a").await);
    }

    #[tokio::test]
    async fn stats_use_per_item_estimate() {
        let cache = cache();
        assert_eq!(cache.stats().await.estimated_size_label, "0.0 KB");
        for i in 0..3 {
            cache.put(&format!("i{i}"), &ImageRef::from("data:,x")).await;
        }
        assert_eq!(cache.stats().await.estimated_size_label, "600.0 KB");
        for i in 3..6 {
            cache.put(&format!("i{i}"), &ImageRef::from("data:,x")).await;
        }
        let stats = cache.stats().await;
        assert_eq!(stats.count, 6);
        assert_eq!(stats.estimated_size_label, "1.2 MB");

        cache.clear().await;
        assert_eq!(cache.stats().await.count, 0);
    }
}
