//! services/booth/src/adapters/blob_store.rs
//!
//! Concrete implementations of the `BlobStore` port.
//!
//! Storage location for the file store: `<dir>/<id>.img`, exposed locally as a
//! `file://` URL.

use crate::data_url;
use async_trait::async_trait;
use bytes::Bytes;
use dream_booth_core::domain::ImageRef;
use dream_booth_core::ports::{BlobStore, PortError, PortResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

const BLOB_EXTENSION: &str = "img";

fn validate_id(id: &str) -> PortResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PortError::Unexpected(format!("invalid blob id '{}'", id)))
    }
}

fn io_error(e: std::io::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Turns an absolute path into a `file://` reference, percent-encoding as needed.
pub fn file_ref(path: &Path) -> PortResult<ImageRef> {
    Url::from_file_path(path)
        .map(|url| ImageRef::new(String::from(url)))
        .map_err(|_| PortError::Unexpected(format!("'{}' is not an absolute path", path.display())))
}

/// The filesystem path behind a `file://` reference.
pub fn path_from_file_ref(reference: &ImageRef) -> PortResult<PathBuf> {
    Url::parse(reference.as_str())
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| PortError::Unexpected(format!("'{}' is not a local file URL", reference)))
}

//=========================================================================================
// File-backed store
//=========================================================================================

#[derive(Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Creates the directory if needed. The store keeps its absolute path so
    /// local references stay valid whatever the working directory.
    pub async fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir.as_ref()).await?;
        let dir = tokio::fs::canonicalize(dir.as_ref()).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, BLOB_EXTENSION))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, id: &str, data: Bytes) -> PortResult<()> {
        validate_id(id)?;
        let path = self.path_for(id);
        // Readers only ever see a complete file.
        let tmp = self.dir.join(format!("{}.{}.tmp", id, Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(e));
        }
        debug!(id, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, id: &str) -> PortResult<Option<Bytes>> {
        validate_id(id)?;
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn local_ref(&self, id: &str) -> PortResult<Option<ImageRef>> {
        validate_id(id)?;
        let path = self.path_for(id);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => file_ref(&path).map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn remove(&self, id: &str) -> PortResult<()> {
        validate_id(id)?;
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn clear(&self) -> PortResult<()> {
        for id in self.keys().await? {
            if let Err(e) = self.remove(&id).await {
                warn!(id = %id, error = %e, "Failed to delete blob file");
            }
        }
        Ok(())
    }

    async fn keys(&self) -> PortResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == BLOB_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

/// Keeps blobs in memory; local references are inline `data:` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: &str, data: Bytes) -> PortResult<()> {
        validate_id(id)?;
        self.blobs.lock().await.insert(id.to_string(), data);
        Ok(())
    }

    async fn get(&self, id: &str) -> PortResult<Option<Bytes>> {
        Ok(self.blobs.lock().await.get(id).cloned())
    }

    async fn local_ref(&self, id: &str) -> PortResult<Option<ImageRef>> {
        Ok(self
            .blobs
            .lock()
            .await
            .get(id)
            .map(|data| ImageRef::new(data_url::encode(data))))
    }

    async fn remove(&self, id: &str) -> PortResult<()> {
        self.blobs.lock().await.remove(id);
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        self.blobs.lock().await.clear();
        Ok(())
    }

    async fn keys(&self) -> PortResult<Vec<String>> {
        Ok(self.blobs.lock().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_lists_and_resolves_locally() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).await.unwrap();

        store.put("b-2", Bytes::from_static(b"two")).await.unwrap();
        store.put("a-1", Bytes::from_static(b"one")).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a-1", "b-2"]);

        let local = store.local_ref("a-1").await.unwrap().unwrap();
        assert!(local.as_str().starts_with("file://"));
        assert_eq!(store.get("a-1").await.unwrap().unwrap(), Bytes::from_static(b"one"));
        assert_eq!(store.local_ref("missing").await.unwrap(), None);

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_ref_is_a_valid_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path().join("my photos")).await.unwrap();
        store.put("x-archive", Bytes::from_static(b"GIF89a")).await.unwrap();

        let local = store.local_ref("x-archive").await.unwrap().unwrap();
        assert!(local.as_str().starts_with("file:///"));
        assert!(local.as_str().contains("my%20photos/x-archive.img"));

        let path = path_from_file_ref(&local).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"GIF89a");
    }

    #[tokio::test]
    async fn overwrite_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).await.unwrap();
        store.put("a", Bytes::from_static(b"first")).await.unwrap();
        store.put("a", Bytes::from_static(b"second")).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap(), Bytes::from_static(b"second"));
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["a.img".to_string()]);
    }

    #[test]
    fn only_file_urls_resolve_to_paths() {
        assert!(path_from_file_ref(&ImageRef::from("https://cdn/a.png")).is_err());
        assert!(path_from_file_ref(&ImageRef::from("file://not a url")).is_err());
    }

    #[tokio::test]
    async fn file_store_refuses_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).await.unwrap();
        assert!(store.put("../x", Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test]
    async fn memory_store_resolves_to_data_url() {
        let store = MemoryBlobStore::new();
        store.put("id", Bytes::from_static(b"GIF89a")).await.unwrap();
        let local = store.local_ref("id").await.unwrap().unwrap();
        assert!(local.as_str().starts_with("data:image/gif;base64,"));
    }
}
