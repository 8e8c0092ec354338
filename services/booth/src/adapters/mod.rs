pub mod blob_store;
pub mod fetcher;
pub mod image_api;
pub mod kv_store;

pub use blob_store::{FileBlobStore, MemoryBlobStore};
pub use fetcher::HttpImageFetcher;
pub use image_api::HttpImageGenerator;
pub use kv_store::{MemoryKvStore, SqliteKvStore};
