//! crates/dream_booth_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the storage medium and of the remote image service.

use crate::domain::ImageRef;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., disk, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Remote service error: {0}")]
    Remote(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Image Generation
//=========================================================================================

/// Everything the remote service needs for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub reference_image: ImageRef,
    pub model_id: String,
    pub api_base_url: String,
    pub api_key: String,
    /// How long the call may take before it counts as timed out.
    pub timeout: Duration,
}

/// What the remote service handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub image: ImageRef,
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Generates a stylized image from a prompt and a reference photo.
    async fn generate(&self, request: &GenerationRequest) -> PortResult<GeneratedImage>;
}

#[async_trait]
pub trait ImageFetchService: Send + Sync {
    /// Downloads the raw bytes behind a remote URL.
    async fn fetch(&self, url: &str) -> PortResult<Bytes>;
}

//=========================================================================================
// Durable Storage
//=========================================================================================

/// Durable string key/value storage for the JSON-encoded stores.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    /// Fails with `PortError::QuotaExceeded` when the medium rejects the write.
    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// Keyed binary storage, separate from the JSON stores.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, id: &str, data: Bytes) -> PortResult<()>;

    async fn get(&self, id: &str) -> PortResult<Option<Bytes>>;

    /// A reference that resolves without the network, if the entry exists.
    async fn local_ref(&self, id: &str) -> PortResult<Option<ImageRef>>;

    async fn remove(&self, id: &str) -> PortResult<()>;

    async fn clear(&self) -> PortResult<()>;

    /// All stored ids, in a stable order.
    async fn keys(&self) -> PortResult<Vec<String>>;
}
