//! services/booth/src/adapters/fetcher.rs
//!
//! Downloads remote images so they can be copied into the blob cache.

use async_trait::async_trait;
use bytes::Bytes;
use dream_booth_core::ports::{ImageFetchService, PortError, PortResult};

#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetchService for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> PortResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Remote(format!(
                "image download failed: {}",
                status.as_u16()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| PortError::Remote(e.to_string()))
    }
}
