//! services/booth/src/adapters/image_api.rs
//!
//! This module contains the adapter for the OpenAI-compatible image generation
//! endpoint. It implements the `ImageGenerationService` port from the `core` crate.

use async_trait::async_trait;
use dream_booth_core::domain::ImageRef;
use dream_booth_core::ports::{
    GeneratedImage, GenerationRequest, ImageGenerationService, PortError, PortResult,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct GenerateImageBody<'a> {
    model: &'a str,
    prompt: &'a str,
    response_format: &'static str,
    image: Vec<&'a str>,
}

#[derive(Deserialize)]
struct GenerateImageResponse {
    #[serde(default)]
    data: Vec<GeneratedImageData>,
}

#[derive(Deserialize)]
struct GeneratedImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ImageGenerationService` over HTTP.
#[derive(Clone)]
pub struct HttpImageGenerator {
    client: reqwest::Client,
}

impl HttpImageGenerator {
    /// Creates a new `HttpImageGenerator`. Each request carries its own timeout.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/images/generations", base_url.trim_end_matches('/'))
    }
}

//=========================================================================================
// `ImageGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageGenerationService for HttpImageGenerator {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<GeneratedImage> {
        let body = GenerateImageBody {
            model: &request.model_id,
            prompt: &request.prompt,
            response_format: "url",
            image: vec![request.reference_image.as_str()],
        };

        info!(model = %request.model_id, "Requesting image generation");

        let response = self
            .client
            .post(Self::endpoint(&request.api_base_url))
            .bearer_auth(&request.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PortError::Timeout(request.timeout)
                } else {
                    PortError::Remote(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %error_text, "Image generation request failed");
            return Err(PortError::Remote(format!(
                "{} - {}",
                status.as_u16(),
                error_text
            )));
        }

        let parsed: GenerateImageResponse = response
            .json()
            .await
            .map_err(|e| PortError::Remote(format!("malformed response: {}", e)))?;

        let first = parsed.data.into_iter().next();
        let image = match first {
            Some(GeneratedImageData { url: Some(url), .. }) if !url.is_empty() => ImageRef::new(url),
            Some(GeneratedImageData {
                b64_json: Some(b64),
                ..
            }) if !b64.is_empty() => ImageRef::new(format!("data:image/png;base64,{}", b64)),
            _ => {
                return Err(PortError::Remote(
                    "malformed response: no image URL in result".to_string(),
                ))
            }
        };

        info!("Image generation successful");
        Ok(GeneratedImage { image })
    }
}
