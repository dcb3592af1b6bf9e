//! HTTP image generation client.
//!
//! Talks to any service that accepts `POST {"prompt": "..."}` and answers
//! with the encoded image as the response body (PNG or JPEG), e.g. a thin
//! wrapper around a diffusion pipeline running on a GPU host.

use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use serde::Serialize;

use super::ImageGenerator;
use crate::pixel::decode_image;
use crate::{PixcacheError, Result};

/// Default request timeout. Generation on CPU can take half an hour.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Client for an HTTP text-to-image endpoint.
#[derive(Clone)]
pub struct HttpGenerator {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

impl HttpGenerator {
    /// Create a client for `endpoint` with [`DEFAULT_TIMEOUT`].
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            PixcacheError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: None,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageGenerator for HttpGenerator {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, prompt: &str) -> Result<DynamicImage> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PixcacheError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PixcacheError::Generation(format!(
                "generator returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PixcacheError::Generation(format!("reading response failed: {e}")))?;
        if bytes.is_empty() {
            return Err(PixcacheError::Generation(
                "generator returned an empty body".to_string(),
            ));
        }

        decode_image(&bytes)
            .map_err(|e| PixcacheError::Generation(format!("generator returned no image: {e}")))
    }
}
