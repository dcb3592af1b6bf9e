//! Image generators and the generation queue.
//!
//! The generator is an external, slow, resource-constrained function from
//! prompt text to image. The core never retries it: a failure surfaces as
//! [`PixcacheError::Generation`](crate::PixcacheError::Generation) and the
//! caller decides whether to try again.
//!
//! Implementations:
//!
//! - [`HttpGenerator`]: POSTs the prompt to an HTTP endpoint and decodes the
//!   returned image (feature `http-generator`).
//! - [`BlockingGenerator`]: wraps a synchronous closure (e.g. an in-process
//!   model binding) and runs it on tokio's blocking pool.
//!
//! All generation goes through a [`GenerationQueue`], which serializes
//! access to the shared compute resource.

#[cfg(feature = "http-generator")]
mod http;
pub mod queue;

#[cfg(feature = "http-generator")]
pub use http::HttpGenerator;
pub use queue::{GenerationQueue, QueueConfig};

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use crate::{PixcacheError, Result};

/// Text-to-image capability consumed by the pipeline.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generator name for logging/debugging.
    fn name(&self) -> &str;

    /// Produce an image for an already-normalized prompt.
    ///
    /// May take anywhere from seconds to tens of minutes.
    async fn generate(&self, prompt: &str) -> Result<DynamicImage>;
}

type GenerateFn = dyn Fn(&str) -> Result<DynamicImage> + Send + Sync;

/// Generator backed by a blocking closure.
///
/// Each call runs on tokio's blocking thread pool so a long generation never
/// stalls the async workers serving cache hits.
///
/// ```rust
/// # use pixcache::generator::BlockingGenerator;
/// # use image::{DynamicImage, RgbImage};
/// let generator = BlockingGenerator::new("solid", |_prompt: &str| {
///     Ok(DynamicImage::ImageRgb8(RgbImage::new(64, 64)))
/// });
/// ```
#[derive(Clone)]
pub struct BlockingGenerator {
    name: String,
    f: Arc<GenerateFn>,
}

impl BlockingGenerator {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<DynamicImage> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

#[async_trait]
impl ImageGenerator for BlockingGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<DynamicImage> {
        let f = Arc::clone(&self.f);
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || f(&prompt))
            .await
            .map_err(|e| PixcacheError::Generation(format!("generator task failed: {e}")))?
    }
}
