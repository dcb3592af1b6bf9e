//! Cache orchestrator.
//!
//! Per request: normalize → lookup → hit, or miss → generate → persist →
//! respond. The store holds raw generator output; the pixel transform runs
//! on every [`Pipeline::render`] and [`Pipeline::details`] call.
//!
//! # Concurrency
//!
//! Two concurrent misses for the same key both generate. Only the first
//! insert persists; the other caller still receives its own image. There is
//! no in-flight deduplication (single-flight), so duplicate work is possible
//! under concurrent first requests for a prompt.
//!
//! Votes are unbounded per key: nothing limits how often one client votes.

mod builder;

pub use builder::PipelineBuilder;

use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::generator::{GenerationQueue, ImageGenerator};
use crate::pixel::{self, DEFAULT_MAX_COLORS, Swatch, decode_image, extract_palette};
use crate::store::{self, ImageStore, StoreStatus};
use crate::telemetry;
use crate::types::{CacheKey, Lookup, Rating, Vote, normalize};
use crate::{PixcacheError, Result};

/// Where an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Served from the store.
    Hit,
    /// Produced by the generator for this request.
    Generated,
}

/// Untransformed image for a prompt.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub key: CacheKey,
    /// Raw generator output (decoded from the store on a hit).
    pub image: DynamicImage,
    /// Always 0 for freshly generated images.
    pub rating_sum: i64,
    pub origin: Origin,
}

/// Display-ready result of [`Pipeline::render`].
#[derive(Debug, Clone)]
pub struct Rendered {
    pub key: CacheKey,
    /// 512×512 pixel-art PNG.
    pub png: Vec<u8>,
    pub palette: Vec<Swatch>,
    pub rating_sum: i64,
    pub origin: Origin,
}

/// Everything known about a cached prompt, from [`Pipeline::details`].
#[derive(Debug, Clone)]
pub struct Details {
    pub key: CacheKey,
    /// Stored source image, as persisted.
    pub source_png: Vec<u8>,
    /// 512×512 pixel-art PNG.
    pub full_png: Vec<u8>,
    /// 128×128 pixel-art PNG.
    pub small_png: Vec<u8>,
    /// Palette of the small image.
    pub palette: Vec<Swatch>,
    pub rating: Rating,
}

/// Prompt-keyed image cache in front of a generator.
///
/// Build once at startup with [`Pipeline::builder()`] and share behind an
/// `Arc`; all methods take `&self`.
pub struct Pipeline {
    store: Arc<dyn ImageStore>,
    queue: GenerationQueue,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Connect the configured store and start the generation queue.
    ///
    /// Store problems never fail this call; they put the pipeline in
    /// no-store mode.
    pub async fn from_config(config: &Config, generator: Arc<dyn ImageGenerator>) -> Result<Self> {
        let store = store::connect(&config.store).await;
        Self::builder()
            .store(store)
            .generator(generator)
            .queue(config.generation.clone())
            .build()
    }

    pub fn store_status(&self) -> StoreStatus {
        self.store.status()
    }

    pub fn store(&self) -> &Arc<dyn ImageStore> {
        &self.store
    }

    /// Jobs waiting for a generation worker.
    pub fn queued_generations(&self) -> usize {
        self.queue.queued()
    }

    /// Return the cached image for `raw`, generating and caching it on a
    /// miss.
    ///
    /// Store faults, including a stored blob that no longer decodes, fall
    /// through to generation: the caller always gets an image unless the
    /// prompt is invalid or the generator fails.
    ///
    /// # Errors
    ///
    /// [`PixcacheError::InvalidInput`] for an empty or oversized prompt,
    /// [`PixcacheError::Generation`] when the generator fails.
    pub async fn get_or_create(&self, raw: &str) -> Result<CachedImage> {
        let key = normalize(raw)?;

        if self.store.status().is_available() {
            match self.store.lookup(&key).await {
                Lookup::Found(entry) => match decode_image(&entry.image) {
                    Ok(image) => {
                        metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                        debug!(key = %key, "cache hit");
                        return Ok(CachedImage {
                            key,
                            image,
                            rating_sum: entry.rating_sum,
                            origin: Origin::Hit,
                        });
                    }
                    Err(e) => {
                        metrics::counter!(telemetry::STORE_ERRORS_TOTAL, "operation" => "decode")
                            .increment(1);
                        warn!(key = %key, error = %e, "stored image unreadable, generating uncached");
                    }
                },
                Lookup::NotFound => debug!(key = %key, "cache miss"),
                Lookup::Unavailable => debug!(key = %key, "store unavailable, generating uncached"),
            }
        }

        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        let image = self.queue.submit(key.clone()).await?;
        Ok(CachedImage {
            key,
            image,
            rating_sum: 0,
            origin: Origin::Generated,
        })
    }

    /// Record a vote on the cached entry for `raw`.
    ///
    /// # Errors
    ///
    /// [`PixcacheError::NotFound`] if the prompt was never cached,
    /// [`PixcacheError::StoreUnavailable`] in no-store mode.
    pub async fn vote(&self, raw: &str, vote: Vote) -> Result<Rating> {
        let key = normalize(raw)?;
        let result = self.store.update_rating(&key, vote).await;

        let status = match &result {
            Ok(_) => "ok",
            Err(PixcacheError::NotFound(_)) => "not_found",
            Err(PixcacheError::StoreUnavailable) => "unavailable",
            Err(_) => "error",
        };
        metrics::counter!(telemetry::VOTES_TOTAL, "status" => status).increment(1);

        if let Ok(rating) = &result {
            debug!(key = %key, %vote, sum = rating.sum, count = rating.count, "vote recorded");
        }
        result
    }

    /// [`get_or_create`](Self::get_or_create), then pixelate to 512×512 and
    /// extract the palette.
    pub async fn render(&self, raw: &str) -> Result<Rendered> {
        let cached = self.get_or_create(raw).await?;
        let CachedImage {
            key,
            image,
            rating_sum,
            origin,
        } = cached;

        let (png, palette) = run_blocking(move || {
            let full = pixel::to_full_pixel(&image);
            let palette = extract_palette(&full, DEFAULT_MAX_COLORS);
            Ok((pixel::encode_rgb_png(&full)?, palette))
        })
        .await?;

        Ok(Rendered {
            key,
            png,
            palette,
            rating_sum,
            origin,
        })
    }

    /// Source, both pixelated sizes, palette, and rating for a cached
    /// prompt. Never generates.
    ///
    /// # Errors
    ///
    /// [`PixcacheError::NotFound`] if the prompt was never cached,
    /// [`PixcacheError::StoreUnavailable`] in no-store mode or when the
    /// store cannot be read.
    pub async fn details(&self, raw: &str) -> Result<Details> {
        let key = normalize(raw)?;
        if !self.store.status().is_available() {
            return Err(PixcacheError::StoreUnavailable);
        }

        let entry = match self.store.lookup(&key).await {
            Lookup::Found(entry) => entry,
            Lookup::NotFound => return Err(PixcacheError::NotFound(key.to_string())),
            Lookup::Unavailable => return Err(PixcacheError::StoreUnavailable),
        };
        let rating = entry.rating();
        let source_png = entry.image;

        let (source_png, small_png, full_png, palette) = run_blocking(move || {
            let source = decode_image(&source_png)?;
            let small = pixel::to_small_pixel(&source);
            let full = pixel::resize_nearest(&small, pixel::FULL_SIZE, pixel::FULL_SIZE);
            let palette = extract_palette(&small, DEFAULT_MAX_COLORS);
            Ok((
                source_png,
                pixel::encode_rgb_png(&small)?,
                pixel::encode_rgb_png(&full)?,
                palette,
            ))
        })
        .await?;

        Ok(Details {
            key,
            source_png,
            full_png,
            small_png,
            palette,
            rating,
        })
    }

    /// Stop the generation workers after queued jobs finish.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }
}

/// Run CPU-bound image work off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PixcacheError::Image(format!("image task failed: {e}")))?
}
