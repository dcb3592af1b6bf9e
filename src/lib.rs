//! Pixcache - prompt-keyed image cache for slow generative models
//!
//! Given a text prompt, pixcache returns a pixel-art image, invoking the
//! (expensive) generator only once per distinct normalized prompt. Every
//! later request for the prompt is served from a persistent store. When the
//! store is missing or down, images are still generated, just not cached.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pixcache::generator::HttpGenerator;
//! use pixcache::store::{self, StoreConfig};
//! use pixcache::{Pipeline, Vote};
//!
//! #[tokio::main]
//! async fn main() -> pixcache::Result<()> {
//!     let store = store::connect(&StoreConfig::new().url("sqlite://pixcache.db")).await;
//!     let generator = HttpGenerator::new("http://gpu-host:7860/generate")?;
//!
//!     let pipeline = Pipeline::builder()
//!         .store(store)
//!         .generator(Arc::new(generator))
//!         .build()?;
//!
//!     let rendered = pipeline.render("  A Cat  ").await?;
//!     std::fs::write("a-cat.png", &rendered.png).ok();
//!     for swatch in &rendered.palette {
//!         println!("{} on {}", swatch.hex(), swatch.foreground.hex());
//!     }
//!
//!     pipeline.vote("a cat", Vote::Up).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod pixel;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use config::Config;
pub use error::{PixcacheError, Result};
pub use generator::{BlockingGenerator, ImageGenerator};
pub use pipeline::{CachedImage, Details, Origin, Pipeline, PipelineBuilder, Rendered};
pub use pixel::{Swatch, extract_palette, to_full_pixel, to_small_pixel};
pub use store::{ImageStore, StoreStatus};

// Re-export all types
pub use types::{CacheEntry, CacheKey, InsertOutcome, Lookup, Rating, Vote, normalize};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
