//! Builder for configuring pipeline instances

use std::sync::Arc;

use tracing::warn;

use super::Pipeline;
use crate::generator::{GenerationQueue, ImageGenerator, QueueConfig};
use crate::store::{ImageStore, UnavailableStore};
use crate::{PixcacheError, Result};

/// Builder for configuring a [`Pipeline`].
pub struct PipelineBuilder {
    store: Option<Arc<dyn ImageStore>>,
    generator: Option<Arc<dyn ImageGenerator>>,
    queue: QueueConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            generator: None,
            queue: QueueConfig::default(),
        }
    }

    /// Set the store. Without one the pipeline runs in no-store mode.
    pub fn store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the image generator (required).
    pub fn generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the generation queue configuration.
    pub fn queue(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    /// Set the number of concurrent generations (default: 1).
    pub fn workers(mut self, n: usize) -> Self {
        self.queue.workers = n;
        self
    }

    /// Build the pipeline and start its generation workers.
    ///
    /// # Errors
    ///
    /// [`PixcacheError::Configuration`] if no generator was set.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn build(self) -> Result<Pipeline> {
        let generator = self.generator.ok_or_else(|| {
            PixcacheError::Configuration("no image generator configured".to_string())
        })?;
        let store = self.store.unwrap_or_else(|| {
            warn!("no store configured, running without a store");
            Arc::new(UnavailableStore::new())
        });

        let queue = GenerationQueue::new(generator, Arc::clone(&store), &self.queue);
        Ok(Pipeline { store, queue })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
