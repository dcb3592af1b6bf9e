//! Bounded generation queue.
//!
//! Jobs go through a bounded `tokio::sync::mpsc` channel to a fixed set of
//! worker tasks. With the default single worker, generations run one at a
//! time on the shared compute resource; when the channel is full, new
//! submissions wait (backpressure) instead of piling up unbounded.
//!
//! Each worker generates, persists the result to the store (best-effort),
//! and only then replies. The reply goes over a `oneshot` channel, so a
//! caller that stops waiting does not cancel the generation and the image
//! still lands in the store.
//!
//! The generation timeout bounds the caller's wait, not the generation.
//! A timed-out caller gets an error right away while the worker keeps
//! waiting for the generator, caches whatever it produces, and only then
//! takes the next job. Generators that block a thread cannot be cancelled,
//! so abandoning them would put two generations on one accelerator.
//!
//! Cache lookups never pass through this queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ImageGenerator;
use crate::pixel::encode_png;
use crate::store::ImageStore;
use crate::telemetry;
use crate::types::{CacheKey, InsertOutcome};
use crate::{PixcacheError, Result};

/// Configuration for the generation queue.
///
/// ```rust
/// # use pixcache::generator::QueueConfig;
/// # use std::time::Duration;
/// let config = QueueConfig::new()
///     .workers(1)
///     .capacity(16)
///     .timeout(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Concurrent generations. Default: 1 (one exclusive accelerator).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Jobs that may wait in the queue. Default: 64.
    #[serde(default = "default_capacity", rename = "queue_capacity")]
    pub capacity: usize,
    /// How long a caller waits for its generation, in seconds. The
    /// generation itself runs to completion. Default: none.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            capacity: default_capacity(),
            timeout_secs: None,
        }
    }
}

fn default_workers() -> usize {
    1
}

fn default_capacity() -> usize {
    64
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

struct Job {
    key: CacheKey,
    reply: oneshot::Sender<Result<DynamicImage>>,
}

/// Everything a worker needs, shared between workers.
struct WorkerContext {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<dyn ImageStore>,
    timeout: Option<Duration>,
}

/// Queue of pending generations served by a fixed pool of workers.
pub struct GenerationQueue {
    tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl GenerationQueue {
    /// Start the worker tasks.
    ///
    /// `workers` and `capacity` are raised to at least 1.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        store: Arc<dyn ImageStore>,
        config: &QueueConfig,
    ) -> Self {
        let capacity = config.capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let context = Arc::new(WorkerContext {
            generator,
            store,
            timeout: config.generation_timeout(),
        });

        let workers = (0..config.workers.max(1))
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&rx), Arc::clone(&context))))
            .collect();

        Self {
            tx,
            workers,
            capacity,
        }
    }

    /// Queue a generation for `key` and wait for the image.
    ///
    /// Waits for a free slot when the queue is full. Dropping the returned
    /// future after the job is queued does not cancel it.
    pub async fn submit(&self, key: CacheKey) -> Result<DynamicImage> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { key, reply })
            .await
            .map_err(|_| PixcacheError::QueueClosed)?;
        rx.await.map_err(|_| PixcacheError::QueueClosed)?
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting jobs, let queued jobs finish, and wait for the
    /// workers to exit.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "generation worker failed during shutdown");
            }
        }
    }
}

async fn worker_loop(id: usize, rx: Arc<Mutex<mpsc::Receiver<Job>>>, context: Arc<WorkerContext>) {
    debug!(worker = id, "generation worker started");
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };
        run_job(id, &context, job).await;
    }
    debug!(worker = id, "generation worker stopped");
}

/// Generate, persist, and reply for one job.
///
/// The worker stays on the job until the generator returns, even after the
/// caller has been told it timed out, so no second generation starts on the
/// same slot and a late image still reaches the store.
async fn run_job(id: usize, context: &Arc<WorkerContext>, job: Job) {
    let Job { key, reply } = job;
    let mut reply = Some(reply);
    let started = Instant::now();

    // Spawned so a panicking generator takes down only its own task.
    let mut generation = {
        let context = Arc::clone(context);
        let key = key.clone();
        tokio::spawn(async move { context.generator.generate(key.as_str()).await })
    };

    let joined = match context.timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut generation).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    key = %key,
                    generator = context.generator.name(),
                    limit_secs = limit.as_secs(),
                    "generation timed out, waiting for it to finish"
                );
                if let Some(reply) = reply.take() {
                    let _ = reply.send(Err(PixcacheError::Generation(format!(
                        "timed out after {}s",
                        limit.as_secs()
                    ))));
                }
                generation.await
            }
        },
        None => generation.await,
    };

    let result = joined.unwrap_or_else(|e| {
        error!(worker = id, key = %key, error = %e, "generator panicked");
        Err(PixcacheError::Generation(format!("generator panicked: {e}")))
    });

    let elapsed = started.elapsed();
    metrics::histogram!(telemetry::GENERATION_DURATION_SECONDS).record(elapsed.as_secs_f64());
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(telemetry::GENERATIONS_TOTAL, "status" => status).increment(1);

    match &result {
        Ok(image) => {
            info!(
                key = %key,
                generator = context.generator.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "image generated"
            );
            persist(context.store.as_ref(), &key, image).await;
        }
        Err(e) => {
            warn!(
                key = %key,
                generator = context.generator.name(),
                error = %e,
                "generation failed"
            );
        }
    }

    match reply {
        Some(reply) => {
            if reply.send(result).is_err() {
                debug!(key = %key, "caller stopped waiting, result kept in store only");
            }
        }
        None => debug!(key = %key, "late generation finished after caller timed out"),
    }
}

/// Store the raw image under `key`. Never fails the job.
async fn persist(store: &dyn ImageStore, key: &CacheKey, image: &DynamicImage) {
    if !store.status().is_available() {
        return;
    }
    let bytes = match encode_png(image) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "could not encode generated image, not cached");
            return;
        }
    };
    match store.insert(key, bytes).await {
        Ok(InsertOutcome::Inserted) => debug!(key = %key, store = store.name(), "image cached"),
        Ok(InsertOutcome::AlreadyExists) | Err(PixcacheError::InsertConflict) => {
            debug!(key = %key, "another writer cached this key first");
        }
        // The store logs its own availability transitions.
        Err(PixcacheError::StoreUnavailable) => {
            debug!(key = %key, "store unavailable, image not cached");
        }
        Err(e) => warn!(key = %key, error = %e, "could not cache generated image"),
    }
}
