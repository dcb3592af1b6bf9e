//! Generation queue: serialized access, timeouts, and worker isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};

use pixcache::generator::{GenerationQueue, QueueConfig};
use pixcache::store::{ImageStore, MemoryStore, UnavailableStore};
use pixcache::{BlockingGenerator, ImageGenerator, PixcacheError, Result, normalize};

/// Async generator that records how many calls overlap.
struct TrackingGenerator {
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl TrackingGenerator {
    fn new(delay: Duration) -> Self {
        Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        }
    }
}

#[async_trait]
impl ImageGenerator for TrackingGenerator {
    fn name(&self) -> &str {
        "tracking"
    }

    async fn generate(&self, _prompt: &str) -> Result<DynamicImage> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(DynamicImage::ImageRgb8(RgbImage::new(8, 8)))
    }
}

/// Panics on the prompt "boom", succeeds otherwise.
struct PanickyGenerator;

#[async_trait]
impl ImageGenerator for PanickyGenerator {
    fn name(&self) -> &str {
        "panicky"
    }

    async fn generate(&self, prompt: &str) -> Result<DynamicImage> {
        if prompt == "boom" {
            panic!("generator crashed");
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_serializes_generations() {
    let generator = Arc::new(TrackingGenerator::new(Duration::from_millis(25)));
    let queue = GenerationQueue::new(
        generator.clone(),
        Arc::new(UnavailableStore::new()),
        &QueueConfig::new().workers(1),
    );
    assert_eq!(queue.worker_count(), 1);

    let jobs = (0..5).map(|i| queue.submit(normalize(&format!("prompt {i}")).unwrap()));
    for result in futures_util::future::join_all(jobs).await {
        result.unwrap();
    }
    assert_eq!(generator.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn extra_workers_run_in_parallel() {
    let generator = Arc::new(TrackingGenerator::new(Duration::from_millis(100)));
    let queue = GenerationQueue::new(
        generator.clone(),
        Arc::new(UnavailableStore::new()),
        &QueueConfig::new().workers(2),
    );

    let jobs = (0..4).map(|i| queue.submit(normalize(&format!("prompt {i}")).unwrap()));
    futures_util::future::join_all(jobs).await;
    assert_eq!(generator.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_generation_times_out() {
    let generator = Arc::new(TrackingGenerator::new(Duration::from_secs(3600)));
    let queue = GenerationQueue::new(
        generator,
        Arc::new(UnavailableStore::new()),
        &QueueConfig::new().timeout(Duration::from_secs(60)),
    );

    let result = queue.submit(normalize("forever").unwrap()).await;
    assert!(matches!(result, Err(PixcacheError::Generation(msg)) if msg.contains("timed out")));
}

#[tokio::test(start_paused = true)]
async fn timed_out_generation_is_still_cached() {
    let store: Arc<dyn ImageStore> = Arc::new(MemoryStore::new());
    let queue = GenerationQueue::new(
        Arc::new(TrackingGenerator::new(Duration::from_secs(120))),
        Arc::clone(&store),
        &QueueConfig::new().timeout(Duration::from_secs(60)),
    );

    let key = normalize("slow but worth it").unwrap();
    let result = queue.submit(key.clone()).await;
    assert!(matches!(result, Err(PixcacheError::Generation(msg)) if msg.contains("timed out")));

    queue.shutdown().await;
    assert!(store.lookup(&key).await.is_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timed_out_blocking_generation_keeps_worker_busy() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let generator = {
        let (active, peak) = (Arc::clone(&active), Arc::clone(&peak));
        BlockingGenerator::new("sleepy", move |_: &str| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1500));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(DynamicImage::ImageRgb8(RgbImage::new(8, 8)))
        })
    };
    let store: Arc<dyn ImageStore> = Arc::new(MemoryStore::new());
    let queue = GenerationQueue::new(
        Arc::new(generator),
        Arc::clone(&store),
        &QueueConfig::new().workers(1).timeout(Duration::from_secs(1)),
    );

    let first = normalize("first").unwrap();
    let second = normalize("second").unwrap();
    let results =
        futures_util::future::join_all([queue.submit(first.clone()), queue.submit(second.clone())])
            .await;
    for result in results {
        assert!(matches!(result, Err(PixcacheError::Generation(msg)) if msg.contains("timed out")));
    }
    // The first generation finished before the second one started.
    assert!(store.lookup(&first).await.is_found());

    queue.shutdown().await;
    assert!(store.lookup(&second).await.is_found());
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_generator_does_not_kill_worker() {
    let store: Arc<dyn ImageStore> = Arc::new(MemoryStore::new());
    let queue = GenerationQueue::new(
        Arc::new(PanickyGenerator),
        Arc::clone(&store),
        &QueueConfig::default(),
    );

    let crashed = queue.submit(normalize("boom").unwrap()).await;
    assert!(matches!(crashed, Err(PixcacheError::Generation(msg)) if msg.contains("panicked")));

    let key = normalize("fine").unwrap();
    queue.submit(key.clone()).await.unwrap();
    assert!(store.lookup(&key).await.is_found());
}

#[tokio::test]
async fn generated_images_are_persisted_before_reply() {
    let store: Arc<dyn ImageStore> = Arc::new(MemoryStore::new());
    let queue = GenerationQueue::new(
        Arc::new(TrackingGenerator::new(Duration::ZERO)),
        Arc::clone(&store),
        &QueueConfig::default(),
    );

    let key = normalize("persist me").unwrap();
    queue.submit(key.clone()).await.unwrap();
    assert!(store.lookup(&key).await.is_found());
    queue.shutdown().await;
}

#[tokio::test]
async fn zero_sizes_are_raised_to_one() {
    let queue = GenerationQueue::new(
        Arc::new(TrackingGenerator::new(Duration::ZERO)),
        Arc::new(UnavailableStore::new()),
        &QueueConfig::new().workers(0).capacity(0),
    );
    assert_eq!(queue.worker_count(), 1);
    queue.submit(normalize("still works").unwrap()).await.unwrap();
    assert_eq!(queue.queued(), 0);
}
