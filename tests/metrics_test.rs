//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use pixcache::store::MemoryStore;
use pixcache::telemetry;
use pixcache::{ImageGenerator, Pipeline, PixcacheError, Result, Vote};

// ============================================================================
// Mock generators
// ============================================================================

struct SolidGenerator;

#[async_trait]
impl ImageGenerator for SolidGenerator {
    fn name(&self) -> &str {
        "solid"
    }

    async fn generate(&self, _prompt: &str) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::new(16, 16)))
    }
}

struct FailingGenerator;

#[async_trait]
impl ImageGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> Result<DynamicImage> {
        Err(PixcacheError::Generation("model offline".to_string()))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` carrying the label `label=value`.
fn labelled_total(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Run `make()` on a current-thread runtime with a local recorder.
///
/// The queue workers are spawned tasks, so everything has to stay on the
/// thread that owns the recorder.
fn record<F, Fut>(make: F) -> SnapshotVec
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(make());
    });

    snapshotter.snapshot().into_vec()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn miss_then_hit_records_cache_and_generation_metrics() {
    let snapshot = record(|| async {
        let pipeline = Pipeline::builder()
            .store(Arc::new(MemoryStore::new()))
            .generator(Arc::new(SolidGenerator))
            .build()
            .unwrap();
        pipeline.get_or_create("a cat").await.unwrap();
        pipeline.get_or_create("a cat").await.unwrap();
        pipeline.shutdown().await;
    });

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(
        labelled_total(&snapshot, telemetry::GENERATIONS_TOTAL, "status", "ok"),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::GENERATION_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
}

#[test]
fn failed_generation_records_error_status() {
    let snapshot = record(|| async {
        let pipeline = Pipeline::builder()
            .store(Arc::new(MemoryStore::new()))
            .generator(Arc::new(FailingGenerator))
            .build()
            .unwrap();
        assert!(pipeline.get_or_create("a cat").await.is_err());
        pipeline.shutdown().await;
    });

    assert_eq!(
        labelled_total(&snapshot, telemetry::GENERATIONS_TOTAL, "status", "error"),
        1
    );
    assert_eq!(
        labelled_total(&snapshot, telemetry::GENERATIONS_TOTAL, "status", "ok"),
        0
    );
}

#[test]
fn votes_are_counted_by_outcome() {
    let snapshot = record(|| async {
        let pipeline = Pipeline::builder()
            .store(Arc::new(MemoryStore::new()))
            .generator(Arc::new(SolidGenerator))
            .build()
            .unwrap();
        pipeline.get_or_create("a cat").await.unwrap();
        pipeline.vote("a cat", Vote::Up).await.unwrap();
        pipeline.vote("a dog", Vote::Up).await.unwrap_err();
        pipeline.shutdown().await;
    });

    assert_eq!(
        labelled_total(&snapshot, telemetry::VOTES_TOTAL, "status", "ok"),
        1
    );
    assert_eq!(
        labelled_total(&snapshot, telemetry::VOTES_TOTAL, "status", "not_found"),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let pipeline = Pipeline::builder()
        .generator(Arc::new(SolidGenerator))
        .build()
        .unwrap();
    pipeline.get_or_create("hello").await.unwrap();
}
