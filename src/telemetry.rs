//! Telemetry metric name constants.
//!
//! Centralised metric names for pixcache operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `pixcache_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `status`: "ok" or "error" (votes also "not_found", "unavailable")
//! - `operation`: "lookup", "insert", "update_rating", or "decode" for
//!   stored images that no longer decode

/// Total requests served from the store.
pub const CACHE_HITS_TOTAL: &str = "pixcache_cache_hits_total";

/// Total requests that had to generate (includes no-store mode).
pub const CACHE_MISSES_TOTAL: &str = "pixcache_cache_misses_total";

/// Total generator invocations.
///
/// Labels: `status` ("ok" | "error").
pub const GENERATIONS_TOTAL: &str = "pixcache_generations_total";

/// Generator wall-clock duration in seconds, measured inside the worker.
pub const GENERATION_DURATION_SECONDS: &str = "pixcache_generation_duration_seconds";

/// Total votes recorded.
///
/// Labels: `status` ("ok" | "not_found" | "unavailable" | "error").
pub const VOTES_TOTAL: &str = "pixcache_votes_total";

/// Total store faults degraded to a miss or a no-op.
///
/// Labels: `operation`.
pub const STORE_ERRORS_TOTAL: &str = "pixcache_store_errors_total";
