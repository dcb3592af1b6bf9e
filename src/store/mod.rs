//! Persistent key → image store.
//!
//! Three implementations of [`ImageStore`]:
//!
//! - [`SqliteStore`]: durable store on SQLite via sqlx (feature `sqlite`).
//!   Uniqueness is enforced by the primary key; rating updates are a single
//!   atomic `UPDATE … RETURNING`.
//!
//! - [`MemoryStore`]: process-local store on an unbounded moka cache. Same
//!   write-once and atomic-rating semantics, lost on restart.
//!
//! - [`UnavailableStore`]: no-store mode. Every lookup reports
//!   [`Lookup::Unavailable`], every write fails with
//!   [`PixcacheError::StoreUnavailable`](crate::PixcacheError::StoreUnavailable).
//!
//! [`connect()`] picks one from a [`StoreConfig`] and never fails: a missing
//! or unreachable store is logged once and replaced by [`UnavailableStore`].

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod unavailable;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use unavailable::UnavailableStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::types::{CacheKey, InsertOutcome, Lookup, Rating, Vote};
use crate::{PixcacheError, Result};

/// Largest image blob accepted by a store (one byte under 16 MiB).
pub const MAX_IMAGE_BYTES: usize = (1 << 24) - 1;

/// Environment variable that overrides [`StoreConfig::url`].
pub const DATABASE_URL_ENV: &str = "PIXCACHE_DATABASE_URL";

/// Store availability, decided once when the store is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Available,
    Unavailable,
}

impl StoreStatus {
    pub fn is_available(self) -> bool {
        self == StoreStatus::Available
    }
}

/// Durable key → (image, rating) mapping.
///
/// All methods are safe to call when the backing store is down: lookups
/// report [`Lookup::Unavailable`] and writes return
/// [`PixcacheError::StoreUnavailable`] instead of panicking.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store name for logging/debugging.
    fn name(&self) -> &str;

    fn status(&self) -> StoreStatus;

    /// Fetch the entry for `key`. Never returns an error; transport or
    /// decoding faults map to [`Lookup::Unavailable`].
    async fn lookup(&self, key: &CacheKey) -> Lookup;

    /// Create the entry for `key` unless one exists.
    ///
    /// First writer wins: an existing image is never overwritten, and the
    /// call reports [`InsertOutcome::AlreadyExists`].
    async fn insert(&self, key: &CacheKey, image: Vec<u8>) -> Result<InsertOutcome>;

    /// Atomically apply `vote` to the entry's rating.
    ///
    /// # Errors
    ///
    /// [`PixcacheError::NotFound`] if `key` has no entry,
    /// [`PixcacheError::StoreUnavailable`] if the store is down or the
    /// write fails for any other reason.
    async fn update_rating(&self, key: &CacheKey, vote: Vote) -> Result<Rating>;

    /// Number of persisted entries.
    async fn entry_count(&self) -> Result<u64>;
}

/// Configuration for the persistent store.
///
/// ```rust
/// # use pixcache::store::StoreConfig;
/// let config = StoreConfig::new()
///     .url("sqlite://pixcache.db")
///     .max_connections(4);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Connection URL. `sqlite:…` for SQLite, `memory:` for the in-process
    /// store. `None` runs in no-store mode.
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum pooled connections (default: 5). In-memory SQLite always
    /// uses a single connection.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a connection before treating the store as down
    /// (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    5
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Replace the URL with `PIXCACHE_DATABASE_URL` when it is set.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV)
            && !url.trim().is_empty()
        {
            self.url = Some(url);
        }
        self
    }
}

/// Open the store described by `config`.
///
/// Never fails. Without a URL, with an unsupported scheme, or when the
/// store cannot be reached or its schema is wrong, a single warning is
/// logged and the returned store runs in no-store mode.
pub async fn connect(config: &StoreConfig) -> Arc<dyn ImageStore> {
    let Some(url) = config.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
        warn!(
            env = DATABASE_URL_ENV,
            "no store URL configured, running without a store"
        );
        return Arc::new(UnavailableStore::new());
    };

    if url.starts_with("memory:") {
        info!(store = "memory", "using in-process store");
        return Arc::new(MemoryStore::new());
    }

    if url.starts_with("sqlite:") {
        return connect_sqlite(url, config).await;
    }

    warn!(
        url = redact(url),
        "unsupported store URL scheme, running without a store"
    );
    Arc::new(UnavailableStore::new())
}

#[cfg(feature = "sqlite")]
async fn connect_sqlite(url: &str, config: &StoreConfig) -> Arc<dyn ImageStore> {
    match SqliteStore::connect(url, config).await {
        Ok(store) => {
            info!(store = "sqlite", url = redact(url), "store connected");
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                url = redact(url),
                error = %e,
                "store unreachable or misconfigured, running without a store"
            );
            Arc::new(UnavailableStore::new())
        }
    }
}

#[cfg(not(feature = "sqlite"))]
async fn connect_sqlite(url: &str, _config: &StoreConfig) -> Arc<dyn ImageStore> {
    warn!(
        url = redact(url),
        "built without the `sqlite` feature, running without a store"
    );
    Arc::new(UnavailableStore::new())
}

/// Reject blobs the persisted record layout cannot hold.
pub(crate) fn check_image_size(image: &[u8]) -> Result<()> {
    if image.len() > MAX_IMAGE_BYTES {
        return Err(PixcacheError::InvalidInput(format!(
            "image is {} bytes, maximum is {MAX_IMAGE_BYTES}",
            image.len()
        )));
    }
    Ok(())
}

/// Strip credentials from a URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
