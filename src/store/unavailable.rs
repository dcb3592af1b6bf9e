//! No-store mode.

use async_trait::async_trait;

use super::{ImageStore, StoreStatus};
use crate::types::{CacheKey, InsertOutcome, Lookup, Rating, Vote};
use crate::{PixcacheError, Result};

/// Stand-in store used when no persistent store is configured or reachable.
///
/// Lookups always report [`Lookup::Unavailable`]; writes always fail with
/// [`PixcacheError::StoreUnavailable`]. Nothing is logged here; the
/// transition into no-store mode is logged once by [`super::connect()`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageStore for UnavailableStore {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn status(&self) -> StoreStatus {
        StoreStatus::Unavailable
    }

    async fn lookup(&self, _key: &CacheKey) -> Lookup {
        Lookup::Unavailable
    }

    async fn insert(&self, _key: &CacheKey, _image: Vec<u8>) -> Result<InsertOutcome> {
        Err(PixcacheError::StoreUnavailable)
    }

    async fn update_rating(&self, _key: &CacheKey, _vote: Vote) -> Result<Rating> {
        Err(PixcacheError::StoreUnavailable)
    }

    async fn entry_count(&self) -> Result<u64> {
        Err(PixcacheError::StoreUnavailable)
    }
}
