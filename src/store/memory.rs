//! In-process store on an unbounded moka cache.
//!
//! No capacity and no TTL: entries live as long as the process, matching the
//! never-evict contract of the persistent store. Write-once inserts use
//! moka's `entry().or_insert_with()`, rating updates use
//! `entry().and_compute_with()`, so both are atomic per key.

use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

use super::{ImageStore, StoreStatus, check_image_size};
use crate::types::{CacheEntry, CacheKey, InsertOutcome, Lookup, Rating, Vote};
use crate::{PixcacheError, Result};

/// Process-local [`ImageStore`].
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<CacheKey, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn status(&self) -> StoreStatus {
        StoreStatus::Available
    }

    async fn lookup(&self, key: &CacheKey) -> Lookup {
        match self.entries.get(key).await {
            Some(entry) => Lookup::Found(entry),
            None => Lookup::NotFound,
        }
    }

    async fn insert(&self, key: &CacheKey, image: Vec<u8>) -> Result<InsertOutcome> {
        check_image_size(&image)?;
        let owned = key.clone();
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(async move { CacheEntry::new(owned, image) })
            .await;
        if entry.is_fresh() {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    async fn update_rating(&self, key: &CacheKey, vote: Vote) -> Result<Rating> {
        let result = self
            .entries
            .entry(key.clone())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) => {
                        let mut entry = entry.into_value();
                        entry.rating_sum += vote.delta();
                        entry.rating_count += 1;
                        Op::Put(entry)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::ReplacedWith(entry) | CompResult::Inserted(entry) => {
                Ok(entry.value().rating())
            }
            CompResult::StillNone(_) => Err(PixcacheError::NotFound(key.to_string())),
            CompResult::Unchanged(_) | CompResult::Removed(_) => Err(PixcacheError::Store(
                "rating update left entry unchanged".to_string(),
            )),
        }
    }

    async fn entry_count(&self) -> Result<u64> {
        self.entries.run_pending_tasks().await;
        Ok(self.entries.entry_count())
    }
}
