//! Stored entry types and store operation outcomes.

use serde::{Deserialize, Serialize};

use super::CacheKey;

/// A persisted cache entry.
///
/// `image` is the lossless (PNG) encoding of the raw generator output. It is
/// written once when the entry is created and never replaced; only the
/// rating fields change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub image: Vec<u8>,
    pub rating_sum: i64,
    /// Always >= 0.
    pub rating_count: i64,
}

impl CacheEntry {
    /// A freshly created entry with no votes.
    pub fn new(key: CacheKey, image: Vec<u8>) -> Self {
        Self {
            key,
            image,
            rating_sum: 0,
            rating_count: 0,
        }
    }

    pub fn rating(&self) -> Rating {
        Rating {
            sum: self.rating_sum,
            count: self.rating_count,
        }
    }
}

/// Outcome of a store lookup.
///
/// Keeps "no such entry" apart from "the store could not be asked".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(CacheEntry),
    NotFound,
    /// Store unconfigured, unreachable, or returned a fault.
    Unavailable,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Collapse to an `Option`, losing the not-found/unavailable distinction.
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Lookup::Found(entry) => Some(entry),
            Lookup::NotFound | Lookup::Unavailable => None,
        }
    }
}

/// Outcome of a successful insert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the entry.
    Inserted,
    /// An entry already existed; its image was left untouched.
    AlreadyExists,
}

/// Rating aggregate of an entry after a vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub sum: i64,
    pub count: i64,
}
