//! Public types for the Pixcache API.

mod entry;
mod key;
mod vote;

pub use entry::{CacheEntry, InsertOutcome, Lookup, Rating};
pub use key::{CacheKey, MAX_KEY_CHARS, normalize};
pub use vote::Vote;
