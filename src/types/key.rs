//! Prompt normalization and the cache key type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PixcacheError, Result};

/// Maximum key length, in Unicode scalar values.
///
/// Matches the width of the store's primary-key column.
pub const MAX_KEY_CHARS: usize = 500;

/// Normalized prompt text identifying a cache entry.
///
/// Only constructible through [`normalize`] (directly, or through
/// deserialization, which re-normalizes), so every key held by the
/// crate is canonical: trimmed, lower-cased, non-empty, and at most
/// [`MAX_KEY_CHARS`] long.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the key.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

/// Canonicalize raw input text into a [`CacheKey`].
///
/// Trims surrounding whitespace and lower-cases. Inputs that differ only in
/// case or surrounding whitespace map to the same key, and normalizing a
/// key's text again yields the same key.
///
/// # Errors
///
/// [`PixcacheError::InvalidInput`] if the trimmed text is empty or longer
/// than [`MAX_KEY_CHARS`]. Oversized input is rejected, never truncated.
pub fn normalize(raw: &str) -> Result<CacheKey> {
    let folded = raw.trim().to_lowercase();
    if folded.is_empty() {
        return Err(PixcacheError::InvalidInput("prompt is empty".to_string()));
    }
    let len = folded.chars().count();
    if len > MAX_KEY_CHARS {
        return Err(PixcacheError::InvalidInput(format!(
            "prompt is {len} characters, maximum is {MAX_KEY_CHARS}"
        )));
    }
    Ok(CacheKey(folded))
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

impl TryFrom<String> for CacheKey {
    type Error = PixcacheError;

    fn try_from(value: String) -> Result<Self> {
        normalize(&value)
    }
}
