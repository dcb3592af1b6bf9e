//! Pixcache error types

/// Pixcache error types
#[derive(Debug, thiserror::Error)]
pub enum PixcacheError {
    // Client errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no cached entry for '{0}'")]
    NotFound(String),

    // Store errors
    /// The persistent store is unreachable or was never configured.
    /// Callers fall back to uncached generation.
    #[error("no store available")]
    StoreUnavailable,

    /// A second writer raced the first for the same key. Never surfaced by
    /// the pipeline; stores report it as `InsertOutcome::AlreadyExists`.
    #[error("entry already exists")]
    InsertConflict,

    #[error("store error: {0}")]
    Store(String),

    // Generation errors
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("generation queue closed")]
    QueueClosed,

    // Data errors
    #[error("image error: {0}")]
    Image(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PixcacheError {
    /// Whether the error was caused by the caller's input rather than by the
    /// store or the generator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PixcacheError::InvalidInput(_) | PixcacheError::NotFound(_)
        )
    }
}

impl From<image::ImageError> for PixcacheError {
    fn from(err: image::ImageError) -> Self {
        PixcacheError::Image(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for PixcacheError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                PixcacheError::StoreUnavailable
            }
            other => PixcacheError::Store(other.to_string()),
        }
    }
}

/// Result type alias for Pixcache operations
pub type Result<T> = std::result::Result<T, PixcacheError>;
