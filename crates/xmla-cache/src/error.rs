//! Error types for cache store operations.

use crate::key::SessionId;

/// Error type for cache store operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// `get`/`put` with a session id this store never issued.
    #[error("cache session '{0}' was never configured on this store")]
    Uninitialized(SessionId),

    /// Malformed key (empty request payload).
    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    /// A cache property has an unusable value.
    #[error("invalid value '{value}' for cache property '{key}'")]
    InvalidProperty { key: String, value: String },

    /// A cache property the store cannot work without is absent.
    #[error("missing cache property '{0}'")]
    MissingProperty(String),

    /// No store is registered under this name.
    #[error("unknown cache store '{0}'")]
    UnknownStore(String),

    /// Backing storage failed.
    #[error("cache storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl CacheError {
    /// Check if this error means the session was never configured.
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, CacheError::Uninitialized(_))
    }
}

/// Result type for cache store operations.
pub type Result<T> = std::result::Result<T, CacheError>;
