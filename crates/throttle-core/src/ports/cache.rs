use async_trait::async_trait;
use std::time::Duration;

/// Cache trait - abstraction over the shared key-value store holding counter state.
///
/// Implementations must honour per-key TTLs. Failures are reported, never
/// swallowed: a rate limiter that cannot read its counters must not guess.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value from the cache. Expired keys read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a value in the cache with optional TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete a key from the cache. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    ///
    /// Bulk deletion is optional; stores without a key scan keep the default.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let _ = prefix;
        Err(CacheError::Unsupported("delete_prefix"))
    }
}

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),
}
