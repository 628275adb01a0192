use async_trait::async_trait;
use std::time::Duration;

use crate::domain::AttemptResult;
use crate::ports::CacheError;

/// One counting algorithm, evaluated against a fully-qualified cache key.
///
/// Only [`attempt`](RateLimitStrategy::attempt) consumes quota; every other
/// operation observes state without changing it (apart from `reset`).
///
/// Implementations read, compute, then write. That sequence is not atomic:
/// two callers racing on the same key can both observe the pre-update state
/// and both be admitted. Stores with native atomic primitives can close the
/// gap in a dedicated strategy.
#[async_trait]
pub trait RateLimitStrategy: Send + Sync {
    /// Strategy name, used in logs.
    fn name(&self) -> &str;

    /// Consume one attempt if quota allows.
    async fn attempt(
        &self,
        key: &str,
        max_attempts: u32,
        decay: Duration,
    ) -> Result<AttemptResult, CacheError>;

    /// Whether an attempt made now would be admitted.
    async fn check(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<bool, CacheError> {
        Ok(self.remaining(key, max_attempts, decay).await? > 0)
    }

    /// Attempts consumed in the current window.
    async fn attempts(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<u32, CacheError>;

    /// Attempts still available.
    async fn remaining(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<u32, CacheError> {
        Ok(max_attempts.saturating_sub(self.attempts(key, max_attempts, decay).await?))
    }

    /// Seconds until the next attempt may be admitted; zero when not limited.
    async fn retry_after(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<u64, CacheError>;

    /// Forget all state for the key.
    async fn reset(&self, key: &str) -> Result<(), CacheError>;
}
