//! Token bucket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use throttle_core::domain::{AttemptResult, TokenBucketState};
use throttle_core::ports::{Cache, CacheError, Clock, RateLimitStrategy};

/// Longest expiry written for a bucket record.
const MAX_STATE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Bucket of `max_attempts` tokens refilled continuously at `refill_rate`
/// tokens per second. Each admitted attempt spends one token.
///
/// Without an explicit rate the bucket refills its full capacity over one
/// decay window.
pub struct TokenBucketStrategy {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    refill_rate: Option<f64>,
}

impl TokenBucketStrategy {
    pub fn new(cache: Arc<dyn Cache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            refill_rate: None,
        }
    }

    /// Fix the refill rate in tokens per second. Non-positive rates are ignored.
    pub fn with_refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = (rate.is_finite() && rate > 0.0).then_some(rate);
        self
    }

    fn rate(&self, capacity: u32, decay: Duration) -> f64 {
        self.refill_rate
            .unwrap_or_else(|| capacity as f64 / decay.as_secs_f64().max(0.001))
    }

    /// Load the bucket and apply the refill accrued up to `now_ms`.
    async fn load(&self, key: &str, capacity: u32, now_ms: u64, rate: f64) -> Result<TokenBucketState, CacheError> {
        let mut bucket = match self.cache.get(key).await? {
            Some(raw) => TokenBucketState::decode(key, &raw)?,
            None => TokenBucketState::full(capacity, now_ms),
        };

        if bucket.capacity != capacity {
            bucket.capacity = capacity;
        }
        bucket.refill(now_ms, rate);
        Ok(bucket)
    }

    fn retry_after_secs(tokens: f64, rate: f64) -> u64 {
        ((1.0 - tokens) / rate).ceil().max(1.0) as u64
    }

    /// Time for an empty bucket to fill completely; the state is worthless after that.
    ///
    /// Buckets that take longer than [`MAX_STATE_TTL`] to fill are stored without expiry.
    fn state_ttl(capacity: u32, rate: f64) -> Option<Duration> {
        let secs = (capacity as f64 / rate).ceil().max(1.0);
        Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|ttl| *ttl <= MAX_STATE_TTL)
    }
}

#[async_trait]
impl RateLimitStrategy for TokenBucketStrategy {
    fn name(&self) -> &str {
        "token_bucket"
    }

    async fn attempt(
        &self,
        key: &str,
        max_attempts: u32,
        decay: Duration,
    ) -> Result<AttemptResult, CacheError> {
        let now = self.clock.now_millis();
        let rate = self.rate(max_attempts, decay);
        let mut bucket = self.load(key, max_attempts, now, rate).await?;

        if bucket.tokens < 1.0 {
            let consumed = max_attempts.saturating_sub(bucket.whole_tokens());
            return Ok(AttemptResult::rejected(
                consumed,
                max_attempts,
                Self::retry_after_secs(bucket.tokens, rate),
            ));
        }

        bucket.tokens -= 1.0;
        self.cache
            .set(key, &bucket.encode()?, Self::state_ttl(max_attempts, rate))
            .await?;

        let consumed = max_attempts.saturating_sub(bucket.whole_tokens());
        Ok(AttemptResult::admitted(consumed, max_attempts))
    }

    async fn check(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<bool, CacheError> {
        let now = self.clock.now_millis();
        let rate = self.rate(max_attempts, decay);
        Ok(self.load(key, max_attempts, now, rate).await?.tokens >= 1.0)
    }

    async fn attempts(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<u32, CacheError> {
        let now = self.clock.now_millis();
        let rate = self.rate(max_attempts, decay);
        let bucket = self.load(key, max_attempts, now, rate).await?;
        Ok(max_attempts.saturating_sub(bucket.whole_tokens()))
    }

    async fn retry_after(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<u64, CacheError> {
        let now = self.clock.now_millis();
        let rate = self.rate(max_attempts, decay);
        let bucket = self.load(key, max_attempts, now, rate).await?;

        if bucket.tokens >= 1.0 {
            return Ok(0);
        }
        Ok(Self::retry_after_secs(bucket.tokens, rate))
    }

    async fn reset(&self, key: &str) -> Result<(), CacheError> {
        self.cache.delete(key).await?;
        Ok(())
    }
}
