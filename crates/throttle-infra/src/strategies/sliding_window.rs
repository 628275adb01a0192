//! Sliding window log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use throttle_core::domain::{AttemptResult, SlidingWindowState};
use throttle_core::ports::{Cache, CacheError, Clock, RateLimitStrategy};

use super::{ceil_secs, duration_ms};

/// Keeps one timestamp per admitted attempt and counts those younger than
/// the decay window. Stored state is bounded by `max_attempts` entries.
pub struct SlidingWindowStrategy {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowStrategy {
    pub fn new(cache: Arc<dyn Cache>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    /// Load the log with aged-out timestamps already dropped.
    async fn load(&self, key: &str, now_ms: u64, window_ms: u64) -> Result<SlidingWindowState, CacheError> {
        let mut state = match self.cache.get(key).await? {
            Some(raw) => SlidingWindowState::decode(key, &raw)?,
            None => SlidingWindowState::default(),
        };
        state.prune(now_ms, window_ms);
        Ok(state)
    }

    fn retry_after_ms(state: &SlidingWindowState, now_ms: u64, window_ms: u64) -> u64 {
        state
            .oldest()
            .map(|oldest| oldest.saturating_add(window_ms).saturating_sub(now_ms))
            .unwrap_or(0)
    }
}

#[async_trait]
impl RateLimitStrategy for SlidingWindowStrategy {
    fn name(&self) -> &str {
        "sliding_window"
    }

    async fn attempt(
        &self,
        key: &str,
        max_attempts: u32,
        decay: Duration,
    ) -> Result<AttemptResult, CacheError> {
        let now = self.clock.now_millis();
        let window_ms = duration_ms(decay);
        let mut state = self.load(key, now, window_ms).await?;
        let count = state.timestamps.len() as u32;

        if count >= max_attempts {
            let retry_after = ceil_secs(Self::retry_after_ms(&state, now, window_ms)).max(1);
            return Ok(AttemptResult::rejected(count, max_attempts, retry_after));
        }

        state.timestamps.push(now);
        self.cache.set(key, &state.encode()?, Some(decay)).await?;

        Ok(AttemptResult::admitted(count + 1, max_attempts))
    }

    async fn attempts(&self, key: &str, _max_attempts: u32, decay: Duration) -> Result<u32, CacheError> {
        let now = self.clock.now_millis();
        let state = self.load(key, now, duration_ms(decay)).await?;
        Ok(state.timestamps.len() as u32)
    }

    async fn retry_after(&self, key: &str, max_attempts: u32, decay: Duration) -> Result<u64, CacheError> {
        let now = self.clock.now_millis();
        let window_ms = duration_ms(decay);
        let state = self.load(key, now, window_ms).await?;

        if (state.timestamps.len() as u32) < max_attempts {
            return Ok(0);
        }
        Ok(ceil_secs(Self::retry_after_ms(&state, now, window_ms)).max(1))
    }

    async fn reset(&self, key: &str) -> Result<(), CacheError> {
        self.cache.delete(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use throttle_core::ports::ManualClock;

    fn strategy() -> (SlidingWindowStrategy, ManualClock) {
        let clock = ManualClock::default();
        let cache = Arc::new(InMemoryCache::with_clock(Arc::new(clock.clone())));
        (
            SlidingWindowStrategy::new(cache, Arc::new(clock.clone())),
            clock,
        )
    }

    #[tokio::test]
    async fn test_fresh_key_has_full_quota() {
        let (strategy, _) = strategy();
        let window = Duration::from_secs(1);
        assert_eq!(strategy.remaining("k", 5, window).await.unwrap(), 5);
        assert_eq!(strategy.retry_after("k", 5, window).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_old_attempts_roll_off() {
        let (strategy, clock) = strategy();
        let window = Duration::from_secs(1);

        for _ in 0..5 {
            assert!(strategy.attempt("k", 5, window).await.unwrap().allowed);
        }
        assert!(!strategy.attempt("k", 5, window).await.unwrap().allowed);

        clock.advance(Duration::from_millis(1100));
        let result = strategy.attempt("k", 5, window).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, 4);
    }

    #[tokio::test]
    async fn test_no_edge_burst() {
        let (strategy, clock) = strategy();
        let window = Duration::from_secs(10);

        strategy.attempt("k", 2, window).await.unwrap();
        clock.advance(Duration::from_secs(9));
        strategy.attempt("k", 2, window).await.unwrap();

        // One attempt has rolled off, the other is still inside the window.
        clock.advance(Duration::from_secs(2));
        assert!(strategy.attempt("k", 2, window).await.unwrap().allowed);
        assert!(!strategy.attempt("k", 2, window).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_retry_after_tracks_oldest_attempt() {
        let (strategy, clock) = strategy();
        let window = Duration::from_secs(60);

        strategy.attempt("k", 2, window).await.unwrap();
        clock.advance(Duration::from_secs(15));
        strategy.attempt("k", 2, window).await.unwrap();
        clock.advance(Duration::from_millis(500));

        let rejected = strategy.attempt("k", 2, window).await.unwrap();
        assert!(!rejected.allowed);
        // Oldest attempt leaves the window 44.5s from now.
        assert_eq!(rejected.retry_after_secs, 45);
        assert_eq!(strategy.retry_after("k", 2, window).await.unwrap(), 45);
    }

    #[tokio::test]
    async fn test_retry_after_is_at_least_one_second() {
        let (strategy, clock) = strategy();
        let window = Duration::from_secs(1);

        strategy.attempt("k", 1, window).await.unwrap();
        clock.advance(Duration::from_millis(999));
        let rejected = strategy.attempt("k", 1, window).await.unwrap();
        assert_eq!(rejected.retry_after_secs, 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let (strategy, _) = strategy();
        let window = Duration::from_secs(60);
        strategy.attempt("k", 1, window).await.unwrap();

        strategy.reset("k").await.unwrap();
        assert!(strategy.check("k", 1, window).await.unwrap());
        assert_eq!(strategy.remaining("k", 1, window).await.unwrap(), 1);
    }
}
