//! Fixed window counter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use throttle_core::domain::{AttemptResult, FixedWindowState};
use throttle_core::ports::{Cache, CacheError, Clock, RateLimitStrategy};

use super::{ceil_secs, duration_ms};

/// Suffix of the entry that anchors retry-after once a key has been rejected.
const TIMER_SUFFIX: &str = ":timer";

/// Counts attempts in a window that opens on the first admitted attempt and
/// closes `decay` later. Quota resets abruptly at the boundary.
///
/// The window end is fixed when the window opens. Later admitted attempts
/// rewrite the count with the TTL left until that end, and the retry timer
/// created on the first rejection points at the same instant, so neither
/// further hits nor further rejections extend the window.
pub struct FixedWindowStrategy {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowStrategy {
    pub fn new(cache: Arc<dyn Cache>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    fn timer_key(key: &str) -> String {
        format!("{key}{TIMER_SUFFIX}")
    }

    async fn load(&self, key: &str, now_ms: u64) -> Result<Option<FixedWindowState>, CacheError> {
        let Some(raw) = self.cache.get(key).await? else {
            return Ok(None);
        };
        let state = FixedWindowState::decode(key, &raw)?;
        Ok(state.is_live(now_ms).then_some(state))
    }

    async fn load_timer(&self, key: &str, now_ms: u64) -> Result<Option<u64>, CacheError> {
        let timer_key = Self::timer_key(key);
        let Some(raw) = self.cache.get(&timer_key).await? else {
            return Ok(None);
        };
        let expires_at: u64 = raw.trim().parse().map_err(|_| {
            CacheError::Serialization(format!("corrupt window timer at {timer_key}: {raw}"))
        })?;
        Ok((expires_at > now_ms).then_some(expires_at))
    }

    /// Read the retry anchor, creating it from the live window if this is the
    /// first rejection.
    async fn ensure_timer(&self, key: &str, state: &FixedWindowState, now_ms: u64) -> Result<u64, CacheError> {
        if let Some(expires_at) = self.load_timer(key, now_ms).await? {
            return Ok(expires_at);
        }

        let expires_at = state.window_expires_at;
        let ttl = Duration::from_millis(expires_at.saturating_sub(now_ms));
        self.cache
            .set(&Self::timer_key(key), &expires_at.to_string(), Some(ttl))
            .await?;
        Ok(expires_at)
    }
}

#[async_trait]
impl RateLimitStrategy for FixedWindowStrategy {
    fn name(&self) -> &str {
        "fixed_window"
    }

    async fn attempt(
        &self,
        key: &str,
        max_attempts: u32,
        decay: Duration,
    ) -> Result<AttemptResult, CacheError> {
        let now = self.clock.now_millis();
        let current = self.load(key, now).await?;

        let next = match current {
            Some(state) if state.count >= max_attempts => {
                let expires_at = self.ensure_timer(key, &state, now).await?;
                let retry_after = ceil_secs(expires_at.saturating_sub(now)).max(1);
                return Ok(AttemptResult::rejected(state.count, max_attempts, retry_after));
            }
            Some(state) => FixedWindowState {
                count: state.count + 1,
                ..state
            },
            None => FixedWindowState {
                count: 1,
                window_expires_at: now.saturating_add(duration_ms(decay)),
            },
        };

        let ttl = Duration::from_millis(next.window_expires_at.saturating_sub(now));
        self.cache.set(key, &next.encode()?, Some(ttl)).await?;

        Ok(AttemptResult::admitted(next.count, max_attempts))
    }

    async fn attempts(&self, key: &str, _max_attempts: u32, _decay: Duration) -> Result<u32, CacheError> {
        let now = self.clock.now_millis();
        Ok(self.load(key, now).await?.map(|s| s.count).unwrap_or(0))
    }

    async fn retry_after(&self, key: &str, _max_attempts: u32, _decay: Duration) -> Result<u64, CacheError> {
        let now = self.clock.now_millis();
        Ok(self
            .load_timer(key, now)
            .await?
            .map(|expires_at| ceil_secs(expires_at - now))
            .unwrap_or(0))
    }

    async fn reset(&self, key: &str) -> Result<(), CacheError> {
        self.cache.delete(key).await?;
        self.cache.delete(&Self::timer_key(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use throttle_core::ports::ManualClock;

    const WINDOW: Duration = Duration::from_secs(60);

    fn strategy() -> (FixedWindowStrategy, Arc<InMemoryCache>, ManualClock) {
        let clock = ManualClock::default();
        let cache = Arc::new(InMemoryCache::with_clock(Arc::new(clock.clone())));
        let strategy = FixedWindowStrategy::new(cache.clone(), Arc::new(clock.clone()));
        (strategy, cache, clock)
    }

    #[tokio::test]
    async fn test_fresh_key_has_full_quota() {
        let (strategy, _, _) = strategy();
        assert_eq!(strategy.remaining("k", 5, WINDOW).await.unwrap(), 5);
        assert!(strategy.check("k", 5, WINDOW).await.unwrap());
        assert_eq!(strategy.retry_after("k", 5, WINDOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_after_max_attempts() {
        let (strategy, _, _) = strategy();

        for expected_remaining in [2, 1, 0] {
            let result = strategy.attempt("k", 3, WINDOW).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.remaining, expected_remaining);
            assert_eq!(result.retry_after_secs, 0);
        }

        let result = strategy.attempt("k", 3, WINDOW).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.attempts_consumed, 3);
        assert!(result.retry_after_secs > 0 && result.retry_after_secs <= 60);
    }

    #[tokio::test]
    async fn test_rejected_attempts_are_not_recorded() {
        let (strategy, _, _) = strategy();
        for _ in 0..10 {
            strategy.attempt("k", 2, WINDOW).await.unwrap();
        }
        assert_eq!(strategy.attempts("k", 2, WINDOW).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retry_after_zero_until_first_rejection() {
        let (strategy, _, clock) = strategy();
        strategy.attempt("k", 1, WINDOW).await.unwrap();
        assert_eq!(strategy.retry_after("k", 1, WINDOW).await.unwrap(), 0);

        clock.advance(Duration::from_secs(20));
        let rejected = strategy.attempt("k", 1, WINDOW).await.unwrap();
        assert_eq!(rejected.retry_after_secs, 40);
        assert_eq!(strategy.retry_after("k", 1, WINDOW).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_window_does_not_extend_on_hits() {
        let (strategy, _, clock) = strategy();
        strategy.attempt("k", 3, WINDOW).await.unwrap();
        clock.advance(Duration::from_secs(50));
        strategy.attempt("k", 3, WINDOW).await.unwrap();

        clock.advance(Duration::from_secs(10));
        let result = strategy.attempt("k", 3, WINDOW).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.attempts_consumed, 1, "a new window opened at 60s");
    }

    #[tokio::test]
    async fn test_quota_returns_after_window() {
        let (strategy, _, clock) = strategy();
        strategy.attempt("k", 1, WINDOW).await.unwrap();
        assert!(!strategy.attempt("k", 1, WINDOW).await.unwrap().allowed);

        clock.advance(WINDOW);
        assert!(strategy.attempt("k", 1, WINDOW).await.unwrap().allowed);
        assert_eq!(strategy.retry_after("k", 1, WINDOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_count_and_timer() {
        let (strategy, cache, _) = strategy();
        strategy.attempt("k", 1, WINDOW).await.unwrap();
        strategy.attempt("k", 1, WINDOW).await.unwrap();
        assert_eq!(cache.len().await, 2);

        strategy.reset("k").await.unwrap();
        assert!(cache.is_empty().await);
        assert!(strategy.check("k", 1, WINDOW).await.unwrap());
        assert_eq!(strategy.remaining("k", 1, WINDOW).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_check_does_not_consume() {
        let (strategy, _, _) = strategy();
        strategy.attempt("k", 5, WINDOW).await.unwrap();
        for _ in 0..10 {
            assert!(strategy.check("k", 5, WINDOW).await.unwrap());
        }
        assert_eq!(strategy.remaining("k", 5, WINDOW).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_corrupt_state_propagates() {
        let (strategy, cache, _) = strategy();
        cache.set("k", "{oops", None).await.unwrap();
        let err = strategy.attempt("k", 5, WINDOW).await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
