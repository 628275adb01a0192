//! Sink that writes rejections to the log.

use async_trait::async_trait;

use throttle_core::domain::LimitExceeded;
use throttle_core::ports::{LimitExceededSink, SinkError};

/// Logs every rejection under the `throttle::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl LimitExceededSink for TracingSink {
    async fn on_limit_exceeded(&self, event: &LimitExceeded) -> Result<(), SinkError> {
        tracing::info!(
            target: "throttle::events",
            event_id = %event.id,
            key = %event.key,
            policy = %event.policy,
            attempts = event.result.attempts_consumed,
            retry_after_secs = event.result.retry_after_secs,
            occurred_at = %event.occurred_at.to_rfc3339(),
            "Limit exceeded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use throttle_core::domain::AttemptResult;

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let event = LimitExceeded::new("throttle:login:k", "login", AttemptResult::rejected(3, 3, 60));
        assert!(TracingSink.on_limit_exceeded(&event).await.is_ok());
    }
}
