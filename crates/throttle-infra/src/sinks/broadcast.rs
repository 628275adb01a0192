//! In-process fan-out of limit-exceeded events.
//!
//! Works within a single process only.

use async_trait::async_trait;
use tokio::sync::broadcast;

use throttle_core::domain::LimitExceeded;
use throttle_core::ports::{LimitExceededSink, SinkError};

/// Publishes events on a tokio broadcast channel.
///
/// Subscribers that fall behind lose the oldest events; publishing never blocks
/// the rate-limited call.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<LimitExceeded>,
}

impl BroadcastSink {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LimitExceeded> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl LimitExceededSink for BroadcastSink {
    async fn on_limit_exceeded(&self, event: &LimitExceeded) -> Result<(), SinkError> {
        // No subscribers is not an error
        match self.sender.send(event.clone()) {
            Ok(receivers) => tracing::debug!(key = %event.key, receivers, "Limit event published"),
            Err(_) => tracing::debug!(key = %event.key, "No subscribers for limit events"),
        }
        Ok(())
    }
}
