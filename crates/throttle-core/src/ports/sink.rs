use async_trait::async_trait;

use crate::domain::LimitExceeded;

/// Receives a signal every time an attempt is rejected.
///
/// The decision has already been made when the sink runs; sink failures are
/// logged by the caller and never change it.
#[async_trait]
pub trait LimitExceededSink: Send + Sync {
    async fn on_limit_exceeded(&self, event: &LimitExceeded) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to deliver limit-exceeded event: {0}")]
    Delivery(String),
}
