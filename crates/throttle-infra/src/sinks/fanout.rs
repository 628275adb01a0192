use std::sync::Arc;

use async_trait::async_trait;

use throttle_core::domain::LimitExceeded;
use throttle_core::ports::{LimitExceededSink, SinkError};

/// Delivers each event to every inner sink.
///
/// All sinks are tried even if one fails; the first failure is returned.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn LimitExceededSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LimitExceededSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl LimitExceededSink for FanoutSink {
    async fn on_limit_exceeded(&self, event: &LimitExceeded) -> Result<(), SinkError> {
        let results = futures::future::join_all(
            self.sinks.iter().map(|sink| sink.on_limit_exceeded(event)),
        )
        .await;

        results.into_iter().collect::<Result<Vec<_>, _>>().map(|_| ())
    }
}
