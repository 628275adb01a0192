//! Publishes limit-exceeded events to a Redis channel.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use throttle_core::domain::LimitExceeded;
use throttle_core::ports::{LimitExceededSink, SinkError};

use crate::cache::RedisConfig;

/// Default channel name.
pub const DEFAULT_CHANNEL: &str = "throttle:events";

/// Sends each event as JSON with `PUBLISH`, so other processes can react to it.
pub struct RedisPublishSink {
    conn: ConnectionManager,
    channel: String,
}

impl RedisPublishSink {
    pub async fn new(config: &RedisConfig, channel: impl Into<String>) -> Result<Self, SinkError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| SinkError::Delivery(e.to_string()))?;

        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| SinkError::Delivery("Connection timed out".to_string()))?
            .map_err(|e| SinkError::Delivery(e.to_string()))?;

        let channel = channel.into();
        tracing::info!(url = %config.url, channel = %channel, "Publishing limit events to Redis");

        Ok(Self { conn, channel })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl LimitExceededSink for RedisPublishSink {
    async fn on_limit_exceeded(&self, event: &LimitExceeded) -> Result<(), SinkError> {
        let payload =
            serde_json::to_string(event).map_err(|e| SinkError::Delivery(e.to_string()))?;

        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(&self.channel, payload)
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))
    }
}
