//! Application state - shared across all handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::{self, error::RecvError};

use throttle_core::domain::LimitExceeded;
use throttle_core::ports::Cache;
use throttle_infra::{BroadcastSink, FanoutSink, InMemoryCache, RateLimiterManager, TracingSink};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RateLimiterManager>,
    /// Name of the counter store in use.
    pub store: &'static str,
    /// Rejections observed since startup.
    pub rejections: Arc<AtomicU64>,
    /// Principals allowed to reset or clear counters.
    pub admins: Arc<Vec<String>>,
}

impl AppState {
    /// Build the manager and its store, and start counting rejections.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let (cache, store) = build_cache(config).await?;

        let events = BroadcastSink::new(256);
        let receiver = events.subscribe();

        let sink = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(events));
        let sink = with_redis_events(sink, config).await;

        let manager = config
            .throttle
            .manager_builder(cache)?
            .sink(Arc::new(sink))
            .build()?;

        tracing::info!(store, namespace = %manager.namespace(), "Application state initialized");

        let state = Self::from_manager(manager, store, config.admin_principals.clone());
        spawn_rejection_counter(receiver, state.rejections.clone());
        Ok(state)
    }

    pub fn from_manager(manager: RateLimiterManager, store: &'static str, admins: Vec<String>) -> Self {
        Self {
            manager: Arc::new(manager),
            store,
            rejections: Arc::new(AtomicU64::new(0)),
            admins: Arc::new(admins),
        }
    }

    pub fn is_admin(&self, principal: Option<&str>) -> bool {
        principal.is_some_and(|p| self.admins.iter().any(|admin| admin == p))
    }
}

#[cfg(feature = "redis")]
async fn build_cache(config: &AppConfig) -> anyhow::Result<(Arc<dyn Cache>, &'static str)> {
    use throttle_infra::RedisCache;

    let Some(redis) = &config.redis else {
        tracing::warn!("REDIS_URL not set. Counters are kept in process memory.");
        return Ok((Arc::new(InMemoryCache::new()), "memory"));
    };

    match RedisCache::new(redis).await {
        Ok(cache) => Ok((Arc::new(cache), "redis")),
        Err(e) if redis.fallback_to_memory => {
            tracing::error!(error = %e, "Failed to connect to Redis. Using in-memory fallback.");
            Ok((Arc::new(InMemoryCache::new()), "memory"))
        }
        Err(e) => Err(anyhow::Error::new(e).context("failed to connect to Redis")),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_cache(_config: &AppConfig) -> anyhow::Result<(Arc<dyn Cache>, &'static str)> {
    tracing::info!("Running without redis feature - counters are kept in process memory");
    Ok((Arc::new(InMemoryCache::new()), "memory"))
}

/// Add Redis publishing to the sink when an events channel is configured.
/// A publisher that cannot connect is skipped; rejections are still logged.
#[cfg(feature = "redis")]
async fn with_redis_events(sink: FanoutSink, config: &AppConfig) -> FanoutSink {
    use throttle_infra::{RedisConfig, RedisPublishSink};

    let Some(channel) = &config.events_channel else {
        return sink;
    };
    let redis = config.redis.clone().unwrap_or_else(RedisConfig::from_env);

    match RedisPublishSink::new(&redis, channel.clone()).await {
        Ok(publisher) => sink.with(Arc::new(publisher)),
        Err(e) => {
            tracing::error!(error = %e, channel = %channel, "Limit events will not be published");
            sink
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn with_redis_events(sink: FanoutSink, _config: &AppConfig) -> FanoutSink {
    sink
}

fn spawn_rejection_counter(mut receiver: broadcast::Receiver<LimitExceeded>, counter: Arc<AtomicU64>) {
    actix_rt::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(_) => {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Rejection counter lagged behind");
                    counter.fetch_add(missed, Ordering::Relaxed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
