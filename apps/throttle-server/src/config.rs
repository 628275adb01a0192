//! Server configuration loaded from environment variables.

use std::env;

use anyhow::Context;
use throttle_infra::ThrottleConfig;

#[cfg(feature = "redis")]
use throttle_infra::{DEFAULT_EVENTS_CHANNEL, RedisConfig};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub throttle: ThrottleConfig,
    /// Principals allowed to reset or clear counters through the API.
    pub admin_principals: Vec<String>,
    /// Set only when `REDIS_URL` is present.
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
    /// Channel for limit-exceeded events, when publishing is enabled.
    #[cfg(feature = "redis")]
    pub events_channel: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let throttle = ThrottleConfig::from_env().context("invalid rate limit configuration")?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            throttle,
            admin_principals: env::var("THROTTLE_ADMIN_PRINCIPALS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            #[cfg(feature = "redis")]
            redis: env::var("REDIS_URL").ok().map(|_| RedisConfig::from_env()),
            #[cfg(feature = "redis")]
            events_channel: env::var("THROTTLE_PUBLISH_EVENTS")
                .ok()
                .filter(|v| v == "true" || v == "1")
                .map(|_| {
                    env::var("THROTTLE_EVENTS_CHANNEL")
                        .ok()
                        .filter(|c| !c.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_EVENTS_CHANNEL.to_string())
                }),
        })
    }
}
