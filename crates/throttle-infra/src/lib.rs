//! # Throttle Infrastructure
//!
//! Concrete implementations of the ports defined in `throttle-core`: cache
//! stores, the counting strategies, and the [`RateLimiterManager`] that ties
//! policies, bypass rules and strategies together.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory store only
//! - `redis` - Redis-backed cache store and event publishing

pub mod cache;
pub mod config;
pub mod identity;
pub mod limiter;
pub mod sinks;
pub mod strategies;

// Re-exports - In-Memory
pub use cache::InMemoryCache;
pub use config::{PolicySettings, PolicyTable, ThrottleConfig};
pub use identity::RequestIdentity;
pub use limiter::{
    AttemptRequest, BypassPolicy, CallContext, Guarded, RateLimiterManager,
    RateLimiterManagerBuilder, StrategyFactory, StrategyRegistry,
};
pub use sinks::{BroadcastSink, FanoutSink, TracingSink};
pub use strategies::{FixedWindowStrategy, SlidingWindowStrategy, TokenBucketStrategy};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use cache::{RedisCache, RedisConfig};
#[cfg(feature = "redis")]
pub use sinks::{DEFAULT_EVENTS_CHANNEL, RedisPublishSink};
