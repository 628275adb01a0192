//! Limit-exceeded sinks.
//!
//! The manager hands every rejection to at most one sink; use [`FanoutSink`]
//! to deliver to several.

mod broadcast;
mod fanout;
mod logging;

pub use self::broadcast::BroadcastSink;
pub use self::fanout::FanoutSink;
pub use self::logging::TracingSink;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{DEFAULT_CHANNEL as DEFAULT_EVENTS_CHANNEL, RedisPublishSink};
