//! Ports - trait definitions for the collaborators the rate limiter depends on.
//! Infrastructure provides the implementations.

mod cache;
mod clock;
mod identity;
mod sink;
mod strategy;

pub use cache::{Cache, CacheError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::IdentityResolver;
pub use sink::{LimitExceededSink, SinkError};
pub use strategy::RateLimitStrategy;
