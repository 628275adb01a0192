//! Counting strategies.
//!
//! Every strategy keeps its counter state in the shared [`Cache`] store as JSON
//! and follows the same read-compute-write sequence. None of them is atomic
//! across processes; see [`RateLimitStrategy`] for the consequences.
//!
//! | Strategy | State | Edge behaviour |
//! |----------|-------|----------------|
//! | Fixed window | count + window expiry | bursts of up to 2x at window boundaries |
//! | Sliding window | one timestamp per attempt | exact, storage grows with max attempts |
//! | Token bucket | fractional tokens + last refill | smooth refill, bursts up to capacity |
//!
//! [`Cache`]: throttle_core::ports::Cache
//! [`RateLimitStrategy`]: throttle_core::ports::RateLimitStrategy

mod fixed_window;
mod sliding_window;
mod token_bucket;

pub use fixed_window::FixedWindowStrategy;
pub use sliding_window::SlidingWindowStrategy;
pub use token_bucket::TokenBucketStrategy;

use std::time::Duration;

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Whole seconds covering `ms`, rounded up.
pub(crate) fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}
