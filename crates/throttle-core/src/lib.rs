//! # Throttle Core
//!
//! The domain layer of the Throttle rate limiter.
//! This crate holds policies, cache keys, counter state and the ports that
//! strategies and stores implement. It performs no I/O of its own.

pub mod domain;
pub mod error;
pub mod ports;

pub use domain::{AttemptResult, Policy, RateLimitKey, ResponseAction, StrategyKind};
pub use error::{ConfigError, RateLimitError};
