//! The rate limiter manager and its collaborators.
//!
//! - [`StrategyRegistry`]: strategy name -> factory, extensible at runtime.
//! - [`BypassPolicy`]: allow-lists and predicates that skip enforcement for one call.
//! - [`RateLimiterManager`]: resolves policies, builds keys, delegates to strategies.

mod bypass;
mod manager;
mod registry;

pub use bypass::{BypassError, BypassPolicy, BypassPredicate, BypassReason, BypassRequest, CallContext};
pub use manager::{
    AttemptRequest, DEFAULT_NAMESPACE, Guarded, RateLimiterManager, RateLimiterManagerBuilder,
};
pub use registry::{StrategyContext, StrategyFactory, StrategyRegistry};
