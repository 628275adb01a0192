//! Domain entities for rate limiting.

mod event;
mod key;
mod outcome;
mod policy;
mod state;

pub use event::LimitExceeded;
pub use key::{KEY_SEPARATOR, RateLimitKey};
pub use outcome::{AttemptResult, ResponseAction};
pub use policy::{KeyDimension, Policy, StrategyKind};
pub use state::{FixedWindowState, SlidingWindowState, TokenBucketState};
