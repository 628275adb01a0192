//! Error taxonomy for rate limiting operations.

use thiserror::Error;

use crate::ports::CacheError;

/// Configuration errors - fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown rate limit strategy: {0}")]
    UnknownStrategy(String),

    #[error("Unknown rate limit policy '{0}' and no default policy configured")]
    UnknownPolicy(String),

    #[error("No policy requested and no default policy configured")]
    NoDefaultPolicy,

    #[error("Invalid policy '{policy}': {reason}")]
    InvalidPolicy { policy: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    pub fn invalid(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            policy: policy.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the manager and the strategies.
///
/// Exceeding a limit is not an error; it is reported through
/// [`AttemptResult::allowed`](crate::AttemptResult).
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] CacheError),
}

impl RateLimitError {
    /// Configuration errors indicate a deployment problem rather than a transient failure.
    pub fn is_config(&self) -> bool {
        matches!(self, RateLimitError::Config(_))
    }
}
