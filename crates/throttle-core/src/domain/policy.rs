use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ResponseAction;
use crate::error::ConfigError;

/// Counting algorithm a policy is enforced with.
///
/// Anything other than the three built-in names is a custom strategy that
/// must be registered with the manager before use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyKind {
    FixedWindow,
    SlidingWindow,
    TokenBucket,
    Custom(String),
}

impl StrategyKind {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyKind::FixedWindow => "fixed_window",
            StrategyKind::SlidingWindow => "sliding_window",
            StrategyKind::TokenBucket => "token_bucket",
            StrategyKind::Custom(name) => name,
        }
    }
}

impl From<&str> for StrategyKind {
    fn from(name: &str) -> Self {
        match name {
            "fixed_window" => StrategyKind::FixedWindow,
            "sliding_window" => StrategyKind::SlidingWindow,
            "token_bucket" => StrategyKind::TokenBucket,
            other => StrategyKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for StrategyKind {
    fn from(name: String) -> Self {
        StrategyKind::from(name.as_str())
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller attribute used to build the identity part of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyDimension {
    Address,
    Principal,
    Session,
    Fingerprint,
    Custom(String),
}

impl KeyDimension {
    pub fn as_str(&self) -> &str {
        match self {
            KeyDimension::Address => "address",
            KeyDimension::Principal => "principal",
            KeyDimension::Session => "session",
            KeyDimension::Fingerprint => "fingerprint",
            KeyDimension::Custom(name) => name,
        }
    }
}

impl From<&str> for KeyDimension {
    fn from(name: &str) -> Self {
        match name {
            "address" | "ip" => KeyDimension::Address,
            "principal" | "user" => KeyDimension::Principal,
            "session" => KeyDimension::Session,
            "fingerprint" => KeyDimension::Fingerprint,
            other => KeyDimension::Custom(other.to_string()),
        }
    }
}

impl From<String> for KeyDimension {
    fn from(name: String) -> Self {
        KeyDimension::from(name.as_str())
    }
}

impl From<KeyDimension> for String {
    fn from(dimension: KeyDimension) -> Self {
        dimension.as_str().to_string()
    }
}

/// A named rate limit: how many attempts are allowed within a decay window,
/// and which algorithm counts them.
///
/// Policies are validated on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    name: String,
    max_attempts: u32,
    decay: Duration,
    strategy: StrategyKind,
    key_dimensions: Vec<KeyDimension>,
    refill_rate: Option<f64>,
    on_exceeded: ResponseAction,
}

impl Policy {
    /// Create a fixed-window policy.
    pub fn new(name: impl Into<String>, max_attempts: u32, decay: Duration) -> Result<Self, ConfigError> {
        let name = name.into();

        if max_attempts == 0 {
            return Err(ConfigError::invalid(name, "max attempts must be greater than zero"));
        }
        if decay.is_zero() {
            return Err(ConfigError::invalid(name, "decay window must be greater than zero"));
        }

        Ok(Self {
            name,
            max_attempts,
            decay,
            strategy: StrategyKind::FixedWindow,
            key_dimensions: Vec::new(),
            refill_rate: None,
            on_exceeded: ResponseAction::default(),
        })
    }

    /// Convenience constructor matching the `decay_minutes` configuration unit.
    pub fn per_minutes(name: impl Into<String>, max_attempts: u32, minutes: u64) -> Result<Self, ConfigError> {
        let name = name.into();
        let Some(seconds) = minutes.checked_mul(60) else {
            return Err(ConfigError::invalid(name, "decay window is too long"));
        };
        Self::new(name, max_attempts, Duration::from_secs(seconds))
    }

    pub fn with_strategy(mut self, strategy: impl Into<StrategyKind>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_key_dimensions(mut self, dimensions: impl IntoIterator<Item = KeyDimension>) -> Self {
        self.key_dimensions = dimensions.into_iter().collect();
        self
    }

    /// Override the token bucket refill rate (tokens per second).
    pub fn with_refill_rate(mut self, rate: f64) -> Result<Self, ConfigError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ConfigError::invalid(self.name, "refill rate must be a positive number"));
        }
        self.refill_rate = Some(rate);
        Ok(self)
    }

    pub fn with_response(mut self, action: ResponseAction) -> Self {
        self.on_exceeded = action;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn decay(&self) -> Duration {
        self.decay
    }

    pub fn strategy(&self) -> &StrategyKind {
        &self.strategy
    }

    pub fn key_dimensions(&self) -> &[KeyDimension] {
        &self.key_dimensions
    }

    pub fn on_exceeded(&self) -> ResponseAction {
        self.on_exceeded
    }

    /// Refill rate set explicitly on the policy, if any.
    pub fn configured_refill_rate(&self) -> Option<f64> {
        self.refill_rate
    }

    /// Tokens per second for the token bucket.
    ///
    /// Defaults to refilling the whole capacity over one decay window.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
            .unwrap_or_else(|| self.max_attempts as f64 / self.decay.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_zero_attempts() {
        let err = Policy::new("login", 0, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPolicy { .. }));
    }

    #[test]
    fn test_policy_rejects_zero_decay() {
        assert!(Policy::new("login", 5, Duration::ZERO).is_err());
    }

    #[test]
    fn test_per_minutes_overflow_is_invalid() {
        let err = Policy::per_minutes("login", 5, u64::MAX).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPolicy { .. }));
        assert_eq!(
            Policy::per_minutes("login", 5, 2).unwrap().decay(),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_default_refill_rate_spreads_capacity_over_window() {
        let policy = Policy::per_minutes("api", 120, 1).unwrap();
        assert_eq!(policy.refill_rate(), 2.0);

        let policy = policy.with_refill_rate(0.5).unwrap();
        assert_eq!(policy.refill_rate(), 0.5);
    }

    #[test]
    fn test_strategy_kind_from_name() {
        assert_eq!(StrategyKind::from("sliding_window"), StrategyKind::SlidingWindow);
        assert_eq!(
            StrategyKind::from("gcra"),
            StrategyKind::Custom("gcra".to_string())
        );
        assert_eq!(StrategyKind::TokenBucket.to_string(), "token_bucket");
    }

    #[test]
    fn test_strategy_kind_deserializes_from_plain_string() {
        let kind: StrategyKind = serde_json::from_str("\"token_bucket\"").unwrap();
        assert_eq!(kind, StrategyKind::TokenBucket);
    }
}
