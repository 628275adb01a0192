//! Rate limiter configuration loaded from environment variables and an
//! optional JSON policy table.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use throttle_core::ConfigError;
use throttle_core::domain::{KeyDimension, Policy, ResponseAction, StrategyKind};
use throttle_core::ports::Cache;

use crate::limiter::{BypassPolicy, RateLimiterManagerBuilder};

/// Policy name → settings, in a stable order.
pub type PolicyTable = BTreeMap<String, PolicySettings>;

/// One entry of the policy table as written in configuration.
///
/// ```json
/// { "attempts": 5, "decay_minutes": 1, "strategy": "sliding_window",
///   "key_dimensions": ["address", "principal"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySettings {
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_minutes: Option<u64>,
    /// Takes precedence over `decay_minutes` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_seconds: Option<u64>,
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_dimensions: Vec<KeyDimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refill_rate: Option<f64>,
    #[serde(default)]
    pub on_exceeded: ResponseAction,
}

fn default_strategy() -> StrategyKind {
    StrategyKind::FixedWindow
}

impl PolicySettings {
    pub fn new(attempts: u32, decay_minutes: u64) -> Self {
        Self {
            attempts,
            decay_minutes: Some(decay_minutes),
            decay_seconds: None,
            strategy: default_strategy(),
            key_dimensions: Vec::new(),
            refill_rate: None,
            on_exceeded: ResponseAction::default(),
        }
    }

    /// Decay window; one minute when neither unit is given.
    /// `None` when `decay_minutes` does not fit in seconds.
    pub fn decay(&self) -> Option<Duration> {
        match (self.decay_seconds, self.decay_minutes) {
            (Some(seconds), _) => Some(Duration::from_secs(seconds)),
            (None, Some(minutes)) => minutes.checked_mul(60).map(Duration::from_secs),
            (None, None) => Some(Duration::from_secs(60)),
        }
    }

    pub fn into_policy(self, name: impl Into<String>) -> Result<Policy, ConfigError> {
        let name = name.into();
        let Some(decay) = self.decay() else {
            return Err(ConfigError::invalid(name, "decay window is too long"));
        };
        let mut policy = Policy::new(name, self.attempts, decay)?
            .with_strategy(self.strategy)
            .with_key_dimensions(self.key_dimensions)
            .with_response(self.on_exceeded);

        if let Some(rate) = self.refill_rate {
            policy = policy.with_refill_rate(rate)?;
        }
        Ok(policy)
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub namespace: String,
    pub default_policy: Option<String>,
    /// Environment this process runs in, matched against `bypass_environments`.
    pub environment: Option<String>,
    pub audit: bool,
    pub bypass_environments: Vec<String>,
    pub bypass_addresses: Vec<String>,
    pub bypass_principals: Vec<String>,
    pub policies: PolicyTable,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            namespace: crate::limiter::DEFAULT_NAMESPACE.to_string(),
            default_policy: Some("default".to_string()),
            environment: None,
            audit: false,
            bypass_environments: Vec::new(),
            bypass_addresses: Vec::new(),
            bypass_principals: Vec::new(),
            policies: Self::builtin_policies(),
        }
    }
}

impl ThrottleConfig {
    /// Policies used when no policy table is configured.
    pub fn builtin_policies() -> PolicyTable {
        let mut login = PolicySettings::new(5, 1);
        login.key_dimensions = vec![KeyDimension::Address];

        let mut api = PolicySettings::new(60, 1);
        api.strategy = StrategyKind::SlidingWindow;

        let mut policies = PolicyTable::new();
        policies.insert("default".to_string(), PolicySettings::new(60, 1));
        policies.insert("login".to_string(), login);
        policies.insert("api".to_string(), api);
        policies
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let list = |name: &str| lookup(name).map(|v| split_list(&v)).unwrap_or_default();

        let policies = match lookup("THROTTLE_POLICIES_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => load_policies(Path::new(path.trim()))?,
            None => defaults.policies,
        };

        let default_policy = match lookup("THROTTLE_DEFAULT_POLICY") {
            Some(name) if name.trim().is_empty() => None,
            Some(name) => Some(name.trim().to_string()),
            None => defaults.default_policy.filter(|name| policies.contains_key(name)),
        };

        Ok(Self {
            namespace: lookup("THROTTLE_NAMESPACE")
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty())
                .unwrap_or(defaults.namespace),
            default_policy,
            environment: lookup("APP_ENV").filter(|env| !env.is_empty()),
            audit: lookup("THROTTLE_AUDIT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            bypass_environments: list("THROTTLE_BYPASS_ENVIRONMENTS"),
            bypass_addresses: list("THROTTLE_BYPASS_ADDRESSES"),
            bypass_principals: list("THROTTLE_BYPASS_PRINCIPALS"),
            policies,
        })
    }

    /// Build validated policies from the table.
    pub fn build_policies(&self) -> Result<Vec<Policy>, ConfigError> {
        self.policies
            .iter()
            .map(|(name, settings)| settings.clone().into_policy(name.as_str()))
            .collect()
    }

    pub fn bypass_policy(&self) -> BypassPolicy {
        let mut bypass = BypassPolicy::new()
            .allow_environments(self.bypass_environments.iter().cloned())
            .allow_addresses(self.bypass_addresses.iter().cloned())
            .allow_principals(self.bypass_principals.iter().cloned());
        if let Some(environment) = &self.environment {
            bypass = bypass.environment(environment.clone());
        }
        bypass
    }

    /// A manager builder with every configured policy and bypass rule applied.
    ///
    /// Clock, sink, and custom strategies can still be set on the returned builder.
    pub fn manager_builder(&self, cache: Arc<dyn Cache>) -> Result<RateLimiterManagerBuilder, ConfigError> {
        let mut builder = RateLimiterManagerBuilder::new(cache)
            .namespace(self.namespace.clone())
            .policies(self.build_policies()?)
            .bypass(self.bypass_policy())
            .audit(self.audit);

        if let Some(default) = &self.default_policy {
            builder = builder.default_policy(default.clone());
        }
        Ok(builder)
    }
}

/// Parse a JSON policy table.
pub fn parse_policies(json: &str) -> Result<PolicyTable, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("invalid policy table: {e}")))
}

/// Read and parse a JSON policy table from disk.
pub fn load_policies(path: &Path) -> Result<PolicyTable, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    let policies = parse_policies(&contents)?;

    tracing::info!(path = %path.display(), policies = policies.len(), "Loaded rate limit policies");
    Ok(policies)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
