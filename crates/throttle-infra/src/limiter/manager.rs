//! Rate limiter manager - the single entry point used by calling code.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use throttle_core::domain::{AttemptResult, KeyDimension, LimitExceeded, Policy, RateLimitKey};
use throttle_core::ports::{
    Cache, CacheError, Clock, IdentityResolver, LimitExceededSink, RateLimitStrategy, SystemClock,
};
use throttle_core::{ConfigError, RateLimitError};

use super::bypass::{BypassPolicy, BypassReason, BypassRequest, CallContext};
use super::registry::{StrategyContext, StrategyFactory, StrategyRegistry};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "throttle";

/// Options for a single manager call.
///
/// Explicit `max_attempts` and `decay` take precedence over the policy's values.
#[derive(Debug, Clone, Default)]
pub struct AttemptRequest {
    pub policy: Option<String>,
    pub max_attempts: Option<u32>,
    pub decay: Option<Duration>,
    pub context: CallContext,
}

impl AttemptRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_policy(policy: impl Into<String>) -> Self {
        Self {
            policy: Some(policy.into()),
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_decay(mut self, decay: Duration) -> Self {
        self.decay = Some(decay);
        self
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// Outcome of [`RateLimiterManager::attempt_with`].
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    /// The attempt was admitted and the callback ran.
    Allowed(T),
    /// The attempt was rejected; the callback did not run.
    Limited(AttemptResult),
}

impl<T> Guarded<T> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Guarded::Allowed(_))
    }
}

/// A call resolved against configuration, before any store access.
struct Resolved<'a> {
    policy: &'a Policy,
    key: RateLimitKey,
    max_attempts: u32,
    decay: Duration,
    bypass: Option<BypassReason>,
}

/// Resolves policies, applies bypass rules, builds namespaced keys and
/// delegates counting to the policy's strategy.
///
/// The manager holds no counter state itself; everything lives in the cache
/// store, so one manager can be shared freely between request handlers.
pub struct RateLimiterManager {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    namespace: String,
    policies: HashMap<String, Policy>,
    default_policy: Option<String>,
    registry: StrategyRegistry,
    bypass: BypassPolicy,
    sink: Option<Arc<dyn LimitExceededSink>>,
    audit: bool,
}

impl RateLimiterManager {
    pub fn builder(cache: Arc<dyn Cache>) -> RateLimiterManagerBuilder {
        RateLimiterManagerBuilder::new(cache)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up a policy by name, falling back to the default policy.
    pub fn policy(&self, name: Option<&str>) -> Result<&Policy, ConfigError> {
        match name {
            Some(name) => match self.policies.get(name) {
                Some(policy) => Ok(policy),
                None => {
                    let policy = self
                        .fallback_policy()
                        .ok_or_else(|| ConfigError::UnknownPolicy(name.to_string()))?;
                    tracing::warn!(
                        requested = %name,
                        default = %policy.name(),
                        "Unknown rate limit policy, using default"
                    );
                    Ok(policy)
                }
            },
            None => self.fallback_policy().ok_or(ConfigError::NoDefaultPolicy),
        }
    }

    /// Look up a policy without falling back. Used by operations that delete
    /// counters, where a misspelled name must not reach the default policy.
    pub fn configured_policy(&self, name: Option<&str>) -> Result<&Policy, ConfigError> {
        match name {
            Some(name) => self
                .policies
                .get(name)
                .ok_or_else(|| ConfigError::UnknownPolicy(name.to_string())),
            None => self.fallback_policy().ok_or(ConfigError::NoDefaultPolicy),
        }
    }

    /// Names of all registered policies, sorted.
    pub fn policy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of all strategies policies can refer to.
    pub fn strategy_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn fallback_policy(&self) -> Option<&Policy> {
        self.default_policy
            .as_deref()
            .and_then(|name| self.policies.get(name))
    }

    /// Register a custom strategy. Policies naming it become usable immediately.
    pub fn extend(&self, name: impl Into<String>, factory: StrategyFactory) {
        self.registry.extend(name, factory);
    }

    /// Build the identity part of a key from the policy's key dimensions.
    /// Policies without dimensions are keyed by caller address.
    pub fn identity_for(
        &self,
        policy: Option<&str>,
        resolver: &dyn IdentityResolver,
    ) -> Result<String, ConfigError> {
        let policy = self.policy(policy)?;
        let dimensions = policy.key_dimensions();

        if dimensions.is_empty() {
            return Ok(resolver.resolve_composite(&[KeyDimension::Address]));
        }
        Ok(resolver.resolve_composite(dimensions))
    }

    fn resolve<'a>(&'a self, key: &str, request: &AttemptRequest) -> Result<Resolved<'a>, ConfigError> {
        let policy = self.policy(request.policy.as_deref())?;

        let max_attempts = request.max_attempts.unwrap_or(policy.max_attempts());
        if max_attempts == 0 {
            return Err(ConfigError::invalid(policy.name(), "max attempts override must be greater than zero"));
        }
        let decay = request.decay.unwrap_or(policy.decay());
        if decay.is_zero() {
            return Err(ConfigError::invalid(policy.name(), "decay override must be greater than zero"));
        }

        let full_key = RateLimitKey::new(&self.namespace, policy.name(), key);
        let bypass = self.bypass.evaluate(&BypassRequest {
            policy: policy.name(),
            key: full_key.as_str(),
            context: &request.context,
        });

        Ok(Resolved {
            policy,
            key: full_key,
            max_attempts,
            decay,
            bypass,
        })
    }

    fn strategy_for(&self, policy: &Policy) -> Result<Arc<dyn RateLimitStrategy>, ConfigError> {
        self.registry.resolve(&StrategyContext {
            cache: self.cache.clone(),
            clock: self.clock.clone(),
            policy,
        })
    }

    /// Consume one attempt for `key` under the requested policy.
    pub async fn attempt(&self, key: &str, request: &AttemptRequest) -> Result<AttemptResult, RateLimitError> {
        let resolved = self.resolve(key, request)?;

        if let Some(reason) = resolved.bypass {
            tracing::debug!(
                key = %resolved.key,
                policy = %resolved.policy.name(),
                reason = reason.as_str(),
                "Rate limit bypassed"
            );
            return Ok(AttemptResult::bypassed(resolved.max_attempts));
        }

        let strategy = self.strategy_for(resolved.policy)?;
        let result = strategy
            .attempt(resolved.key.as_str(), resolved.max_attempts, resolved.decay)
            .await?;

        if result.allowed {
            tracing::debug!(
                key = %resolved.key,
                strategy = strategy.name(),
                remaining = result.remaining,
                "Rate limit attempt admitted"
            );
        } else {
            self.report_exceeded(&resolved, &result).await;
        }

        Ok(result)
    }

    /// Run `callback` only if the attempt is admitted.
    pub async fn attempt_with<F, Fut, T>(
        &self,
        key: &str,
        request: &AttemptRequest,
        callback: F,
    ) -> Result<Guarded<T>, RateLimitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let result = self.attempt(key, request).await?;
        if result.allowed {
            Ok(Guarded::Allowed(callback().await))
        } else {
            Ok(Guarded::Limited(result))
        }
    }

    /// Whether an attempt made now would be admitted. Never consumes quota.
    pub async fn check(&self, key: &str, request: &AttemptRequest) -> Result<bool, RateLimitError> {
        let resolved = self.resolve(key, request)?;
        if resolved.bypass.is_some() {
            return Ok(true);
        }
        let strategy = self.strategy_for(resolved.policy)?;
        Ok(strategy
            .check(resolved.key.as_str(), resolved.max_attempts, resolved.decay)
            .await?)
    }

    /// Attempts consumed in the current window.
    pub async fn attempts(&self, key: &str, request: &AttemptRequest) -> Result<u32, RateLimitError> {
        let resolved = self.resolve(key, request)?;
        if resolved.bypass.is_some() {
            return Ok(0);
        }
        let strategy = self.strategy_for(resolved.policy)?;
        Ok(strategy
            .attempts(resolved.key.as_str(), resolved.max_attempts, resolved.decay)
            .await?)
    }

    pub async fn remaining(&self, key: &str, request: &AttemptRequest) -> Result<u32, RateLimitError> {
        let resolved = self.resolve(key, request)?;
        if resolved.bypass.is_some() {
            return Ok(resolved.max_attempts);
        }
        let strategy = self.strategy_for(resolved.policy)?;
        Ok(strategy
            .remaining(resolved.key.as_str(), resolved.max_attempts, resolved.decay)
            .await?)
    }

    pub async fn retry_after(&self, key: &str, request: &AttemptRequest) -> Result<u64, RateLimitError> {
        let resolved = self.resolve(key, request)?;
        if resolved.bypass.is_some() {
            return Ok(0);
        }
        let strategy = self.strategy_for(resolved.policy)?;
        Ok(strategy
            .retry_after(resolved.key.as_str(), resolved.max_attempts, resolved.decay)
            .await?)
    }

    /// Forget the counter for one key. An unknown policy name is an error.
    pub async fn reset(&self, key: &str, policy: Option<&str>) -> Result<(), RateLimitError> {
        let policy = self.configured_policy(policy)?;
        let full_key = RateLimitKey::new(&self.namespace, policy.name(), key);
        let strategy = self.strategy_for(policy)?;

        strategy.reset(full_key.as_str()).await?;
        tracing::debug!(key = %full_key, "Rate limit counter reset");
        Ok(())
    }

    /// Remove every counter of a policy, or of the whole namespace.
    ///
    /// Best effort: returns `Ok(None)` when the store cannot delete by prefix.
    /// An unknown policy name is an error and deletes nothing.
    pub async fn clear(&self, policy: Option<&str>) -> Result<Option<u64>, RateLimitError> {
        let policy_name = match policy {
            Some(name) => Some(self.configured_policy(Some(name))?.name()),
            None => None,
        };
        let prefix = RateLimitKey::prefix(&self.namespace, policy_name);

        match self.cache.delete_prefix(&prefix).await {
            Ok(removed) => {
                tracing::info!(prefix = %prefix, removed, "Rate limit counters cleared");
                Ok(Some(removed))
            }
            Err(CacheError::Unsupported(op)) => {
                tracing::warn!(prefix = %prefix, operation = op, "Store cannot clear counters in bulk");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn report_exceeded(&self, resolved: &Resolved<'_>, result: &AttemptResult) {
        tracing::warn!(
            key = %resolved.key,
            policy = %resolved.policy.name(),
            retry_after_secs = result.retry_after_secs,
            "Rate limit exceeded"
        );

        if self.audit {
            tracing::info!(
                target: "throttle::audit",
                key = %resolved.key,
                policy = %resolved.policy.name(),
                attempts = result.attempts_consumed,
                max_attempts = resolved.max_attempts,
                retry_after_secs = result.retry_after_secs,
                "rate limit exceeded"
            );
        }

        if let Some(sink) = &self.sink {
            let event = LimitExceeded::new(resolved.key.as_str(), resolved.policy.name(), *result);
            if let Err(e) = sink.on_limit_exceeded(&event).await {
                tracing::warn!(key = %resolved.key, error = %e, "Limit-exceeded sink failed");
            }
        }
    }
}

/// Builder for [`RateLimiterManager`]; policies are registered here once at startup.
pub struct RateLimiterManagerBuilder {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    namespace: String,
    policies: HashMap<String, Policy>,
    default_policy: Option<String>,
    registry: StrategyRegistry,
    bypass: BypassPolicy,
    sink: Option<Arc<dyn LimitExceededSink>>,
    audit: bool,
}

impl RateLimiterManagerBuilder {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            clock: Arc::new(SystemClock),
            namespace: DEFAULT_NAMESPACE.to_string(),
            policies: HashMap::new(),
            default_policy: None,
            registry: StrategyRegistry::with_builtins(),
            bypass: BypassPolicy::default(),
            sink: None,
            audit: false,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Register a policy. A later policy with the same name replaces the earlier one.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.insert(policy.name().to_string(), policy);
        self
    }

    pub fn policies(mut self, policies: impl IntoIterator<Item = Policy>) -> Self {
        for policy in policies {
            self.policies.insert(policy.name().to_string(), policy);
        }
        self
    }

    pub fn default_policy(mut self, name: impl Into<String>) -> Self {
        self.default_policy = Some(name.into());
        self
    }

    pub fn bypass(mut self, bypass: BypassPolicy) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LimitExceededSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Write an audit log entry for every rejected attempt.
    pub fn audit(mut self, enabled: bool) -> Self {
        self.audit = enabled;
        self
    }

    pub fn extend(self, name: impl Into<String>, factory: StrategyFactory) -> Self {
        self.registry.extend(name, factory);
        self
    }

    pub fn build(self) -> Result<RateLimiterManager, ConfigError> {
        if let Some(default) = &self.default_policy
            && !self.policies.contains_key(default)
        {
            return Err(ConfigError::UnknownPolicy(default.clone()));
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::Load("rate limit namespace must not be empty".to_string()));
        }

        tracing::info!(
            namespace = %self.namespace,
            policies = self.policies.len(),
            default_policy = ?self.default_policy,
            strategies = ?self.registry.names(),
            "Rate limiter initialized"
        );

        Ok(RateLimiterManager {
            cache: self.cache,
            clock: self.clock,
            namespace: self.namespace,
            policies: self.policies,
            default_policy: self.default_policy,
            registry: self.registry,
            bypass: self.bypass,
            sink: self.sink,
            audit: self.audit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use std::sync::atomic::{AtomicBool, Ordering};
    use throttle_core::domain::StrategyKind;
    use throttle_core::ports::ManualClock;

    fn manager() -> (RateLimiterManager, Arc<InMemoryCache>, ManualClock) {
        let clock = ManualClock::default();
        let cache = Arc::new(InMemoryCache::with_clock(Arc::new(clock.clone())));
        let manager = RateLimiterManager::builder(cache.clone())
            .clock(Arc::new(clock.clone()))
            .policy(Policy::per_minutes("login", 3, 5).unwrap())
            .policy(
                Policy::per_minutes("search", 10, 1)
                    .unwrap()
                    .with_strategy(StrategyKind::SlidingWindow),
            )
            .default_policy("login")
            .build()
            .unwrap();
        (manager, cache, clock)
    }

    #[tokio::test]
    async fn test_key_is_namespaced_by_policy() {
        let (manager, cache, _) = manager();
        manager
            .attempt("10.0.0.1", &AttemptRequest::for_policy("search"))
            .await
            .unwrap();

        assert!(cache.get("throttle:search:10.0.0.1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_default_policy_used_when_none_given() {
        let (manager, cache, _) = manager();
        manager.attempt("k", &AttemptRequest::new()).await.unwrap();
        assert!(cache.get("throttle:login:k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_policy_falls_back_to_default() {
        let (manager, _, _) = manager();
        let result = manager
            .attempt("k", &AttemptRequest::for_policy("nope"))
            .await
            .unwrap();
        assert_eq!(result.remaining, 2);
    }

    #[tokio::test]
    async fn test_unknown_policy_without_default_is_config_error() {
        let manager = RateLimiterManager::builder(Arc::new(InMemoryCache::new()))
            .policy(Policy::per_minutes("login", 3, 5).unwrap())
            .build()
            .unwrap();

        let err = manager
            .attempt("k", &AttemptRequest::for_policy("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::Config(ConfigError::UnknownPolicy(_))));

        let err = manager.attempt("k", &AttemptRequest::new()).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Config(ConfigError::NoDefaultPolicy)));
    }

    #[test]
    fn test_build_rejects_missing_default_policy() {
        let result = RateLimiterManager::builder(Arc::new(InMemoryCache::new()))
            .default_policy("missing")
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownPolicy(_))));
    }

    #[tokio::test]
    async fn test_overrides_take_precedence() {
        let (manager, _, _) = manager();
        let request = AttemptRequest::for_policy("login").with_max_attempts(1);

        assert!(manager.attempt("k", &request).await.unwrap().allowed);
        let rejected = manager.attempt("k", &request).await.unwrap();
        assert!(!rejected.allowed);

        let request = AttemptRequest::for_policy("login").with_decay(Duration::from_secs(10));
        manager.reset("k", Some("login")).await.unwrap();
        for _ in 0..3 {
            manager.attempt("k", &request).await.unwrap();
        }
        let rejected = manager.attempt("k", &request).await.unwrap();
        assert!(rejected.retry_after_secs <= 10);
    }

    #[tokio::test]
    async fn test_zero_override_is_config_error() {
        let (manager, _, _) = manager();
        let err = manager
            .attempt("k", &AttemptRequest::new().with_max_attempts(0))
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_attempt_with_runs_callback_only_when_admitted() {
        let (manager, _, _) = manager();
        let request = AttemptRequest::for_policy("login").with_max_attempts(1);

        let first = manager
            .attempt_with("k", &request, || async { "submitted" })
            .await
            .unwrap();
        assert_eq!(first, Guarded::Allowed("submitted"));

        let ran = &AtomicBool::new(false);
        let second = manager
            .attempt_with("k", &request, move || async move {
                ran.store(true, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert!(!second.is_allowed());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_bypass_once_skips_store() {
        let (manager, cache, _) = manager();
        let request = AttemptRequest::new().with_context(CallContext::new().bypass_once());

        for _ in 0..10 {
            let result = manager.attempt("k", &request).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.remaining, 3);
        }
        assert!(cache.is_empty().await);

        // The flag does not carry over to the next call.
        let result = manager.attempt("k", &AttemptRequest::new()).await.unwrap();
        assert_eq!(result.remaining, 2);
    }

    #[tokio::test]
    async fn test_clear_policy_only() {
        let (manager, cache, _) = manager();
        manager.attempt("a", &AttemptRequest::for_policy("login")).await.unwrap();
        manager.attempt("b", &AttemptRequest::for_policy("login")).await.unwrap();
        manager.attempt("a", &AttemptRequest::for_policy("search")).await.unwrap();

        let removed = manager.clear(Some("login")).await.unwrap();
        assert_eq!(removed, Some(2));
        assert_eq!(cache.len().await, 1);

        assert_eq!(manager.clear(None).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_reset_and_clear_reject_unknown_policy() {
        let (manager, cache, _) = manager();
        manager.attempt("k", &AttemptRequest::for_policy("login")).await.unwrap();

        let err = manager.clear(Some("serach")).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Config(ConfigError::UnknownPolicy(_))));
        let err = manager.reset("k", Some("logni")).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Config(ConfigError::UnknownPolicy(_))));

        assert_eq!(cache.len().await, 1);
        let remaining = manager
            .remaining("k", &AttemptRequest::for_policy("login"))
            .await
            .unwrap();
        assert_eq!(remaining, 2);
    }

    #[test]
    fn test_policy_and_strategy_names() {
        let (manager, _, _) = manager();
        assert_eq!(manager.policy_names(), vec!["login", "search"]);
        let strategies = manager.strategy_names();
        assert!(strategies.iter().any(|name| name == "sliding_window"));
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl LimitExceededSink for FailingSink {
        async fn on_limit_exceeded(&self, _event: &LimitExceeded) -> Result<(), throttle_core::ports::SinkError> {
            Err(throttle_core::ports::SinkError::Delivery("webhook down".to_string()))
        }
    }

    /// Store that accepts connections but fails every operation.
    struct BrokenCache;

    #[async_trait::async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Connection("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::Connection("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Connection("connection refused".to_string()))
        }
    }

    /// Admits everything and records nothing.
    struct AlwaysAllow;

    #[async_trait::async_trait]
    impl RateLimitStrategy for AlwaysAllow {
        fn name(&self) -> &str {
            "always_allow"
        }

        async fn attempt(&self, _key: &str, max: u32, _decay: Duration) -> Result<AttemptResult, CacheError> {
            Ok(AttemptResult::admitted(0, max))
        }

        async fn attempts(&self, _key: &str, _max: u32, _decay: Duration) -> Result<u32, CacheError> {
            Ok(0)
        }

        async fn retry_after(&self, _key: &str, _max: u32, _decay: Duration) -> Result<u64, CacheError> {
            Ok(0)
        }

        async fn reset(&self, _key: &str) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_change_decision() {
        let manager = RateLimiterManager::builder(Arc::new(InMemoryCache::new()))
            .policy(Policy::per_minutes("login", 1, 5).unwrap())
            .default_policy("login")
            .sink(Arc::new(FailingSink))
            .audit(true)
            .build()
            .unwrap();

        assert!(manager.attempt("k", &AttemptRequest::new()).await.unwrap().allowed);
        let rejected = manager.attempt("k", &AttemptRequest::new()).await.unwrap();
        assert!(!rejected.allowed);
        assert!(rejected.retry_after_secs > 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let manager = RateLimiterManager::builder(Arc::new(BrokenCache))
            .policy(Policy::per_minutes("login", 3, 5).unwrap())
            .default_policy("login")
            .build()
            .unwrap();

        let err = manager.attempt("k", &AttemptRequest::new()).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Store(CacheError::Connection(_))));
        assert!(!err.is_config());
    }

    #[tokio::test]
    async fn test_clear_unsupported_store_is_best_effort() {
        let manager = RateLimiterManager::builder(Arc::new(BrokenCache))
            .policy(Policy::per_minutes("login", 3, 5).unwrap())
            .build()
            .unwrap();

        assert_eq!(manager.clear(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unregistered_strategy_is_config_error() {
        let manager = RateLimiterManager::builder(Arc::new(InMemoryCache::new()))
            .policy(
                Policy::per_minutes("api", 3, 5)
                    .unwrap()
                    .with_strategy("always_allow"),
            )
            .build()
            .unwrap();

        let err = manager
            .attempt("k", &AttemptRequest::for_policy("api"))
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::Config(ConfigError::UnknownStrategy(_))));

        manager.extend(
            "always_allow",
            Arc::new(|_: &StrategyContext<'_>| Arc::new(AlwaysAllow) as Arc<dyn RateLimitStrategy>),
        );
        for _ in 0..10 {
            let result = manager
                .attempt("k", &AttemptRequest::for_policy("api"))
                .await
                .unwrap();
            assert!(result.allowed);
        }
    }

    #[tokio::test]
    async fn test_identity_for_uses_policy_dimensions() {
        use crate::identity::RequestIdentity;

        let cache = Arc::new(InMemoryCache::new());
        let manager = RateLimiterManager::builder(cache)
            .policy(Policy::per_minutes("login", 3, 5).unwrap())
            .policy(
                Policy::per_minutes("upload", 3, 5)
                    .unwrap()
                    .with_key_dimensions([KeyDimension::Address, KeyDimension::Principal]),
            )
            .build()
            .unwrap();

        let identity = RequestIdentity::new().with_address("10.0.0.1");
        assert_eq!(manager.identity_for(Some("login"), &identity).unwrap(), "10.0.0.1");
        assert_eq!(
            manager.identity_for(Some("upload"), &identity).unwrap(),
            "10.0.0.1:unknown"
        );
    }
}
