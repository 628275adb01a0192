//! Strategy registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use throttle_core::ConfigError;
use throttle_core::domain::{Policy, StrategyKind};
use throttle_core::ports::{Cache, Clock, RateLimitStrategy};

use crate::strategies::{FixedWindowStrategy, SlidingWindowStrategy, TokenBucketStrategy};

/// Everything a factory may need to build a strategy for one policy.
pub struct StrategyContext<'a> {
    pub cache: Arc<dyn Cache>,
    pub clock: Arc<dyn Clock>,
    pub policy: &'a Policy,
}

/// Builds a strategy instance for a policy.
pub type StrategyFactory =
    Arc<dyn Fn(&StrategyContext<'_>) -> Arc<dyn RateLimitStrategy> + Send + Sync>;

/// Maps strategy names to factories.
///
/// Starts with the three built-in strategies; custom ones are added with
/// [`extend`](StrategyRegistry::extend). Registering an existing name replaces it.
pub struct StrategyRegistry {
    factories: RwLock<HashMap<String, StrategyFactory>>,
}

impl StrategyRegistry {
    /// An empty registry, without the built-in strategies.
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_builtins() -> Self {
        let registry = Self::empty();

        registry.extend(
            StrategyKind::FixedWindow.as_str(),
            Arc::new(|ctx: &StrategyContext<'_>| {
                Arc::new(FixedWindowStrategy::new(ctx.cache.clone(), ctx.clock.clone()))
                    as Arc<dyn RateLimitStrategy>
            }),
        );
        registry.extend(
            StrategyKind::SlidingWindow.as_str(),
            Arc::new(|ctx: &StrategyContext<'_>| {
                Arc::new(SlidingWindowStrategy::new(ctx.cache.clone(), ctx.clock.clone()))
                    as Arc<dyn RateLimitStrategy>
            }),
        );
        registry.extend(
            StrategyKind::TokenBucket.as_str(),
            Arc::new(|ctx: &StrategyContext<'_>| {
                let mut strategy = TokenBucketStrategy::new(ctx.cache.clone(), ctx.clock.clone());
                if let Some(rate) = ctx.policy.configured_refill_rate() {
                    strategy = strategy.with_refill_rate(rate);
                }
                Arc::new(strategy) as Arc<dyn RateLimitStrategy>
            }),
        );

        registry
    }

    pub fn extend(&self, name: impl Into<String>, factory: StrategyFactory) {
        let name = name.into();
        tracing::debug!(strategy = %name, "Registering rate limit strategy");
        self.factories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    /// Registered strategy names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Build the strategy a policy asks for.
    pub fn resolve(&self, ctx: &StrategyContext<'_>) -> Result<Arc<dyn RateLimitStrategy>, ConfigError> {
        let name = ctx.policy.strategy().as_str();
        let factory = self
            .factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))?;

        Ok(factory(ctx))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
