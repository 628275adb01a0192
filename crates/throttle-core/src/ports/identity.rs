use crate::domain::{KeyDimension, RateLimitKey};

/// Resolves a caller attribute to a string identity.
///
/// Implemented by the host, which knows the caller's address, principal, and
/// session. The rate limiter treats the result as opaque.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, dimension: &KeyDimension) -> Option<String>;

    /// Join the values of several dimensions into one composite identity.
    /// Unresolvable dimensions contribute `"unknown"`.
    fn resolve_composite(&self, dimensions: &[KeyDimension]) -> String {
        RateLimitKey::composite(dimensions.iter().map(|dimension| {
            self.resolve(dimension)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "unknown".to_string())
        }))
    }
}
