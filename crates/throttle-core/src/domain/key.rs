use std::fmt;

/// Separator between key segments and between composite identity dimensions.
pub const KEY_SEPARATOR: char = ':';

/// Fully-qualified cache key for one quota counter.
///
/// Format: `<namespace>:<policy>:<identity>`. External tooling pattern-matches
/// on this layout, so it must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn new(namespace: &str, policy: &str, identity: &str) -> Self {
        Self(format!(
            "{namespace}{KEY_SEPARATOR}{policy}{KEY_SEPARATOR}{identity}"
        ))
    }

    /// Prefix shared by every key of a policy, or of the whole namespace when
    /// `policy` is `None`.
    pub fn prefix(namespace: &str, policy: Option<&str>) -> String {
        match policy {
            Some(policy) => format!("{namespace}{KEY_SEPARATOR}{policy}{KEY_SEPARATOR}"),
            None => format!("{namespace}{KEY_SEPARATOR}"),
        }
    }

    /// Join several identity dimension values into one composite identity.
    pub fn composite<I, S>(parts: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        parts
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(&KEY_SEPARATOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RateLimitKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let key = RateLimitKey::new("throttle", "login", "10.0.0.1");
        assert_eq!(key.as_str(), "throttle:login:10.0.0.1");
        assert!(key.as_str().starts_with(&RateLimitKey::prefix("throttle", Some("login"))));
        assert!(key.as_str().starts_with(&RateLimitKey::prefix("throttle", None)));
    }

    #[test]
    fn test_composite_identity() {
        let identity = RateLimitKey::composite(["10.0.0.1", "user-7"]);
        assert_eq!(identity, "10.0.0.1:user-7");

        let key = RateLimitKey::new("throttle", "upload", &identity);
        assert_eq!(key.to_string(), "throttle:upload:10.0.0.1:user-7");
    }
}
