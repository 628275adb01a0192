//! Bypass rules: conditions under which a call is not rate limited at all.

use std::net::IpAddr;
use std::sync::Arc;

/// Per-call facts supplied by the host.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Caller network address.
    pub address: Option<String>,
    /// Authenticated principal, if any.
    pub principal: Option<String>,
    /// Skip enforcement for this call only.
    pub bypass_once: bool,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn bypass_once(mut self) -> Self {
        self.bypass_once = true;
        self
    }
}

/// Input handed to a custom bypass predicate.
#[derive(Debug, Clone, Copy)]
pub struct BypassRequest<'a> {
    pub policy: &'a str,
    pub key: &'a str,
    pub context: &'a CallContext,
}

/// Error returned by a custom bypass predicate.
pub type BypassError = Box<dyn std::error::Error + Send + Sync>;

/// Custom bypass rule. An `Err` counts as "not bypassed".
pub type BypassPredicate =
    Arc<dyn Fn(&BypassRequest<'_>) -> Result<bool, BypassError> + Send + Sync>;

/// Which rule granted a bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    Once,
    Environment,
    Address,
    Principal,
    Predicate,
}

impl BypassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassReason::Once => "once",
            BypassReason::Environment => "environment",
            BypassReason::Address => "address",
            BypassReason::Principal => "principal",
            BypassReason::Predicate => "predicate",
        }
    }
}

/// Allow-lists checked before any strategy runs.
///
/// Evaluation order, first match wins: the call's own `bypass_once` flag,
/// the current environment, the caller address, the principal, then the
/// custom predicate.
#[derive(Clone, Default)]
pub struct BypassPolicy {
    environment: Option<String>,
    environments: Vec<String>,
    addresses: Vec<String>,
    principals: Vec<String>,
    predicate: Option<BypassPredicate>,
}

impl BypassPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the environment this process runs in (e.g. `local`, `testing`).
    pub fn environment(mut self, current: impl Into<String>) -> Self {
        self.environment = Some(current.into());
        self
    }

    /// Environments in which enforcement is disabled.
    pub fn allow_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments.extend(environments.into_iter().map(Into::into));
        self
    }

    pub fn allow_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.addresses.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn allow_principals<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principals.extend(principals.into_iter().map(Into::into));
        self
    }

    pub fn predicate(mut self, predicate: BypassPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn evaluate(&self, request: &BypassRequest<'_>) -> Option<BypassReason> {
        let ctx = request.context;

        if ctx.bypass_once {
            return Some(BypassReason::Once);
        }

        if let Some(current) = &self.environment
            && self.environments.iter().any(|env| env.eq_ignore_ascii_case(current))
        {
            return Some(BypassReason::Environment);
        }

        if let Some(address) = &ctx.address
            && self.addresses.iter().any(|allowed| same_address(allowed, address))
        {
            return Some(BypassReason::Address);
        }

        if let Some(principal) = &ctx.principal
            && self.principals.iter().any(|allowed| allowed == principal)
        {
            return Some(BypassReason::Principal);
        }

        if let Some(predicate) = &self.predicate {
            match predicate(request) {
                Ok(true) => return Some(BypassReason::Predicate),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        policy = %request.policy,
                        key = %request.key,
                        error = %e,
                        "Bypass predicate failed, enforcing limit"
                    );
                }
            }
        }

        None
    }
}

impl std::fmt::Debug for BypassPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BypassPolicy")
            .field("environment", &self.environment)
            .field("environments", &self.environments)
            .field("addresses", &self.addresses)
            .field("principals", &self.principals)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Compare addresses as IPs when both parse (so `::ffff:10.0.0.1` and
/// `10.0.0.1` match), otherwise as plain strings.
fn same_address(allowed: &str, candidate: &str) -> bool {
    match (allowed.parse::<IpAddr>(), candidate.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a.to_canonical() == b.to_canonical(),
        _ => allowed == candidate,
    }
}
