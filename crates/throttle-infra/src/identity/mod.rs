//! Caller identity as seen by the host.

use std::collections::HashMap;

use throttle_core::domain::KeyDimension;
use throttle_core::ports::IdentityResolver;

/// Attributes of one caller, filled in by the host for each request.
#[derive(Debug, Clone, Default)]
pub struct RequestIdentity {
    pub address: Option<String>,
    pub principal: Option<String>,
    pub session: Option<String>,
    pub fingerprint: Option<String>,
    pub custom: HashMap<String, String>,
}

impl RequestIdentity {
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

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_custom(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(name.into(), value.into());
        self
    }
}

impl IdentityResolver for RequestIdentity {
    fn resolve(&self, dimension: &KeyDimension) -> Option<String> {
        match dimension {
            KeyDimension::Address => self.address.clone(),
            KeyDimension::Principal => self.principal.clone(),
            KeyDimension::Session => self.session.clone(),
            KeyDimension::Fingerprint => self.fingerprint.clone(),
            KeyDimension::Custom(name) => self.custom.get(name).cloned(),
        }
    }
}
