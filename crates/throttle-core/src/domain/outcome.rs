use serde::{Deserialize, Serialize};

/// Result of a rate limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub allowed: bool,
    pub attempts_consumed: u32,
    pub remaining: u32,
    /// Seconds until another attempt may succeed. Zero whenever `allowed` is true.
    pub retry_after_secs: u64,
}

impl AttemptResult {
    pub fn admitted(attempts_consumed: u32, max_attempts: u32) -> Self {
        Self {
            allowed: true,
            attempts_consumed,
            remaining: max_attempts.saturating_sub(attempts_consumed),
            retry_after_secs: 0,
        }
    }

    pub fn rejected(attempts_consumed: u32, max_attempts: u32, retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            attempts_consumed,
            remaining: max_attempts.saturating_sub(attempts_consumed),
            retry_after_secs,
        }
    }

    /// Outcome of a bypassed call: full quota, nothing consumed.
    pub fn bypassed(max_attempts: u32) -> Self {
        Self::admitted(0, max_attempts)
    }
}

/// What the calling layer should do when a limit is exceeded.
///
/// The core only carries this tag on the policy; acting on it is the host's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    /// Refuse the action with a "too many requests" response.
    #[default]
    Reject,
    /// Let the action proceed; the exceeded-limit signal is the only effect.
    Notify,
    /// Surface a validation-style error to the caller.
    RaiseError,
    /// Drop the action without telling the caller why.
    Silent,
}
