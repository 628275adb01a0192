use serde::{Deserialize, Serialize};

use crate::domain::AttemptResult;

/// Signal emitted when an attempt is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitExceeded {
    pub id: uuid::Uuid,
    /// Full namespaced cache key.
    pub key: String,
    pub policy: String,
    pub result: AttemptResult,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl LimitExceeded {
    pub fn new(key: impl Into<String>, policy: impl Into<String>, result: AttemptResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            key: key.into(),
            policy: policy.into(),
            result,
            occurred_at: chrono::Utc::now(),
        }
    }
}
