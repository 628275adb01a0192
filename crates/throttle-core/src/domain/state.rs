//! Per-key counter records as persisted in the cache store.
//!
//! Timestamps are wall-clock milliseconds since the Unix epoch so that records
//! written by one process can be interpreted by another.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ports::CacheError;

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, CacheError> {
    serde_json::from_str(raw)
        .map_err(|e| CacheError::Serialization(format!("corrupt counter state at {key}: {e}")))
}

fn encode<T: Serialize>(value: &T) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Fixed window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindowState {
    pub count: u32,
    pub window_expires_at: u64,
}

impl FixedWindowState {
    pub fn decode(key: &str, raw: &str) -> Result<Self, CacheError> {
        decode(key, raw)
    }

    pub fn encode(&self) -> Result<String, CacheError> {
        encode(self)
    }

    pub fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.window_expires_at
    }
}

/// Sliding window log: one timestamp per admitted attempt, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindowState {
    pub timestamps: Vec<u64>,
}

impl SlidingWindowState {
    pub fn decode(key: &str, raw: &str) -> Result<Self, CacheError> {
        decode(key, raw)
    }

    pub fn encode(&self) -> Result<String, CacheError> {
        encode(self)
    }

    /// Drop every timestamp that has aged out of the window ending at `now_ms`.
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) {
        let cutoff = now_ms.saturating_sub(window_ms);
        self.timestamps.retain(|&ts| ts > cutoff);
    }

    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.iter().copied().min()
    }
}

/// Token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketState {
    pub tokens: f64,
    pub last_refill_at: u64,
    pub capacity: u32,
}

impl TokenBucketState {
    pub fn full(capacity: u32, now_ms: u64) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill_at: now_ms,
            capacity,
        }
    }

    pub fn decode(key: &str, raw: &str) -> Result<Self, CacheError> {
        decode(key, raw)
    }

    pub fn encode(&self) -> Result<String, CacheError> {
        encode(self)
    }

    /// Add the tokens accrued since the last refill, capped at capacity.
    pub fn refill(&mut self, now_ms: u64, rate_per_sec: f64) {
        let elapsed_secs = now_ms.saturating_sub(self.last_refill_at) as f64 / 1000.0;
        self.tokens = (self.tokens + elapsed_secs * rate_per_sec).clamp(0.0, self.capacity as f64);
        self.last_refill_at = now_ms.max(self.last_refill_at);
    }

    pub fn whole_tokens(&self) -> u32 {
        self.tokens.floor().max(0.0) as u32
    }
}
