//! Error handling - RFC 7807 problem responses.

use std::fmt;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};

use throttle_core::{ConfigError, RateLimitError};

/// RFC 7807 Problem Details for HTTP APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Seconds until the caller may retry, for rate limit problems.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ProblemDetails {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: title.into(),
            status,
            detail: None,
            retry_after: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn too_many_requests(retry_after: u64) -> Self {
        Self::new(429, "Too Many Requests")
            .with_detail(format!("Rate limit exceeded. Try again in {retry_after} seconds."))
            .with_retry_after(retry_after)
    }
}

/// Application-level error type that converts to problem responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Forbidden(String),
    /// The counter store could not be reached.
    Unavailable(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let problem = match self {
            AppError::NotFound(detail) => ProblemDetails::new(404, "Not Found").with_detail(detail),
            AppError::Forbidden(detail) => ProblemDetails::new(403, "Forbidden").with_detail(detail),
            AppError::Unavailable(detail) => {
                tracing::error!("Counter store unavailable: {}", detail);
                ProblemDetails::new(503, "Service Unavailable")
                    .with_detail("Rate limit state is temporarily unavailable.")
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ProblemDetails::new(500, "Internal Server Error")
            }
        };

        HttpResponse::build(self.status_code()).json(problem)
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Config(e @ ConfigError::UnknownPolicy(_)) => AppError::NotFound(e.to_string()),
            RateLimitError::Config(e) => AppError::Internal(e.to_string()),
            RateLimitError::Store(e) => AppError::Unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_serializes_type_field() {
        let json = serde_json::to_value(ProblemDetails::too_many_requests(30)).unwrap();
        assert_eq!(json["type"], "about:blank");
        assert_eq!(json["status"], 429);
        assert_eq!(json["retry_after"], 30);
    }

    #[test]
    fn test_store_errors_map_to_unavailable() {
        let err = AppError::from(RateLimitError::Store(
            throttle_core::ports::CacheError::Connection("refused".to_string()),
        ));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_unknown_policy_maps_to_not_found() {
        let err = AppError::from(RateLimitError::Config(ConfigError::UnknownPolicy(
            "serach".to_string(),
        )));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
