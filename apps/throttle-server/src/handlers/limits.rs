//! Quota inspection for the calling client, plus operator resets.

use std::sync::atomic::Ordering;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};

use throttle_core::RateLimitError;
use throttle_infra::{AttemptRequest, CallContext};

use crate::middleware::error::AppError;
use crate::middleware::request_identity;
use crate::state::AppState;

#[derive(Serialize)]
pub struct LimitStatus {
    pub policy: String,
    pub strategy: String,
    pub max_attempts: u32,
    pub attempts: u32,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

/// GET /api/limits/{policy}
pub async fn status(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let manager = &state.manager;
    let identity = request_identity(&req);

    let policy = manager
        .configured_policy(Some(path.as_str()))
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    let key = manager
        .identity_for(Some(policy.name()), &identity)
        .map_err(RateLimitError::from)?;

    let context = CallContext {
        address: identity.address.clone(),
        principal: identity.principal.clone(),
        bypass_once: false,
    };
    let request = AttemptRequest::for_policy(policy.name()).with_context(context);

    let status = LimitStatus {
        policy: policy.name().to_string(),
        strategy: policy.strategy().to_string(),
        max_attempts: policy.max_attempts(),
        attempts: manager.attempts(&key, &request).await?,
        remaining: manager.remaining(&key, &request).await?,
        retry_after_secs: manager.retry_after(&key, &request).await?,
    };

    Ok(HttpResponse::Ok().json(status))
}

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    /// Identity part of the key to reset. Without it the whole policy is cleared.
    pub key: Option<String>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub policy: String,
    /// `None` when the store cannot delete in bulk.
    pub removed: Option<u64>,
}

/// DELETE /api/limits/{policy}?key= - reset one key or clear a policy.
///
/// Only principals listed in `THROTTLE_ADMIN_PRINCIPALS` may call this.
pub async fn reset(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ResetQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let identity = request_identity(&req);
    if !state.is_admin(identity.principal.as_deref()) {
        tracing::warn!(
            principal = ?identity.principal,
            address = ?identity.address,
            policy = %path.as_str(),
            "Counter reset refused"
        );
        return Err(AppError::Forbidden("resetting counters requires an admin principal".to_string()));
    }

    let manager = &state.manager;
    match &query.key {
        Some(key) => {
            manager.reset(key, Some(path.as_str())).await?;
            tracing::info!(policy = %path.as_str(), key = %key, "Counter reset by admin");
            Ok(HttpResponse::NoContent().finish())
        }
        None => {
            let removed = manager.clear(Some(path.as_str())).await?;
            Ok(HttpResponse::Ok().json(ClearResponse {
                policy: path.into_inner(),
                removed,
            }))
        }
    }
}

#[derive(Serialize)]
pub struct LimitStats {
    pub store: &'static str,
    pub namespace: String,
    pub rejections: u64,
}

/// GET /api/limits/stats
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(LimitStats {
        store: state.store,
        namespace: state.manager.namespace().to_string(),
        rejections: state.rejections.load(Ordering::Relaxed),
    })
}
