//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub namespace: String,
    pub policies: Vec<String>,
    /// Strategies registered on the manager, built-in and custom.
    pub strategies: Vec<String>,
    pub timestamp: String,
}

/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let manager = &state.manager;

    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store,
        namespace: manager.namespace().to_string(),
        policies: manager.policy_names(),
        strategies: manager.strategy_names(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
