//! Demo routes guarded by the rate limit middleware.

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub accepted: bool,
    pub username: String,
}

/// POST /api/login
pub async fn login(form: web::Json<LoginForm>) -> HttpResponse {
    tracing::debug!(username = %form.username, "Login attempt admitted");

    HttpResponse::Ok().json(LoginResponse {
        accepted: true,
        username: form.into_inner().username,
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /api/search?q=
pub async fn search(query: web::Query<SearchQuery>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "query": query.q,
        "results": [],
    }))
}
