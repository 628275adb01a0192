//! HTTP handlers and route configuration.

mod demo;
mod health;
mod limits;

use actix_web::web;

use crate::middleware::RateLimit;
use crate::state::AppState;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Guarded demo routes
            .service(
                web::resource("/login")
                    .wrap(RateLimit::new(state.manager.clone(), "login"))
                    .route(web::post().to(demo::login)),
            )
            .service(
                web::resource("/search")
                    .wrap(RateLimit::new(state.manager.clone(), "api"))
                    .route(web::get().to(demo::search)),
            )
            // Quota inspection for the calling client; resets are admin-only
            .service(
                web::scope("/limits")
                    .route("/stats", web::get().to(limits::stats))
                    .route("/{policy}", web::get().to(limits::status))
                    .route("/{policy}", web::delete().to(limits::reset)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use throttle_core::domain::Policy;
    use throttle_infra::{InMemoryCache, RateLimiterManager};

    const ADMIN: &str = "ops-admin";

    fn state() -> AppState {
        let manager = RateLimiterManager::builder(std::sync::Arc::new(InMemoryCache::new()))
            .policy(Policy::per_minutes("login", 2, 5).unwrap())
            .policy(Policy::per_minutes("api", 10, 1).unwrap())
            .default_policy("api")
            .build()
            .unwrap();
        AppState::from_manager(manager, "memory", vec![ADMIN.to_string()])
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .configure(|cfg| configure_routes(cfg, &$state)),
            )
            .await
        };
    }

    fn login() -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/login")
            .peer_addr("10.0.0.7:4000".parse().unwrap())
            .set_json(serde_json::json!({ "username": "alice" }))
    }

    fn delete(uri: &str) -> test::TestRequest {
        test::TestRequest::delete()
            .uri(uri)
            .peer_addr("10.0.0.7:4000".parse().unwrap())
    }

    #[actix_web::test]
    async fn test_limited_caller_cannot_reset_own_counter() {
        let state = state();
        let app = app!(state);

        let mut admitted = 0;
        for _ in 0..20 {
            let res = test::call_service(&app, login().to_request()).await;
            if res.status() == StatusCode::OK {
                admitted += 1;
            } else {
                assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
                let reset = test::call_service(&app, delete("/api/limits/login").to_request()).await;
                assert_eq!(reset.status(), StatusCode::FORBIDDEN);
                let reset = test::call_service(&app, delete("/api/limits/login?key=10.0.0.7").to_request()).await;
                assert_eq!(reset.status(), StatusCode::FORBIDDEN);
            }
        }
        assert_eq!(admitted, 2);
    }

    #[actix_web::test]
    async fn test_admin_can_reset_a_key() {
        let state = state();
        let app = app!(state);

        for _ in 0..2 {
            test::call_service(&app, login().to_request()).await;
        }
        let res = test::call_service(&app, login().to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let req = delete("/api/limits/login?key=10.0.0.7")
            .insert_header(("X-User-Id", ADMIN))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let res = test::call_service(&app, login().to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_admin_clear_of_unknown_policy_is_not_found() {
        let state = state();
        let app = app!(state);

        let req = delete("/api/limits/serach")
            .insert_header(("X-User-Id", ADMIN))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = delete("/api/limits/login")
            .insert_header(("X-User-Id", ADMIN))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["removed"], 0);
    }

    #[actix_web::test]
    async fn test_status_reports_callers_quota() {
        let state = state();
        let app = app!(state);

        test::call_service(&app, login().to_request()).await;

        let req = test::TestRequest::get()
            .uri("/api/limits/login")
            .peer_addr("10.0.0.7:4000".parse().unwrap())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["attempts"], 1);
        assert_eq!(body["remaining"], 1);
        assert_eq!(body["strategy"], "fixed_window");
    }

    #[actix_web::test]
    async fn test_health_lists_policies_and_strategies() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["policies"], serde_json::json!(["api", "login"]));
        assert!(
            body["strategies"]
                .as_array()
                .unwrap()
                .iter()
                .any(|s| s == "token_bucket")
        );
    }
}
