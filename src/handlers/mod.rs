mod generate;
mod health;
mod metrics;

pub use generate::generate_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::domain::resolve_brand;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate", post(generate_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_brand))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BrandSettings, Brands, DomainResolver};
    use crate::rate_limit::{RateLimiter, WindowPolicy};
    use crate::upstream::UpstreamClient;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let settings = |name: &str| BrandSettings {
            display_name: name.to_string(),
            notification_email: None,
            api_key: None,
        };
        router(Arc::new(AppState {
            upstream: UpstreamClient::new(
                reqwest::Client::new(),
                "http://127.0.0.1:9",
                "unused",
                "unused",
                Duration::from_secs(1),
            ),
            rate_limiter: Arc::new(RateLimiter::in_memory(WindowPolicy::default())),
            fingerprint_salt: String::new(),
            domains: DomainResolver {
                primary_root: "example.com".to_string(),
                alternate_root: "example.org".to_string(),
                reserved_subdomain: "app".to_string(),
            },
            brands: Brands {
                primary: settings("Primary"),
                alternate: settings("Alternate"),
            },
        }))
    }

    fn get(uri: &str, host: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let res = app().oneshot(get("/health", "example.com")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn brand_cookies_follow_the_host() {
        let res = app().oneshot(get("/health", "www.example.org:443")).await.unwrap();
        let cookies: Vec<_> = res.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(
            cookies,
            [
                "brand=alternate; Path=/; SameSite=Lax",
                "variant=default; Path=/; SameSite=Lax"
            ]
        );
    }

    #[tokio::test]
    async fn metrics_are_exposed() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"prompt":"hi"}"#))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app.oneshot(get("/metrics", "example.com")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("gateway_requests_total"));
    }
}
