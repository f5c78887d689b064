//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                       - Liveness
//! GET    /health/ready                 - Readiness (database ping)
//! GET    /uploads/{file}               - Stored product images
//!
//! # Products
//! GET    /api/products                 - Full catalog
//! GET    /api/products/categories      - Distinct categories
//! GET    /api/products/sizes           - Distinct size labels
//! GET    /api/products/{id}            - One product
//! POST   /api/products                 - Create (admin, multipart)
//! PUT    /api/products/{id}            - Update (admin, multipart)
//! DELETE /api/products/{id}            - Delete (admin)
//! POST   /api/products/{id}/rating     - Rate 1..=5 (auth)
//!
//! # Users
//! POST   /api/user/signup              - Create account, returns token
//! POST   /api/user/login               - Returns token
//! GET    /api/user/{id}                - Public profile (self or admin)
//!
//! # Addresses (auth)
//! GET    /api/address/get              - Caller's address
//! POST   /api/address/add              - Save first address
//! PATCH  /api/address/update/{id}      - Merge fields
//! DELETE /api/address/delete/{id}      - Remove
//! ```

pub mod address;
pub mod health;
pub mod products;
pub mod user;

use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request, Response},
    middleware::from_fn,
    routing::{delete, get, patch, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{api_rate_limiter, auth_rate_limiter, request_id_middleware};
use crate::services::images::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/categories", get(products::categories))
        .route("/sizes", get(products::sizes))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/{id}/rating", post(products::rate))
        // Room for one image plus the text fields
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(user::signup))
        .route("/login", post(user::login))
        .route_layer(auth_rate_limiter())
        .route("/{id}", get(user::get_user))
}

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/get", get(address::get))
        .route("/add", post(address::add))
        .route("/update/{id}", patch(address::update))
        .route("/delete/{id}", delete(address::delete))
}

/// Create all `/api` routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/user", user_routes())
        .nest("/address", address_routes())
        .layer(api_rate_limiter())
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    }
}

/// Build the complete application: health checks, uploads, `/api`, and the
/// tracing, request-id, CORS and Sentry layers.
pub fn app(state: AppState) -> Router {
    let uploads = ServeDir::new(state.images().dir());
    let cors = cors_layer(state.config().cors_origin.as_deref());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", routes())
        .nest_service("/uploads", uploads)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .layer(cors)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use desh_perfume_core::{Email, Role, UserId};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::tests::test_config;

    fn test_app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/desh_storefront_test")
            .unwrap();
        app(AppState::new(test_config(), pool))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.10")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_sets_request_id() {
        let response = test_app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_protected_route_without_token() {
        let response = test_app()
            .oneshot(get_request("/api/address/get"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "No token provided");
    }

    #[tokio::test]
    async fn test_out_of_range_rating_is_bad_request() {
        let config = test_config();
        let signer = crate::services::TokenSigner::new(&config.jwt_secret, config.token_ttl);
        let now = chrono::Utc::now();
        let token = signer
            .issue(&crate::models::User {
                id: UserId::new(1),
                name: "Shopper".to_owned(),
                email: Email::parse("shopper@example.com").unwrap(),
                role: Role::User,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        for body in [r#"{"value":300}"#, r#"{"value":4.5}"#, r#"{"value":0}"#] {
            let request = Request::builder()
                .method("POST")
                .uri("/api/products/1/rating")
                .header("x-forwarded-for", "203.0.113.12")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(body))
                .unwrap();
            let response = test_app().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["message"], "Rating must be between 1 and 5");
        }
    }

    #[tokio::test]
    async fn test_admin_route_without_token() {
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/products/1")
            .header("x-forwarded-for", "203.0.113.11")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
