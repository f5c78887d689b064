//! Helpers for end-to-end tests against a running storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p desh-perfume-cli -- migrate
//! cargo run -p desh-perfume-storefront &
//! cargo test -p desh-perfume-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_API_URL` points the tests at another server
//! (default `http://localhost:5000/api`).

use std::sync::Arc;
use std::time::Duration;

use url::Url;
use uuid::Uuid;

use desh_perfume_client::{ApiClient, MemoryStore, ShippingPolicy, ShopContext};
use desh_perfume_core::SignupRequest;

/// Password that satisfies the signup strength rules.
pub const PASSWORD: &str = "Attar#2026";

/// Base URL of the API under test.
///
/// # Panics
///
/// Panics if `STOREFRONT_API_URL` is not a valid URL.
#[must_use]
pub fn api_base_url() -> Url {
    let raw = std::env::var("STOREFRONT_API_URL")
        .unwrap_or_else(|_| "http://localhost:5000/api".to_owned());
    Url::parse(&raw).expect("STOREFRONT_API_URL must be a valid URL")
}

/// Server root (the API URL without its `/api` suffix), for `/health`.
#[must_use]
pub fn server_root() -> String {
    api_base_url()
        .as_str()
        .trim_end_matches('/')
        .trim_end_matches("/api")
        .to_owned()
}

/// An email no other test run has used.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

/// Signup body for a fresh account.
#[must_use]
pub fn signup_request(email: &str) -> SignupRequest {
    SignupRequest {
        name: "Integration Tester".to_owned(),
        email: email.to_owned(),
        password: PASSWORD.to_owned(),
        confirm_password: PASSWORD.to_owned(),
    }
}

/// A client context with in-memory storage.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn shop() -> ShopContext<ApiClient> {
    let api = ApiClient::new(api_base_url()).expect("Failed to build API client");
    ShopContext::new(
        Arc::new(api),
        MemoryStore::shared(),
        Duration::from_secs(60),
        ShippingPolicy::default(),
    )
}
