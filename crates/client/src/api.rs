//! HTTP client for the storefront REST API.
//!
//! Uses `reqwest` 0.13 with JSON bodies. Every endpoint is relative to a
//! base URL such as `http://localhost:5000/api/`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use desh_perfume_core::{
    Address, AddressId, AddressPatch, AuthResponse, LoginRequest, MessageResponse, NewAddress,
    Product, ProductId, PublicUser, RatingRequest, RatingValue, SignupRequest, UserId,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::address::AddressApi;
use crate::inventory::InventorySource;

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint path could not be joined onto the base URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// 401: the session token is missing, invalid or expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 403: the session is valid but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// 429 from the rate limiter.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// 400 with per-field messages.
    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(BTreeMap<String, String>),

    /// Any other 4xx.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 5xx.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// Whether this error must end the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error body shapes the server produces.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<BTreeMap<String, String>>,
}

/// Account operations that need the server. Split out so the shop context
/// can be driven by an in-memory fake.
pub trait AccountApi: Send + Sync {
    fn signup(
        &self,
        request: &SignupRequest,
    ) -> impl Future<Output = Result<AuthResponse, ApiError>> + Send;

    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<AuthResponse, ApiError>> + Send;

    /// Rate a product and return it with the new average.
    fn rate_product(
        &self,
        token: &str,
        id: ProductId,
        value: RatingValue,
    ) -> impl Future<Output = Result<Product, ApiError>> + Send;
}

/// Storefront API client.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the API rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(mut base: Url) -> Result<Self, ApiError> {
        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner { client, base }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base.join(path)?)
    }

    /// Send a request and decode a JSON success body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_for_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    /// Fetch a user by id. A user may only read themselves unless admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_user(&self, token: &str, id: UserId) -> Result<PublicUser, ApiError> {
        let url = self.url(&format!("user/{id}"))?;
        self.execute(self.inner.client.get(url).bearer_auth(token))
            .await
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_owned());

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::BAD_REQUEST if parsed.errors.as_ref().is_some_and(|e| !e.is_empty()) => {
            ApiError::Validation(parsed.errors.unwrap_or_default())
        }
        s if s.is_server_error() => ApiError::Server {
            status: s.as_u16(),
            message,
        },
        s => ApiError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

impl InventorySource for ApiClient {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let url = self.url("products")?;
        self.execute(self.inner.client.get(url)).await
    }

    #[instrument(skip(self))]
    async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let url = self.url(&format!("products/{id}"))?;
        self.execute(self.inner.client.get(url)).await
    }

    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let url = self.url("products/categories")?;
        self.execute(self.inner.client.get(url)).await
    }

    async fn sizes(&self) -> Result<Vec<String>, ApiError> {
        let url = self.url("products/sizes")?;
        self.execute(self.inner.client.get(url)).await
    }
}

impl AccountApi for ApiClient {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ApiError> {
        let url = self.url("user/signup")?;
        self.execute(self.inner.client.post(url).json(request)).await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let url = self.url("user/login")?;
        self.execute(self.inner.client.post(url).json(request)).await
    }

    #[instrument(skip(self, token))]
    async fn rate_product(
        &self,
        token: &str,
        id: ProductId,
        value: RatingValue,
    ) -> Result<Product, ApiError> {
        let url = self.url(&format!("products/{id}/rating"))?;
        let body = RatingRequest::new(value);
        self.execute(self.inner.client.post(url).bearer_auth(token).json(&body))
            .await
    }
}

impl AddressApi for ApiClient {
    #[instrument(skip(self, token))]
    async fn fetch_address(&self, token: &str) -> Result<Option<Address>, ApiError> {
        let url = self.url("address/get")?;
        match self
            .execute(self.inner.client.get(url).bearer_auth(token))
            .await
        {
            Ok(address) => Ok(Some(address)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, token, address))]
    async fn create_address(&self, token: &str, address: &NewAddress) -> Result<Address, ApiError> {
        let url = self.url("address/add")?;
        self.execute(self.inner.client.post(url).bearer_auth(token).json(address))
            .await
    }

    #[instrument(skip(self, token, patch))]
    async fn update_address(
        &self,
        token: &str,
        id: AddressId,
        patch: &AddressPatch,
    ) -> Result<Address, ApiError> {
        let url = self.url(&format!("address/update/{id}"))?;
        self.execute(self.inner.client.patch(url).bearer_auth(token).json(patch))
            .await
    }

    #[instrument(skip(self, token))]
    async fn delete_address(&self, token: &str, id: AddressId) -> Result<(), ApiError> {
        let url = self.url(&format!("address/delete/{id}"))?;
        let _: MessageResponse = self
            .execute(self.inner.client.delete(url).bearer_auth(token))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ApiClient::new(Url::parse("http://localhost:5000/api").unwrap()).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5000/api/");
        assert_eq!(
            client.url("products/7").unwrap().as_str(),
            "http://localhost:5000/api/products/7"
        );
    }

    #[test]
    fn test_error_for_status_maps_codes() {
        assert!(
            error_for_status(StatusCode::UNAUTHORIZED, r#"{"message":"Invalid token"}"#)
                .is_unauthorized()
        );
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, ""),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, r#"{"message":"No address found"}"#),
            ApiError::NotFound(m) if m == "No address found"
        ));
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, r#"{"message":"Address already exists"}"#),
            ApiError::Rejected { status: 409, .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, "<html>"),
            ApiError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn test_error_for_status_reads_field_errors() {
        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            r#"{"errors":{"password":"Password is too weak","name":"Name is required"}}"#,
        );
        let ApiError::Validation(fields) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(
            err.to_string(),
            "Validation failed: name: Name is required; password: Password is too weak"
        );
    }

    #[test]
    fn test_plain_bad_request_is_rejected() {
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, r#"{"message":"User already exists"}"#),
            ApiError::Rejected { status: 400, message } if message == "User already exists"
        ));
    }
}
