//! HTTP middleware and extractors for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS
//! 3. `TraceLayer` (`http_request` span per request)
//! 4. Request ID (record `x-request-id` on the span and response)
//! 5. Rate limiting (governor), per client IP
//!
//! Authentication is not a layer: handlers ask for [`RequireAuth`] or
//! [`RequireAdmin`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{RequireAdmin, RequireAuth};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
