//! Authentication extractors.
//!
//! Protected routes read `Authorization: Bearer <token>` and verify it with
//! the state's [`TokenSigner`](crate::services::TokenSigner). Rejections are
//! JSON bodies produced by [`AppError`].

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use desh_perfume_core::TokenClaims;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor that requires a valid session token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(claims): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", claims.email)
/// }
/// ```
pub struct RequireAuth(pub TokenClaims);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("No token provided".to_owned()))?;

        let claims = state.signer().verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::Unauthorized("Invalid or expired token".to_owned())
        })?;

        set_sentry_user(&claims.id, Some(claims.email.as_str()));
        Ok(Self(claims))
    }
}

/// Extractor that requires a valid token carrying the admin role.
pub struct RequireAdmin(pub TokenClaims);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(claims) = RequireAuth::from_request_parts(parts, state).await?;
        if !claims.role.is_admin() {
            tracing::warn!(user_id = %claims.id, path = %parts.uri.path(), "Admin route refused");
            return Err(AppError::Forbidden("Admin access required".to_owned()));
        }
        Ok(Self(claims))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
