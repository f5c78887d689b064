//! Account route handlers.
//!
//! Signup and login are public (and rate limited); reading a user requires a
//! token for that user or an admin token.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use desh_perfume_core::{AuthResponse, LoginRequest, PublicUser, SignupRequest, UserId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::AuthService;
use crate::state::AppState;

/// `POST /user/signup`
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let auth = AuthService::new(state.pool(), state.signer());
    let response = auth.signup(&request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /user/login`
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let auth = AuthService::new(state.pool(), state.signer());
    Ok(Json(auth.login(&request).await?))
}

/// `GET /user/{id}`
#[instrument(skip(state, claims), fields(caller = %claims.id))]
pub async fn get_user(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<PublicUser>> {
    if claims.id != id && !claims.role.is_admin() {
        return Err(AppError::Forbidden("Access denied".to_owned()));
    }
    let auth = AuthService::new(state.pool(), state.signer());
    let user = auth.get_user(id).await?;
    Ok(Json(user.to_public()))
}
