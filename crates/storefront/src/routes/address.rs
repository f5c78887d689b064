//! Shipping address route handlers.
//!
//! Every route requires a token and only ever touches the caller's own
//! address.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use desh_perfume_core::{Address, AddressError, AddressId, AddressPatch, MessageResponse, NewAddress};

use crate::db::{AddressRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

impl From<AddressError> for AppError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::MissingField(_) => Self::BadRequest("Required fields are missing".to_owned()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

fn trimmed(address: NewAddress) -> NewAddress {
    NewAddress {
        country: address.country.trim().to_owned(),
        state: address.state.trim().to_owned(),
        city: address.city.trim().to_owned(),
        zip_code: address.zip_code.trim().to_owned(),
        phone_number: address.phone_number.trim().to_owned(),
    }
}

fn address_not_found() -> AppError {
    AppError::NotFound("Address not found".to_owned())
}

/// `GET /address/get`
#[instrument(skip(state, claims), fields(user_id = %claims.id))]
pub async fn get(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Address>> {
    AddressRepository::new(state.pool())
        .get_for_user(claims.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No address found".to_owned()))
}

/// `POST /address/add`
#[instrument(skip(state, claims, address), fields(user_id = %claims.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Json(address): Json<NewAddress>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = trimmed(address);
    address.validate()?;

    let saved = AddressRepository::new(state.pool())
        .create(claims.id, &address)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AppError::Conflict("Address already exists".to_owned()),
            other => other.into(),
        })?;

    tracing::info!(address_id = %saved.id, "Address added");
    Ok((StatusCode::CREATED, Json(saved)))
}

/// `PATCH /address/update/{id}`
#[instrument(skip(state, claims, patch), fields(user_id = %claims.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<AddressId>,
    Json(patch): Json<AddressPatch>,
) -> Result<Json<Address>> {
    let repo = AddressRepository::new(state.pool());

    let mut address = repo
        .get_for_user(claims.id)
        .await?
        .filter(|address| address.id == id)
        .ok_or_else(address_not_found)?;

    let patch = AddressPatch {
        country: patch.country.map(|v| v.trim().to_owned()),
        state: patch.state.map(|v| v.trim().to_owned()),
        city: patch.city.map(|v| v.trim().to_owned()),
        zip_code: patch.zip_code.map(|v| v.trim().to_owned()),
        phone_number: patch.phone_number.map(|v| v.trim().to_owned()),
    };
    patch.apply_to(&mut address)?;

    let updated = repo.update(&address).await?.ok_or_else(address_not_found)?;
    Ok(Json(updated))
}

/// `DELETE /address/delete/{id}`
#[instrument(skip(state, claims), fields(user_id = %claims.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<MessageResponse>> {
    if !AddressRepository::new(state.pool()).delete(id, claims.id).await? {
        return Err(address_not_found());
    }
    tracing::info!(address_id = %id, "Address deleted");
    Ok(Json(MessageResponse::new("Address deleted successfully")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err: AppError = AddressError::MissingField("city").into();
        assert!(matches!(&err, AppError::BadRequest(msg) if msg == "Required fields are missing"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_trimmed_input_validates() {
        let address = trimmed(NewAddress {
            country: " Bangladesh ".to_owned(),
            state: "Dhaka ".to_owned(),
            city: " Gazipur".to_owned(),
            zip_code: " 1700 ".to_owned(),
            phone_number: "01711000000 ".to_owned(),
        });
        assert!(address.validate().is_ok());
        assert_eq!(address.zip_code, "1700");
    }

    #[test]
    fn test_region_mismatch_is_bad_request() {
        let address = NewAddress {
            country: "Bangladesh".to_owned(),
            state: "Khulna".to_owned(),
            city: "Gazipur".to_owned(),
            zip_code: "9100".to_owned(),
            phone_number: "01711000000".to_owned(),
        };
        let err: AppError = address.validate().unwrap_err().into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
