//! Top-level client error.

use desh_perfume_core::{AddressError, ProductId, RatingError};
use thiserror::Error;

use crate::api::ApiError;
use crate::cart::CartError;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Any failure surfaced by the shop context.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Rating(#[from] RatingError),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotAuthenticated,

    /// An address operation needs a saved address.
    #[error("no saved address")]
    NoAddress,

    /// The product is not in the current inventory snapshot.
    #[error("product {0} is not in the catalog")]
    UnknownProduct(ProductId),
}

impl ClientError {
    /// Whether the server rejected the session token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_unauthorized())
    }

    /// Short message suitable for a toast.
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Cart(e) => e.notice().to_owned(),
            Self::Api(ApiError::Unauthorized(_)) | Self::Session(_) | Self::NotAuthenticated => {
                "Please log in again".to_owned()
            }
            Self::Api(ApiError::Validation(_) | ApiError::Rejected { .. }) => self.to_string(),
            Self::Api(_) | Self::Storage(_) => "Something went wrong. Please try again.".to_owned(),
            Self::Address(e) => e.to_string(),
            Self::Rating(e) => e.to_string(),
            Self::NoAddress => "Please add a shipping address".to_owned(),
            Self::UnknownProduct(_) => "This product is no longer available".to_owned(),
        }
    }
}
