//! Shipping address orchestration.
//!
//! The server owns the address; the manager only caches the last copy it
//! received. Local state changes only when the server answers, so a failed
//! call leaves the cached address as it was.

use std::future::Future;

use desh_perfume_core::{Address, AddressId, AddressPatch, NewAddress};
use tracing::instrument;

use crate::api::ApiError;
use crate::error::ClientError;

/// Address endpoints, all requiring a bearer token.
pub trait AddressApi: Send + Sync {
    /// The caller's saved address, or `None` if they have not saved one.
    fn fetch_address(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<Address>, ApiError>> + Send;

    fn create_address(
        &self,
        token: &str,
        address: &NewAddress,
    ) -> impl Future<Output = Result<Address, ApiError>> + Send;

    fn update_address(
        &self,
        token: &str,
        id: AddressId,
        patch: &AddressPatch,
    ) -> impl Future<Output = Result<Address, ApiError>> + Send;

    fn delete_address(
        &self,
        token: &str,
        id: AddressId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Cached copy of the signed-in user's single address.
#[derive(Debug, Default)]
pub struct AddressManager {
    current: Option<Address>,
}

impl AddressManager {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// The last address the server returned.
    #[must_use]
    pub const fn current(&self) -> Option<&Address> {
        self.current.as_ref()
    }

    /// Fetch the saved address, replacing the cached copy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the request fails.
    #[instrument(skip_all)]
    pub async fn load<A: AddressApi>(
        &mut self,
        api: &A,
        token: &str,
    ) -> Result<Option<&Address>, ClientError> {
        self.current = api.fetch_address(token).await?;
        Ok(self.current.as_ref())
    }

    /// Save `address`: create it if none is cached, otherwise overwrite
    /// every field of the cached one.
    ///
    /// The address is validated locally before any request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Address`] for invalid input, or
    /// [`ClientError::Api`] if the request fails.
    #[instrument(skip_all)]
    pub async fn save<A: AddressApi>(
        &mut self,
        api: &A,
        token: &str,
        address: NewAddress,
    ) -> Result<&Address, ClientError> {
        address.validate()?;

        let saved = match &self.current {
            None => api.create_address(token, &address).await?,
            Some(existing) => {
                let patch = AddressPatch {
                    country: Some(address.country),
                    state: Some(address.state),
                    city: Some(address.city),
                    zip_code: Some(address.zip_code),
                    phone_number: Some(address.phone_number),
                };
                api.update_address(token, existing.id, &patch).await?
            }
        };
        tracing::info!(address_id = %saved.id, "Address saved");
        Ok(self.current.insert(saved))
    }

    /// Apply a partial update to the cached address.
    ///
    /// The merged address is validated locally first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoAddress`] if nothing is cached,
    /// [`ClientError::Address`] for an invalid merge, or
    /// [`ClientError::Api`] if the request fails.
    #[instrument(skip_all)]
    pub async fn update<A: AddressApi>(
        &mut self,
        api: &A,
        token: &str,
        patch: AddressPatch,
    ) -> Result<&Address, ClientError> {
        let existing = self.current.as_ref().ok_or(ClientError::NoAddress)?;
        let mut preview = existing.clone();
        patch.apply_to(&mut preview)?;

        let saved = api.update_address(token, existing.id, &patch).await?;
        Ok(self.current.insert(saved))
    }

    /// Delete the cached address on the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoAddress`] if nothing is cached, or
    /// [`ClientError::Api`] if the request fails.
    #[instrument(skip_all)]
    pub async fn delete<A: AddressApi>(&mut self, api: &A, token: &str) -> Result<(), ClientError> {
        let id = self.current.as_ref().ok_or(ClientError::NoAddress)?.id;
        api.delete_address(token, id).await?;
        self.current = None;
        Ok(())
    }

    /// Forget the cached address (on logout).
    pub fn clear(&mut self) {
        self.current = None;
    }
}
