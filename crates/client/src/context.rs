//! The shop context: every client component, explicitly wired together.
//!
//! A [`ShopContext`] is built once per client, hydrating the cart, session
//! and theme from durable storage. Components never reach for globals; the
//! embedding application holds the context and calls into it.
//!
//! Any call that comes back `401 Unauthorized` ends the session on the spot
//! (token, cart and cached address are cleared) before the error is
//! returned.

use std::sync::Arc;
use std::time::Duration;

use desh_perfume_core::{
    Address, AddressPatch, LoginRequest, NewAddress, Product, ProductId, PublicUser, RatingValue,
    SignupRequest, TokenClaims,
};
use tracing::instrument;

use crate::address::{AddressApi, AddressManager};
use crate::api::{AccountApi, ApiClient};
use crate::cart::CartStore;
use crate::catalog::{CatalogPage, CatalogQuery};
use crate::checkout::{CheckoutAggregator, CheckoutSummary, PaymentMethod, ShippingPolicy};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::inventory::{InventoryCache, InventorySnapshot, InventorySource};
use crate::reconciler;
use crate::session::Session;
use crate::storage::{FileStore, SharedStore};
use crate::theme::{Theme, ThemeStore};

/// Everything a shop client needs, wired to one API and one store.
pub struct ShopContext<A> {
    api: Arc<A>,
    inventory: InventoryCache<A>,
    cart: CartStore,
    session: Session,
    theme: ThemeStore,
    addresses: AddressManager,
    checkout: CheckoutAggregator,
    payment_method: PaymentMethod,
}

impl<A> std::fmt::Debug for ShopContext<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopContext")
            .field("cart", &self.cart)
            .field("session", &self.session)
            .field("theme", &self.theme)
            .field("address", &self.addresses)
            .field("payment_method", &self.payment_method)
            .finish_non_exhaustive()
    }
}

impl ShopContext<ApiClient> {
    /// Build a context talking HTTP and persisting to the configured
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the storage
    /// directory cannot be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let api = Arc::new(ApiClient::new(config.api_url.clone())?);
        let storage: SharedStore = Arc::new(FileStore::open(&config.storage_dir)?);
        Ok(Self::new(
            api,
            storage,
            config.catalog_ttl,
            config.shipping_policy(),
        ))
    }
}

impl<A> ShopContext<A>
where
    A: InventorySource + AddressApi + AccountApi,
{
    /// Wire the components and hydrate them from `storage`.
    #[must_use]
    pub fn new(
        api: Arc<A>,
        storage: SharedStore,
        catalog_ttl: Duration,
        policy: ShippingPolicy,
    ) -> Self {
        Self {
            inventory: InventoryCache::new(Arc::clone(&api), catalog_ttl),
            api,
            cart: CartStore::hydrate(Arc::clone(&storage)),
            session: Session::hydrate(Arc::clone(&storage)),
            theme: ThemeStore::hydrate(storage),
            addresses: AddressManager::new(),
            checkout: CheckoutAggregator::new(policy),
            payment_method: PaymentMethod::default(),
        }
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn theme(&self) -> Theme {
        self.theme.current()
    }

    #[must_use]
    pub const fn address(&self) -> Option<&Address> {
        self.addresses.current()
    }

    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    #[must_use]
    pub const fn inventory(&self) -> &InventoryCache<A> {
        &self.inventory
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    /// The shared inventory snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if no snapshot is cached and the fetch fails.
    pub async fn snapshot(&self) -> Result<Arc<InventorySnapshot>, ClientError> {
        Ok(self.inventory.get_cached().await?)
    }

    /// Re-fetch the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the old snapshot stays cached.
    pub async fn refresh_inventory(&self) -> Result<Arc<InventorySnapshot>, ClientError> {
        Ok(self.inventory.refresh().await?)
    }

    /// Search, filter, sort and paginate the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be fetched.
    pub async fn catalog(&self, query: &CatalogQuery) -> Result<CatalogPage, ClientError> {
        let snapshot = self.snapshot().await?;
        Ok(query.apply(snapshot.products()))
    }

    /// Category names for the catalog filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    pub async fn categories(&self) -> Result<Arc<Vec<String>>, ClientError> {
        Ok(self.inventory.categories().await?)
    }

    /// Size labels for the catalog filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    pub async fn sizes(&self) -> Result<Arc<Vec<String>>, ClientError> {
        Ok(self.inventory.sizes().await?)
    }

    // -------------------------------------------------------------------------
    // Account
    // -------------------------------------------------------------------------

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] (field errors arrive as
    /// `ApiError::Validation`) or [`ClientError::Session`].
    #[instrument(skip_all)]
    pub async fn signup(&mut self, request: &SignupRequest) -> Result<PublicUser, ClientError> {
        let response = self.api.signup(request).await?;
        self.start_session(response.token).await?;
        Ok(response.user)
    }

    /// Sign in and load the saved address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] for bad credentials or
    /// [`ClientError::Session`] if the issued token is unusable.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let response = self.api.login(&request).await?;
        self.start_session(response.token).await?;
        Ok(response.user)
    }

    async fn start_session(&mut self, token: String) -> Result<TokenClaims, ClientError> {
        let claims = self.session.login(token)?;
        if let Err(e) = self.load_address().await {
            tracing::warn!(error = %e, "Failed to load address after login");
        }
        Ok(claims)
    }

    /// End the session and clear the cart and cached address.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the token or the empty cart cannot be persisted.
    pub fn logout(&mut self) -> Result<(), ClientError> {
        let session = self.session.logout();
        let cart = self.cart.clear_cart();
        self.addresses.clear();
        tracing::info!("Logged out");
        session?;
        cart?;
        Ok(())
    }

    fn token(&self) -> Result<String, ClientError> {
        self.session.token().ok_or(ClientError::NotAuthenticated)
    }

    /// Tear the session down if `result` carries a 401.
    fn guard<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result
            && e.is_unauthorized()
        {
            tracing::warn!(error = %e, "Session rejected by server, logging out");
            if let Err(teardown) = self.logout() {
                tracing::warn!(error = %teardown, "Session teardown incomplete");
            }
        }
        result
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    /// Add one unit from the catalog, gated by the cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownProduct`] if the product is not in the
    /// snapshot, or a [`ClientError::Cart`] rejection.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&mut self, product_id: ProductId, size: &str) -> Result<u32, ClientError> {
        let snapshot = self.snapshot().await?;
        let product = snapshot
            .product(product_id)
            .ok_or(ClientError::UnknownProduct(product_id))?;

        match self.cart.add_to_cart(product, size) {
            Ok(quantity) => Ok(quantity),
            Err(e) if e.is_rejection() => {
                tracing::info!(error = %e, "Add to cart rejected");
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save cart");
                Err(e.into())
            }
        }
    }

    /// Checkout "+": add one unit after a fresh stock check.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError::Cart`] rejection or a [`ClientError::Api`]
    /// failure; the cart is unchanged in both cases.
    pub async fn increment(&mut self, product_id: ProductId, size: &str) -> Result<u32, ClientError> {
        let result =
            reconciler::increment_checked(&mut self.cart, &*self.api, product_id, size).await;
        self.guard(result)
    }

    /// Checkout "-": remove one unit, never below one.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn decrement(&mut self, product_id: ProductId, size: &str) -> Result<u32, ClientError> {
        Ok(reconciler::decrement(&mut self.cart, product_id, size)?)
    }

    /// Overwrite a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), ClientError> {
        Ok(self.cart.update_quantity(product_id, size, quantity)?)
    }

    /// Remove a line; removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn remove_from_cart(&mut self, product_id: ProductId, size: &str) -> Result<bool, ClientError> {
        Ok(self.cart.remove_from_cart(product_id, size)?)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn clear_cart(&mut self) -> Result<(), ClientError> {
        Ok(self.cart.clear_cart()?)
    }

    /// Stock left to add for a size, per the cached snapshot. May be
    /// negative; callers treat anything `<= 0` as "cannot add more".
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be fetched.
    pub async fn effective_stock(&self, product_id: ProductId, size: &str) -> Result<i64, ClientError> {
        let snapshot = self.snapshot().await?;
        Ok(reconciler::effective_stock(&snapshot, &self.cart, product_id, size))
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    pub const fn select_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    /// Order summary for the current cart and address.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be fetched.
    pub async fn checkout_summary(&self) -> Result<CheckoutSummary, ClientError> {
        let snapshot = self.snapshot().await?;
        Ok(self.checkout.summarize(
            &self.cart,
            &snapshot,
            self.addresses.current(),
            self.payment_method,
        ))
    }

    // -------------------------------------------------------------------------
    // Ratings
    // -------------------------------------------------------------------------

    /// Rate a product from 1 to 5 stars.
    ///
    /// The catalog is refreshed afterwards so the new average shows
    /// everywhere. If that refresh fails the cached catalog is dropped, so
    /// the next read fetches it again instead of serving the old average.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rating`] for an out-of-range value,
    /// [`ClientError::NotAuthenticated`] without a session, or
    /// [`ClientError::Api`] if the request fails.
    #[instrument(skip(self))]
    pub async fn rate(&mut self, product_id: ProductId, value: u8) -> Result<Product, ClientError> {
        let value = RatingValue::try_from(value)?;
        let token = self.token()?;
        let result = self
            .api
            .rate_product(&token, product_id, value)
            .await
            .map_err(ClientError::from);
        let product = self.guard(result)?;

        if let Err(e) = self.inventory.refresh().await {
            tracing::warn!(error = %e, "Failed to refresh inventory after rating");
            self.inventory.invalidate();
        }
        Ok(product)
    }

    // -------------------------------------------------------------------------
    // Address
    // -------------------------------------------------------------------------

    /// Fetch the saved address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] or [`ClientError::Api`].
    pub async fn load_address(&mut self) -> Result<Option<Address>, ClientError> {
        let token = self.token()?;
        let result = self
            .addresses
            .load(&*self.api, &token)
            .await
            .map(|a| a.cloned());
        self.guard(result)
    }

    /// Create or overwrite the saved address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Address`] for invalid input,
    /// [`ClientError::NotAuthenticated`] or [`ClientError::Api`].
    pub async fn save_address(&mut self, address: NewAddress) -> Result<Address, ClientError> {
        let token = self.token()?;
        let result = self
            .addresses
            .save(&*self.api, &token, address)
            .await
            .cloned();
        self.guard(result)
    }

    /// Update some fields of the saved address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoAddress`], [`ClientError::Address`],
    /// [`ClientError::NotAuthenticated`] or [`ClientError::Api`].
    pub async fn update_address(&mut self, patch: AddressPatch) -> Result<Address, ClientError> {
        let token = self.token()?;
        let result = self
            .addresses
            .update(&*self.api, &token, patch)
            .await
            .cloned();
        self.guard(result)
    }

    /// Delete the saved address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoAddress`], [`ClientError::NotAuthenticated`]
    /// or [`ClientError::Api`].
    pub async fn delete_address(&mut self) -> Result<(), ClientError> {
        let token = self.token()?;
        let result = self.addresses.delete(&*self.api, &token).await;
        self.guard(result)
    }

    // -------------------------------------------------------------------------
    // Theme
    // -------------------------------------------------------------------------

    /// Switch between light and dark.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be persisted.
    pub fn toggle_theme(&mut self) -> Result<Theme, ClientError> {
        Ok(self.theme.toggle()?)
    }
}
