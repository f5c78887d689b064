//! Desh Perfume Client - cart, checkout and session logic for storefront
//! clients.
//!
//! Everything a shopper-facing UI needs between rendering and the REST API:
//! - [`cart`] - Size-level cart lines persisted across restarts
//! - [`reconciler`] - Stock checks against the cart and fresh inventory
//! - [`checkout`] - Subtotal, shipping and total for the current cart
//! - [`address`] - The signed-in user's single shipping address
//! - [`session`] - JWT session with automatic expiry
//! - [`context`] - [`ShopContext`], which wires all of the above together
//!
//! # Example
//!
//! ```rust,ignore
//! use desh_perfume_client::{ClientConfig, ShopContext};
//!
//! let config = ClientConfig::from_env()?;
//! let mut shop = ShopContext::from_config(&config)?;
//! shop.add_to_cart(product_id, "50ml").await?;
//! let summary = shop.checkout_summary().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod context;
pub mod error;
pub mod inventory;
pub mod reconciler;
pub mod session;
pub mod storage;
pub mod theme;

pub use address::{AddressApi, AddressManager};
pub use api::{AccountApi, ApiClient, ApiError};
pub use cart::{CartError, CartLine, CartStore};
pub use catalog::{CatalogPage, CatalogQuery, SortOrder};
pub use checkout::{CheckoutAggregator, CheckoutSummary, PaymentMethod, ShippingPolicy};
pub use config::{ClientConfig, ConfigError};
pub use context::ShopContext;
pub use error::ClientError;
pub use inventory::{InventoryCache, InventorySnapshot, InventorySource};
pub use session::{Session, SessionError};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore, StorageError};
pub use theme::{Theme, ThemeStore};
