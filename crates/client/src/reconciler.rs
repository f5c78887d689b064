//! Stock reconciliation between the cached catalog and the cart.
//!
//! The catalog snapshot may be stale, so two checks exist. Display uses
//! [`effective_stock`], computed from the snapshot. Raising the quantity of
//! a line already in the cart uses [`increment_checked`], which re-reads the
//! product from the server first.

use desh_perfume_core::{Product, ProductId};
use tracing::instrument;

use crate::cart::{CartError, CartStore};
use crate::error::ClientError;
use crate::inventory::{InventorySnapshot, InventorySource};

/// Snapshot stock minus what the cart already holds.
///
/// Negative when the cart holds more than the snapshot reports, which
/// happens after stock drops under an existing line.
#[must_use]
pub fn effective_stock(
    snapshot: &InventorySnapshot,
    cart: &CartStore,
    product_id: ProductId,
    size: &str,
) -> i64 {
    i64::from(snapshot.stock_of(product_id, size)) - i64::from(cart.quantity_of(product_id, size))
}

/// Units that can still be added; [`effective_stock`] floored at zero.
#[must_use]
pub fn available_to_add(
    snapshot: &InventorySnapshot,
    cart: &CartStore,
    product_id: ProductId,
    size: &str,
) -> u32 {
    u32::try_from(effective_stock(snapshot, cart, product_id, size).max(0)).unwrap_or(u32::MAX)
}

/// Effective stock for every size of `product`, in the product's size order.
#[must_use]
pub fn stock_by_size(
    snapshot: &InventorySnapshot,
    cart: &CartStore,
    product: &Product,
) -> Vec<(String, i64)> {
    product
        .sizes
        .iter()
        .map(|s| (s.size.clone(), effective_stock(snapshot, cart, product.id, &s.size)))
        .collect()
}

/// Raise the quantity of an existing line by one after re-reading stock.
///
/// The product is fetched fresh from `source`; the increment is accepted
/// only if the new quantity does not exceed the fresh stock. On any failure
/// the cart is left as it was. Returns the new quantity.
///
/// # Errors
///
/// - [`CartError::NotInCart`] if there is no line to raise; use
///   [`CartStore::add_to_cart`] for a first unit.
/// - [`CartError::InsufficientStock`] if the fresh stock is too low.
/// - [`ClientError::Api`] if the fresh read fails; the increment is
///   rejected exactly as if the stock were zero.
#[instrument(skip(cart, source))]
pub async fn increment_checked<S: InventorySource>(
    cart: &mut CartStore,
    source: &S,
    product_id: ProductId,
    size: &str,
) -> Result<u32, ClientError> {
    let current = cart.quantity_of(product_id, size);
    if current == 0 {
        return Err(CartError::NotInCart {
            product_id,
            size: size.to_owned(),
        }
        .into());
    }
    let fresh = source.get_product(product_id).await.map_err(|e| {
        tracing::warn!(error = %e, "Fresh stock read failed, rejecting increment");
        e
    })?;
    let stock = fresh.stock_of(size);

    let next = current.saturating_add(1);
    if next > stock {
        tracing::info!(current, stock, "Increment rejected by fresh stock");
        return Err(CartError::InsufficientStock {
            product_id,
            size: size.to_owned(),
            available: stock.saturating_sub(current),
        }
        .into());
    }

    cart.update_quantity(product_id, size, next)?;
    Ok(next)
}

/// Lower the quantity of a line by one, never below one.
///
/// Returns the resulting quantity; zero if the line is not in the cart.
///
/// # Errors
///
/// Returns [`CartError::Storage`] if the cart cannot be persisted.
pub fn decrement(cart: &mut CartStore, product_id: ProductId, size: &str) -> Result<u32, CartError> {
    let current = cart.quantity_of(product_id, size);
    if current <= 1 {
        return Ok(current);
    }
    cart.update_quantity(product_id, size, current - 1)?;
    Ok(current - 1)
}
