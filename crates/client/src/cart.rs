//! The shopping cart.
//!
//! A cart holds normalized lines: a product reference, a size label and a
//! quantity. Prices and names are never copied into the cart; they are
//! resolved against the current [`InventorySnapshot`] whenever a total is
//! computed, so the cart cannot show a stale price.
//!
//! Every successful mutation is written to durable storage before it becomes
//! visible. A mutation that fails (a stock rejection or a storage error)
//! leaves both the in-memory lines and the stored blob untouched.

use desh_perfume_core::{Price, Product, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::InventorySnapshot;
use crate::storage::{SharedStore, StorageError, keys};

/// One `(product, size)` entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: u32,
}

impl CartLine {
    fn is(&self, product_id: ProductId, size: &str) -> bool {
        self.product_id == product_id && self.size == size
    }
}

/// Errors raised by cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product {product_id} has no size {size}")]
    UnknownSize { product_id: ProductId, size: String },

    #[error("product {product_id} size {size} is sold out")]
    SoldOut { product_id: ProductId, size: String },

    #[error("insufficient stock for product {product_id} size {size}: {available} more available")]
    InsufficientStock {
        product_id: ProductId,
        size: String,
        available: u32,
    },

    #[error("product {product_id} size {size} is not in the cart")]
    NotInCart { product_id: ProductId, size: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CartError {
    /// Whether this is a stock rejection (as opposed to an I/O failure).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }

    /// Short message suitable for a toast.
    #[must_use]
    pub const fn notice(&self) -> &'static str {
        match self {
            Self::UnknownSize { .. } => "Please select a size",
            Self::SoldOut { .. } => "Sold out",
            Self::InsufficientStock { .. } => "Insufficient stock!",
            Self::NotInCart { .. } => "This item is no longer in your cart",
            Self::Storage(_) => "Could not save your cart",
        }
    }
}

/// Cart lines plus the store they persist to.
pub struct CartStore {
    lines: Vec<CartLine>,
    storage: SharedStore,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Load the cart persisted in `storage`.
    ///
    /// A missing or unreadable blob yields an empty cart. Duplicate lines in
    /// a hand-edited blob are merged and zero-quantity lines dropped.
    #[must_use]
    pub fn hydrate(storage: SharedStore) -> Self {
        let lines = load_lines(&storage);
        Self { lines, storage }
    }

    /// Re-read the persisted cart, discarding in-memory state.
    ///
    /// Used when another process sharing the store has written to it; the
    /// last writer wins.
    pub fn reload(&mut self) {
        self.lines = load_lines(&self.storage);
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity of `(product_id, size)` in the cart; zero if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId, size: &str) -> u32 {
        self.lines
            .iter()
            .find(|l| l.is(product_id, size))
            .map_or(0, |l| l.quantity)
    }

    /// Add one unit of `size` of `product`.
    ///
    /// The product's stock for that size is the ceiling: a new line needs at
    /// least one unit in stock, and an existing line can only grow while its
    /// quantity is below the ceiling. Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownSize`], [`CartError::SoldOut`] or
    /// [`CartError::InsufficientStock`] without mutating the cart, or
    /// [`CartError::Storage`] if the new cart cannot be persisted.
    pub fn add_to_cart(&mut self, product: &Product, size: &str) -> Result<u32, CartError> {
        let entry = product.size(size).ok_or_else(|| CartError::UnknownSize {
            product_id: product.id,
            size: size.to_owned(),
        })?;
        let ceiling = entry.quantity;

        let mut next = self.lines.clone();
        let quantity = match next.iter_mut().find(|l| l.is(product.id, size)) {
            Some(line) if line.quantity >= ceiling => {
                return Err(CartError::InsufficientStock {
                    product_id: product.id,
                    size: size.to_owned(),
                    available: 0,
                });
            }
            Some(line) => {
                line.quantity += 1;
                line.quantity
            }
            None if ceiling == 0 => {
                return Err(CartError::SoldOut {
                    product_id: product.id,
                    size: size.to_owned(),
                });
            }
            None => {
                next.push(CartLine {
                    product_id: product.id,
                    size: size.to_owned(),
                    quantity: 1,
                });
                1
            }
        };

        self.commit(next)?;
        Ok(quantity)
    }

    /// Overwrite the quantity of an existing line.
    ///
    /// A quantity of zero removes the line. The quantity is not checked
    /// against stock; callers that need a ceiling go through the stock
    /// reconciler. Updating a line that is not in the cart does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the new cart cannot be persisted.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            self.remove_from_cart(product_id, size)?;
            return Ok(());
        }

        let mut next = self.lines.clone();
        match next.iter_mut().find(|l| l.is(product_id, size)) {
            Some(line) if line.quantity == quantity => Ok(()),
            Some(line) => {
                line.quantity = quantity;
                self.commit(next)
            }
            None => Ok(()),
        }
    }

    /// Remove a line. Returns whether a line was removed; removing an absent
    /// line is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the new cart cannot be persisted.
    pub fn remove_from_cart(&mut self, product_id: ProductId, size: &str) -> Result<bool, CartError> {
        let mut next = self.lines.clone();
        next.retain(|l| !l.is(product_id, size));
        if next.len() == self.lines.len() {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the empty cart cannot be persisted.
    pub fn clear_cart(&mut self) -> Result<(), CartError> {
        self.commit(Vec::new())
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of `unit price * quantity`, with prices taken from `snapshot`.
    ///
    /// Lines whose product or size is missing from the snapshot contribute
    /// zero.
    #[must_use]
    pub fn total_price(&self, snapshot: &InventorySnapshot) -> Price {
        self.lines
            .iter()
            .map(|l| {
                snapshot
                    .price_of(l.product_id, &l.size)
                    .unwrap_or(Price::ZERO)
                    .times(l.quantity)
            })
            .sum()
    }

    fn commit(&mut self, next: Vec<CartLine>) -> Result<(), CartError> {
        let blob = serde_json::to_string(&next).map_err(|source| StorageError::Serialize {
            key: keys::CART.to_owned(),
            source,
        })?;
        self.storage.set(keys::CART, &blob)?;
        self.lines = next;
        Ok(())
    }
}

fn load_lines(storage: &SharedStore) -> Vec<CartLine> {
    let blob = match storage.get(keys::CART) {
        Ok(Some(blob)) => blob,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored cart, starting empty");
            return Vec::new();
        }
    };

    let stored: Vec<CartLine> = match serde_json::from_str(&blob) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!(error = %e, "Stored cart is corrupt, starting empty");
            return Vec::new();
        }
    };

    let mut lines: Vec<CartLine> = Vec::with_capacity(stored.len());
    for line in stored.into_iter().filter(|l| l.quantity > 0) {
        match lines.iter_mut().find(|l| l.is(line.product_id, &line.size)) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => lines.push(line),
        }
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::inventory::tests::product;
    use crate::storage::{KeyValueStore, MemoryStore};

    /// A store whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn id(n: i32) -> ProductId {
        ProductId::new(n)
    }

    #[test]
    fn test_add_new_line_and_increment() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let p = product(1, &[("50ml", 500, 3)]);

        assert_eq!(cart.add_to_cart(&p, "50ml").unwrap(), 1);
        assert_eq!(cart.add_to_cart(&p, "50ml").unwrap(), 2);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(id(1), "50ml"), 2);
    }

    #[test]
    fn test_add_rejects_at_ceiling() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let p = product(1, &[("50ml", 500, 2)]);

        cart.add_to_cart(&p, "50ml").unwrap();
        cart.add_to_cart(&p, "50ml").unwrap();
        let err = cart.add_to_cart(&p, "50ml").unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { .. }));
        assert_eq!(err.notice(), "Insufficient stock!");
        assert_eq!(cart.quantity_of(id(1), "50ml"), 2);
    }

    #[test]
    fn test_add_rejects_sold_out_and_unknown_size() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let p = product(1, &[("50ml", 500, 0)]);

        assert!(matches!(
            cart.add_to_cart(&p, "50ml"),
            Err(CartError::SoldOut { .. })
        ));
        assert!(matches!(
            cart.add_to_cart(&p, "10ml"),
            Err(CartError::UnknownSize { .. })
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_same_product_different_sizes_are_separate_lines() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let p = product(1, &[("50ml", 500, 3), ("100ml", 900, 3)]);

        cart.add_to_cart(&p, "50ml").unwrap();
        cart.add_to_cart(&p, "100ml").unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.total_count(), 2);
    }

    #[test]
    fn test_update_quantity_zero_removes_line() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let p = product(1, &[("50ml", 500, 3)]);
        cart.add_to_cart(&p, "50ml").unwrap();

        cart.update_quantity(id(1), "50ml", 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_does_not_clamp() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let p = product(1, &[("50ml", 500, 3)]);
        cart.add_to_cart(&p, "50ml").unwrap();

        cart.update_quantity(id(1), "50ml", 10).unwrap();
        assert_eq!(cart.quantity_of(id(1), "50ml"), 10);
    }

    #[test]
    fn test_update_quantity_moves_total_by_price_times_delta() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let a = product(1, &[("50ml", 500, 3)]);
        let b = product(2, &[("100ml", 900, 3)]);
        cart.add_to_cart(&a, "50ml").unwrap();
        cart.add_to_cart(&b, "100ml").unwrap();
        let snapshot = InventorySnapshot::new(vec![a, b]);
        let before = cart.total_price(&snapshot);
        assert_eq!(before, Price::from_taka(1400));

        cart.update_quantity(id(1), "50ml", 4).unwrap();
        assert_eq!(cart.total_price(&snapshot), before + Price::from_taka(500).times(3));

        cart.update_quantity(id(1), "50ml", 2).unwrap();
        assert_eq!(cart.total_price(&snapshot), Price::from_taka(1900));
    }

    #[test]
    fn test_update_missing_line_is_noop() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        cart.update_quantity(id(9), "50ml", 4).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let p = product(1, &[("50ml", 500, 3)]);
        cart.add_to_cart(&p, "50ml").unwrap();

        assert!(cart.remove_from_cart(id(1), "50ml").unwrap());
        assert!(!cart.remove_from_cart(id(1), "50ml").unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals_resolve_prices_from_snapshot() {
        let mut cart = CartStore::hydrate(MemoryStore::shared());
        let a = product(1, &[("50ml", 500, 5)]);
        let b = product(2, &[("100ml", 900, 5)]);
        cart.add_to_cart(&a, "50ml").unwrap();
        cart.add_to_cart(&a, "50ml").unwrap();
        cart.add_to_cart(&b, "100ml").unwrap();

        let snapshot = InventorySnapshot::new(vec![a, b.clone()]);
        assert_eq!(cart.total_count(), 3);
        assert_eq!(cart.total_price(&snapshot), Price::from_taka(1900));

        // Repricing shows up without touching the cart
        let mut repriced = b;
        repriced.sizes[0].price = Price::from_taka(1000);
        let snapshot = InventorySnapshot::new(vec![repriced]);
        assert_eq!(cart.total_price(&snapshot), Price::from_taka(1000));
    }

    #[test]
    fn test_cart_survives_rehydration() {
        let storage = MemoryStore::shared();
        let p = product(1, &[("50ml", 500, 3)]);
        {
            let mut cart = CartStore::hydrate(Arc::clone(&storage));
            cart.add_to_cart(&p, "50ml").unwrap();
            cart.add_to_cart(&p, "50ml").unwrap();
        }
        let cart = CartStore::hydrate(storage);
        assert_eq!(cart.quantity_of(id(1), "50ml"), 2);
    }

    #[test]
    fn test_corrupt_blob_hydrates_empty() {
        let storage = MemoryStore::shared();
        storage.set(keys::CART, "{not json").unwrap();
        let cart = CartStore::hydrate(storage);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_hydrate_merges_duplicate_lines() {
        let storage = MemoryStore::shared();
        storage
            .set(
                keys::CART,
                r#"[{"productId":1,"size":"50ml","quantity":1},
                    {"productId":1,"size":"50ml","quantity":2},
                    {"productId":2,"size":"50ml","quantity":0}]"#,
            )
            .unwrap();
        let cart = CartStore::hydrate(storage);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(id(1), "50ml"), 3);
    }

    #[test]
    fn test_storage_failure_leaves_cart_unchanged() {
        let flaky = Arc::new(FlakyStore::default());
        let storage: SharedStore = flaky.clone();
        let mut cart = CartStore::hydrate(storage);
        let p = product(1, &[("50ml", 500, 3)]);
        cart.add_to_cart(&p, "50ml").unwrap();

        flaky
            .fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = cart.add_to_cart(&p, "50ml").unwrap_err();
        assert!(!err.is_rejection());
        assert_eq!(cart.quantity_of(id(1), "50ml"), 1);
    }

    #[test]
    fn test_reload_picks_up_other_writer() {
        let storage = MemoryStore::shared();
        let p = product(1, &[("50ml", 500, 3)]);
        let mut ours = CartStore::hydrate(Arc::clone(&storage));
        let mut theirs = CartStore::hydrate(Arc::clone(&storage));

        theirs.add_to_cart(&p, "50ml").unwrap();
        assert!(ours.is_empty());
        ours.reload();
        assert_eq!(ours.quantity_of(id(1), "50ml"), 1);
    }
}
