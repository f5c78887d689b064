//! Order summary shown at checkout.
//!
//! The summary is a pure function of the cart, the inventory snapshot and
//! the selected address, so it can be recomputed on every change.

use core::fmt;

use desh_perfume_core::{Address, FREE_SHIPPING_STATE, Price, ProductId};
use serde::{Deserialize, Serialize};

use crate::cart::CartStore;
use crate::inventory::InventorySnapshot;

/// Default flat delivery charge outside the free-shipping division.
pub const DEFAULT_FLAT_FEE: u32 = 100;

/// How shipping is charged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Charge for a non-empty cart outside `free_state`.
    pub flat_fee: Price,
    /// Division that ships for free.
    pub free_state: String,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Price::from_taka(DEFAULT_FLAT_FEE),
            free_state: FREE_SHIPPING_STATE.to_owned(),
        }
    }
}

impl ShippingPolicy {
    /// Whether `address` is in this policy's free-shipping division.
    #[must_use]
    pub fn ships_free(&self, address: &Address) -> bool {
        address.state == self.free_state
    }

    /// Shipping for a cart with `has_items`, delivered to `address`.
    ///
    /// Free when the address is in the free-shipping division. Otherwise a
    /// non-empty cart pays the flat fee, with or without an address.
    #[must_use]
    pub fn shipping_for(&self, has_items: bool, address: Option<&Address>) -> Price {
        if address.is_some_and(|a| self.ships_free(a)) {
            return Price::ZERO;
        }
        if has_items { self.flat_fee } else { Price::ZERO }
    }
}

/// How the customer intends to pay. Recorded for display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "COD")]
    CashOnDelivery,
    Bkash,
    Card,
}

impl PaymentMethod {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on Delivery",
            Self::Bkash => "bKash",
            Self::Card => "Card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One priced line of the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub product_id: ProductId,
    /// Product name, or `None` if the product is gone from the catalog.
    pub name: Option<String>,
    pub size: String,
    pub quantity: u32,
    /// Zero when the product or size is gone from the catalog.
    pub unit_price: Price,
    pub line_total: Price,
}

/// Totals for the checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub lines: Vec<SummaryLine>,
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
    pub payment_method: PaymentMethod,
}

impl CheckoutSummary {
    /// Whether there is nothing to order.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Builds [`CheckoutSummary`] values under a [`ShippingPolicy`].
#[derive(Debug, Clone, Default)]
pub struct CheckoutAggregator {
    policy: ShippingPolicy,
}

impl CheckoutAggregator {
    #[must_use]
    pub const fn new(policy: ShippingPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &ShippingPolicy {
        &self.policy
    }

    /// Compute the summary.
    ///
    /// The subtotal always equals [`CartStore::total_price`] for the same
    /// snapshot.
    #[must_use]
    pub fn summarize(
        &self,
        cart: &CartStore,
        snapshot: &InventorySnapshot,
        address: Option<&Address>,
        payment_method: PaymentMethod,
    ) -> CheckoutSummary {
        let lines: Vec<SummaryLine> = cart
            .lines()
            .iter()
            .map(|line| {
                let product = snapshot.product(line.product_id);
                let unit_price = product
                    .and_then(|p| p.price_of(&line.size))
                    .unwrap_or(Price::ZERO);
                SummaryLine {
                    product_id: line.product_id,
                    name: product.map(|p| p.name.clone()),
                    size: line.size.clone(),
                    quantity: line.quantity,
                    unit_price,
                    line_total: unit_price.times(line.quantity),
                }
            })
            .collect();

        let subtotal = cart.total_price(snapshot);
        let shipping = self.policy.shipping_for(!lines.is_empty(), address);

        CheckoutSummary {
            lines,
            subtotal,
            shipping,
            total: subtotal + shipping,
            payment_method,
        }
    }
}
