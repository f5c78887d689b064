//! Product catalog types.
//!
//! A product is not a single SKU: it is a set of SKUs keyed by size label
//! (`"50ml"`, `"100ml"`, ...), each with its own price and stock count. The
//! server is the only writer; clients hold cached copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ProductId, UserId};
use super::price::Price;

/// Errors raised when validating product input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// The product name is blank.
    #[error("product name is required")]
    MissingName,
    /// The product category is blank.
    #[error("product category is required")]
    MissingCategory,
    /// A size entry has a blank label.
    #[error("size label cannot be empty")]
    EmptySizeLabel,
    /// Two size entries share a label.
    #[error("duplicate size label: {0}")]
    DuplicateSize(String),
}

/// One purchasable size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    /// Size label, unique within the product.
    pub size: String,
    /// Unit price for this size.
    pub price: Price,
    /// Units on hand.
    #[serde(default)]
    pub quantity: u32,
    /// Derived: `quantity > 0`. Recomputed by [`summarize_sizes`].
    #[serde(default)]
    pub in_stock: bool,
    /// Optional image specific to this size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// An uploaded product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    /// Publicly reachable URL.
    pub image_url: String,
    /// Identifier of the stored asset, used for deletion.
    pub public_id: String,
    #[serde(default)]
    pub caption: String,
    pub created_at: DateTime<Utc>,
}

/// Errors raised when a rating value is out of range.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between 1 and 5 (got {0})")]
pub struct RatingError(pub u8);

/// A star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RatingValue(u8);

impl RatingValue {
    /// Lowest allowed rating.
    pub const MIN: u8 = 1;
    /// Highest allowed rating.
    pub const MAX: u8 = 5;

    /// Get the number of stars.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RatingValue {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingError(value))
        }
    }
}

impl From<RatingValue> for u8 {
    fn from(value: RatingValue) -> Self {
        value.0
    }
}

/// A single user's rating of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user: UserId,
    pub value: RatingValue,
}

/// A catalog product as served by `GET /products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Free-text category (e.g. "Attar", "Perfume", "Accessories").
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub sizes: Vec<Size>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub average_rating: f64,
    /// `"min"`, `"min-max"`, or `"0-0"` when sold out.
    #[serde(default)]
    pub price_range: String,
    #[serde(default)]
    pub sold_out: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Look up a size entry by its label.
    #[must_use]
    pub fn size(&self, label: &str) -> Option<&Size> {
        self.sizes.iter().find(|s| s.size == label)
    }

    /// Whether the product offers a size with this label.
    #[must_use]
    pub fn has_size(&self, label: &str) -> bool {
        self.size(label).is_some()
    }

    /// Units on hand for a size; zero if the size does not exist.
    #[must_use]
    pub fn stock_of(&self, label: &str) -> u32 {
        self.size(label).map_or(0, |s| s.quantity)
    }

    /// Unit price for a size, if the size exists.
    #[must_use]
    pub fn price_of(&self, label: &str) -> Option<Price> {
        self.size(label).map(|s| s.price)
    }

    /// Lowest unit price across all sizes (used for catalog sorting).
    #[must_use]
    pub fn lowest_price(&self) -> Option<Price> {
        self.sizes.iter().map(|s| s.price).min()
    }

}

/// Fields derived from a product's sizes on every save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockSummary {
    pub price_range: String,
    pub sold_out: bool,
}

/// Recompute `in_stock` on every size and derive the product-level summary.
///
/// Only in-stock sizes contribute to the price range. A product with no
/// in-stock size is sold out and reports `"0-0"`.
///
/// ```
/// use desh_perfume_core::{Price, Size, summarize_sizes};
///
/// let mut sizes = vec![
///     Size { size: "50ml".into(), price: Price::from_taka(500), quantity: 3, in_stock: false, image_url: None },
///     Size { size: "100ml".into(), price: Price::from_taka(900), quantity: 1, in_stock: false, image_url: None },
/// ];
/// let summary = summarize_sizes(&mut sizes);
/// assert_eq!(summary.price_range, "500-900");
/// assert!(!summary.sold_out);
/// assert!(sizes.iter().all(|s| s.in_stock));
/// ```
pub fn summarize_sizes(sizes: &mut [Size]) -> StockSummary {
    for size in sizes.iter_mut() {
        size.in_stock = size.quantity > 0;
    }

    let mut in_stock = sizes.iter().filter(|s| s.in_stock).map(|s| s.price);
    let Some(first) = in_stock.next() else {
        return StockSummary {
            price_range: "0-0".to_owned(),
            sold_out: true,
        };
    };

    let (min, max) = in_stock.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
    let price_range = if min == max {
        min.amount().normalize().to_string()
    } else {
        format!("{}-{}", min.amount().normalize(), max.amount().normalize())
    };

    StockSummary {
        price_range,
        sold_out: false,
    }
}

/// Check that every size has a label and that labels are unique.
///
/// # Errors
///
/// Returns [`ProductError::EmptySizeLabel`] or [`ProductError::DuplicateSize`].
pub fn validate_sizes(sizes: &[Size]) -> Result<(), ProductError> {
    let mut seen = std::collections::HashSet::new();
    for size in sizes {
        if size.size.trim().is_empty() {
            return Err(ProductError::EmptySizeLabel);
        }
        if !seen.insert(size.size.as_str()) {
            return Err(ProductError::DuplicateSize(size.size.clone()));
        }
    }
    Ok(())
}
