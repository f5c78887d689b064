//! Catalog browsing: search, filter, sort and paginate a snapshot.

use std::cmp::Ordering;

use desh_perfume_core::Product;
use serde::{Deserialize, Serialize};

/// Products per page unless the query says otherwise.
pub const DEFAULT_PER_PAGE: usize = 12;

/// Price ordering, by each product's lowest size price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Snapshot order.
    #[default]
    None,
    LowToHigh,
    HighToLow,
}

/// A catalog query. The default matches every product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the product name.
    pub search: String,
    /// Category name; `"all"` or empty matches every category.
    pub category: String,
    /// A product matches if it offers any of these sizes. Empty matches all.
    pub sizes: Vec<String>,
    pub sort: SortOrder,
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: "all".to_owned(),
            sizes: Vec::new(),
            sort: SortOrder::None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub items: Vec<Product>,
    pub page: usize,
    pub per_page: usize,
    /// Matches across all pages.
    pub total: usize,
    pub total_pages: usize,
}

impl CatalogQuery {
    /// Whether `product` passes the search and filters.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let search = self.search.trim().to_lowercase();
        if !search.is_empty() && !product.name.to_lowercase().contains(&search) {
            return false;
        }

        let category = self.category.trim();
        if !category.is_empty()
            && !category.eq_ignore_ascii_case("all")
            && !product.category.eq_ignore_ascii_case(category)
        {
            return false;
        }

        self.sizes.is_empty() || self.sizes.iter().any(|s| product.has_size(s))
    }

    /// Run the query over `products`.
    ///
    /// A page past the end yields no items; page 0 is treated as page 1.
    #[must_use]
    pub fn apply(&self, products: &[Product]) -> CatalogPage {
        let mut matched: Vec<&Product> = products.iter().filter(|p| self.matches(p)).collect();

        match self.sort {
            SortOrder::None => {}
            SortOrder::LowToHigh => matched.sort_by(|a, b| by_price(a, b, false)),
            SortOrder::HighToLow => matched.sort_by(|a, b| by_price(a, b, true)),
        }

        let per_page = self.per_page.max(1);
        let page = self.page.max(1);
        let total = matched.len();
        let items = matched
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();

        CatalogPage {
            items,
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        }
    }
}

/// Products without sizes sort last in either direction.
fn by_price(a: &Product, b: &Product, descending: bool) -> Ordering {
    match (a.lowest_price(), b.lowest_price()) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
