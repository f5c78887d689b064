//! Cached product inventory.
//!
//! Every client component reads products through a single
//! [`InventoryCache`]. The cache hands out immutable [`InventorySnapshot`]s;
//! a refresh replaces the snapshot wholesale rather than patching it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use desh_perfume_core::{Price, Product, ProductId};
use moka::future::Cache;
use tracing::instrument;

use crate::api::ApiError;

/// Where product data comes from. Implemented by the HTTP client and by
/// in-memory fakes in tests.
pub trait InventorySource: Send + Sync {
    /// All products in the catalog.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, ApiError>> + Send;

    /// One product, bypassing any cache.
    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Product, ApiError>> + Send;

    /// Distinct category names.
    fn categories(&self) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;

    /// Distinct size labels across all products.
    fn sizes(&self) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;
}

/// An immutable view of the catalog at one point in time.
#[derive(Debug, Clone)]
pub struct InventorySnapshot {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
    fetched_at: DateTime<Utc>,
}

impl InventorySnapshot {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        let index = products
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
        Self {
            products,
            index,
            fetched_at: Utc::now(),
        }
    }

    /// A snapshot with no products.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.index.get(&id).and_then(|&i| self.products.get(i))
    }

    /// Units on hand for a size; zero for unknown products or sizes.
    #[must_use]
    pub fn stock_of(&self, id: ProductId, size: &str) -> u32 {
        self.product(id).map_or(0, |p| p.stock_of(size))
    }

    /// Unit price for a size, if both the product and size exist.
    #[must_use]
    pub fn price_of(&self, id: ProductId, size: &str) -> Option<Price> {
        self.product(id).and_then(|p| p.price_of(size))
    }

    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Cache key for inventory data.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    Snapshot,
    Categories,
    Sizes,
}

/// Cached inventory values.
#[derive(Debug, Clone)]
enum CacheValue {
    Snapshot(Arc<InventorySnapshot>),
    Labels(Arc<Vec<String>>),
}

/// Read-through cache over an [`InventorySource`].
///
/// [`get_cached`](Self::get_cached) and [`refresh`](Self::refresh) are the
/// only ways to obtain a snapshot, so every reader sees the same one.
pub struct InventoryCache<S> {
    source: Arc<S>,
    cache: Cache<CacheKey, CacheValue>,
}

impl<S> Clone for InventoryCache<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
        }
    }
}

impl<S: InventorySource> InventoryCache<S> {
    /// Create a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(source: Arc<S>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(8).time_to_live(ttl).build();
        Self { source, cache }
    }

    /// The current snapshot, fetching it if nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch was needed and failed.
    pub async fn get_cached(&self) -> Result<Arc<InventorySnapshot>, ApiError> {
        if let Some(CacheValue::Snapshot(snapshot)) = self.cache.get(&CacheKey::Snapshot).await {
            tracing::debug!("Inventory cache hit");
            return Ok(snapshot);
        }
        self.refresh().await
    }

    /// Re-fetch the full catalog and replace the cached snapshot.
    ///
    /// On failure the previous snapshot (if any) stays in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<InventorySnapshot>, ApiError> {
        let products = self.source.list_products().await?;
        let snapshot = Arc::new(InventorySnapshot::new(products));
        tracing::debug!(products = snapshot.len(), "Inventory refreshed");
        self.cache
            .insert(CacheKey::Snapshot, CacheValue::Snapshot(Arc::clone(&snapshot)))
            .await;
        Ok(snapshot)
    }

    /// Distinct categories, cached alongside the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    pub async fn categories(&self) -> Result<Arc<Vec<String>>, ApiError> {
        self.labels(CacheKey::Categories).await
    }

    /// Distinct size labels, cached alongside the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    pub async fn sizes(&self) -> Result<Arc<Vec<String>>, ApiError> {
        self.labels(CacheKey::Sizes).await
    }

    async fn labels(&self, key: CacheKey) -> Result<Arc<Vec<String>>, ApiError> {
        if let Some(CacheValue::Labels(labels)) = self.cache.get(&key).await {
            return Ok(labels);
        }
        let labels = match key {
            CacheKey::Categories => self.source.categories().await?,
            _ => self.source.sizes().await?,
        };
        let labels = Arc::new(labels);
        self.cache
            .insert(key, CacheValue::Labels(Arc::clone(&labels)))
            .await;
        Ok(labels)
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use desh_perfume_core::Size;

    use super::*;

    pub(crate) fn product(id: i32, sizes: &[(&str, u32, u32)]) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            category: "Attar".to_owned(),
            description: String::new(),
            ingredients: String::new(),
            sizes: sizes
                .iter()
                .map(|&(label, price, quantity)| Size {
                    size: label.to_owned(),
                    price: Price::from_taka(price),
                    quantity,
                    in_stock: quantity > 0,
                    image_url: None,
                })
                .collect(),
            images: Vec::new(),
            ratings: Vec::new(),
            average_rating: 0.0,
            price_range: String::new(),
            sold_out: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// In-memory catalog whose stock can be changed between reads.
    #[derive(Default)]
    pub(crate) struct FakeInventory {
        pub products: Mutex<Vec<Product>>,
        pub list_calls: AtomicUsize,
        pub offline: std::sync::atomic::AtomicBool,
    }

    impl FakeInventory {
        pub(crate) fn with(products: Vec<Product>) -> Self {
            Self {
                products: Mutex::new(products),
                ..Self::default()
            }
        }

        pub(crate) fn set_stock(&self, id: i32, size: &str, quantity: u32) {
            let mut products = self.products.lock().unwrap();
            let product = products
                .iter_mut()
                .find(|p| p.id == ProductId::new(id))
                .unwrap();
            let entry = product.sizes.iter_mut().find(|s| s.size == size).unwrap();
            entry.quantity = quantity;
        }

        pub(crate) fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        fn check_online(&self) -> Result<(), ApiError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(ApiError::Server {
                    status: 503,
                    message: "offline".to_owned(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl InventorySource for FakeInventory {
        async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
            self.check_online()?;
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.products.lock().unwrap().clone())
        }

        async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
            self.check_online()?;
            self.products
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("product {id}")))
        }

        async fn categories(&self) -> Result<Vec<String>, ApiError> {
            self.check_online()?;
            Ok(vec!["Attar".to_owned()])
        }

        async fn sizes(&self) -> Result<Vec<String>, ApiError> {
            self.check_online()?;
            Ok(vec!["50ml".to_owned(), "100ml".to_owned()])
        }
    }

    #[test]
    fn test_snapshot_lookups() {
        let snapshot = InventorySnapshot::new(vec![product(1, &[("50ml", 500, 3)])]);
        assert_eq!(snapshot.stock_of(ProductId::new(1), "50ml"), 3);
        assert_eq!(snapshot.stock_of(ProductId::new(1), "10ml"), 0);
        assert_eq!(snapshot.stock_of(ProductId::new(2), "50ml"), 0);
        assert_eq!(
            snapshot.price_of(ProductId::new(1), "50ml"),
            Some(Price::from_taka(500))
        );
        assert_eq!(snapshot.price_of(ProductId::new(2), "50ml"), None);
    }

    #[tokio::test]
    async fn test_get_cached_fetches_once() {
        let source = Arc::new(FakeInventory::with(vec![product(1, &[("50ml", 500, 3)])]));
        let cache = InventoryCache::new(Arc::clone(&source), Duration::from_secs(60));

        let first = cache.get_cached().await.unwrap();
        let second = cache.get_cached().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let source = Arc::new(FakeInventory::with(vec![product(1, &[("50ml", 500, 3)])]));
        let cache = InventoryCache::new(Arc::clone(&source), Duration::from_secs(60));

        cache.get_cached().await.unwrap();
        cache.invalidate();
        cache.get_cached().await.unwrap();
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let source = Arc::new(FakeInventory::with(vec![product(1, &[("50ml", 500, 3)])]));
        let cache = InventoryCache::new(Arc::clone(&source), Duration::from_secs(60));

        let before = cache.get_cached().await.unwrap();
        source.set_stock(1, "50ml", 1);
        let after = cache.refresh().await.unwrap();

        assert_eq!(before.stock_of(ProductId::new(1), "50ml"), 3);
        assert_eq!(after.stock_of(ProductId::new(1), "50ml"), 1);
        let cached = cache.get_cached().await.unwrap();
        assert!(Arc::ptr_eq(&after, &cached));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(FakeInventory::with(vec![product(1, &[("50ml", 500, 3)])]));
        let cache = InventoryCache::new(Arc::clone(&source), Duration::from_secs(60));

        let before = cache.get_cached().await.unwrap();
        source.go_offline();
        assert!(cache.refresh().await.is_err());
        let still = cache.get_cached().await.unwrap();
        assert!(Arc::ptr_eq(&before, &still));
    }

    #[tokio::test]
    async fn test_labels_are_cached() {
        let source = Arc::new(FakeInventory::with(Vec::new()));
        let cache = InventoryCache::new(Arc::clone(&source), Duration::from_secs(60));
        assert_eq!(cache.categories().await.unwrap().as_slice(), ["Attar"]);
        source.go_offline();
        assert_eq!(cache.sizes().await.map(|s| s.len()).ok(), None);
        assert_eq!(cache.categories().await.unwrap().len(), 1);
    }
}
