//! Seed the product catalog from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! products:
//!   - name: Oud Al Layl
//!     category: Attar
//!     description: Smoky agarwood with rose
//!     ingredients: Agarwood oil, Taif rose
//!     sizes:
//!       - { size: 3ml, price: 450, quantity: 20 }
//!       - { size: 6ml, price: 800, quantity: 0 }
//!     images:
//!       - url: https://cdn.example.com/oud-al-layl.webp
//!         caption: Bottle
//! ```
//!
//! `inStock`, `soldOut` and `priceRange` are computed on insert, never read
//! from the file.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use desh_perfume_core::{Price, ProductImage, Size};
use desh_perfume_storefront::db::{ProductDraft, ProductRepository};

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
struct Catalog {
    products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
struct SeedProduct {
    name: String,
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    ingredients: String,
    #[serde(default)]
    sizes: Vec<SeedSize>,
    #[serde(default)]
    images: Vec<SeedImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedSize {
    size: String,
    price: Price,
    #[serde(default)]
    quantity: u32,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeedImage {
    url: String,
    #[serde(default)]
    caption: String,
}

impl SeedProduct {
    fn into_draft(self) -> Result<ProductDraft, CommandError> {
        let now = Utc::now();
        let mut draft = ProductDraft {
            name: self.name,
            category: self.category,
            description: self.description,
            ingredients: self.ingredients,
            sizes: self
                .sizes
                .into_iter()
                .map(|s| Size {
                    size: s.size,
                    price: s.price,
                    quantity: s.quantity,
                    in_stock: false,
                    image_url: s.image_url,
                })
                .collect(),
            images: self
                .images
                .into_iter()
                .map(|image| ProductImage {
                    public_id: public_id_of(&image.url),
                    image_url: image.url,
                    caption: image.caption,
                    created_at: now,
                })
                .collect(),
        };
        draft
            .normalize()
            .map_err(|e| CommandError::Invalid(format!("{}: {e}", draft.name)))?;
        Ok(draft)
    }
}

/// Last path segment of an image URL.
fn public_id_of(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_owned()
}

/// Parse and validate every product in a catalog file.
fn parse_catalog(content: &str) -> Result<Vec<ProductDraft>, CommandError> {
    let catalog: Catalog = serde_yaml::from_str(content)?;
    catalog
        .products
        .into_iter()
        .map(SeedProduct::into_draft)
        .collect()
}

/// Insert products from `file_path`.
///
/// The whole file is validated before the database is touched.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML catalog
/// * `clear_existing` - If true, delete every existing product first
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a product is
/// invalid, or a database operation fails.
pub async fn products(file_path: &Path, clear_existing: bool) -> Result<(), CommandError> {
    let content =
        tokio::fs::read_to_string(file_path)
            .await
            .map_err(|source| CommandError::Read {
                path: file_path.display().to_string(),
                source,
            })?;
    let drafts = parse_catalog(&content)?;
    info!(path = %file_path.display(), products = drafts.len(), "Parsed catalog");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    if clear_existing {
        let removed = repo.delete_all().await?;
        warn!(removed, "Cleared existing products");
    }

    for draft in &drafts {
        let product = repo.create(draft).await?;
        info!(
            product_id = %product.id,
            name = %product.name,
            price_range = %product.price_range,
            "Inserted product"
        );
    }

    info!("Seeding complete! {} products inserted", drafts.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r"
products:
  - name: '  Oud Al Layl '
    category: Attar
    sizes:
      - { size: 3ml, price: 450, quantity: 20 }
      - { size: 6ml, price: '800', quantity: 0 }
    images:
      - url: https://cdn.example.com/products/oud-al-layl.webp
        caption: Bottle
  - name: Rose Mist
    category: Perfume
";

    #[test]
    fn test_parse_catalog() {
        let drafts = parse_catalog(CATALOG).unwrap();
        assert_eq!(drafts.len(), 2);

        let oud = &drafts[0];
        assert_eq!(oud.name, "Oud Al Layl");
        assert_eq!(oud.sizes[1].price, Price::from_taka(800));
        assert_eq!(oud.images[0].public_id, "oud-al-layl.webp");
        assert_eq!(oud.images[0].caption, "Bottle");

        assert!(drafts[1].sizes.is_empty());
    }

    #[test]
    fn test_duplicate_sizes_are_rejected() {
        let content = r"
products:
  - name: Amber
    category: Attar
    sizes:
      - { size: 3ml, price: 300 }
      - { size: 3ml, price: 350 }
";
        assert!(matches!(parse_catalog(content), Err(CommandError::Invalid(_))));
    }

    #[test]
    fn test_missing_category_is_rejected() {
        let content = "products:\n  - name: Amber\n    category: '  '\n";
        assert!(matches!(parse_catalog(content), Err(CommandError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = products(&dir.path().join("nope.yaml"), false).await.unwrap_err();
        assert!(matches!(err, CommandError::Read { .. }));
    }
}
