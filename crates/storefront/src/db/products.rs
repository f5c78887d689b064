//! Product repository for database operations.
//!
//! Sizes and images live in JSONB columns on `storefront.products`; ratings
//! live in `storefront.product_ratings` and are folded back into each row as
//! a JSON array. Every write recomputes the derived stock fields, so a stored
//! size is in stock exactly when its quantity is positive.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use desh_perfume_core::{
    Product, ProductError, ProductId, ProductImage, Rating, RatingValue, Size, UserId,
    summarize_sizes, validate_sizes,
};

use super::RepositoryError;

/// Columns of a product row, ratings included.
macro_rules! select_products {
    () => {
        r"
        SELECT p.id, p.name, p.category, p.description, p.ingredients,
               p.sizes, p.images, p.average_rating, p.price_range, p.sold_out,
               p.created_at, p.updated_at,
               COALESCE(
                   (SELECT jsonb_agg(jsonb_build_object('user', r.user_id, 'value', r.value)
                                     ORDER BY r.created_at, r.user_id)
                    FROM storefront.product_ratings r
                    WHERE r.product_id = p.id),
                   '[]'::jsonb
               ) AS ratings
        FROM storefront.products p
        "
    };
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    category: String,
    description: String,
    ingredients: String,
    sizes: Json<Vec<Size>>,
    images: Json<Vec<ProductImage>>,
    ratings: Json<Vec<Rating>>,
    average_rating: f64,
    price_range: String,
    sold_out: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            ingredients: row.ingredients,
            sizes: row.sizes.0,
            images: row.images.0,
            ratings: row.ratings.0,
            average_rating: row.average_rating,
            price_range: row.price_range,
            sold_out: row.sold_out,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// The writable fields of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub category: String,
    pub description: String,
    pub ingredients: String,
    pub sizes: Vec<Size>,
    pub images: Vec<ProductImage>,
}

impl ProductDraft {
    /// Start an edit from a stored product.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            category: product.category.clone(),
            description: product.description.clone(),
            ingredients: product.ingredients.clone(),
            sizes: product.sizes.clone(),
            images: product.images.clone(),
        }
    }

    /// Trim text fields and check the name, category and sizes.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProductError`] found.
    pub fn normalize(&mut self) -> Result<(), ProductError> {
        self.name = self.name.trim().to_owned();
        self.category = self.category.trim().to_owned();
        self.description = self.description.trim().to_owned();
        self.ingredients = self.ingredients.trim().to_owned();
        for size in &mut self.sizes {
            size.size = size.size.trim().to_owned();
        }

        if self.name.is_empty() {
            return Err(ProductError::MissingName);
        }
        if self.category.is_empty() {
            return Err(ProductError::MissingCategory);
        }
        validate_sizes(&self.sizes)
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every product, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(concat!(select_products!(), "ORDER BY p.id"))
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row =
            sqlx::query_as::<_, ProductRow>(concat!(select_products!(), "WHERE p.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(Product::from))
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let mut sizes = draft.sizes.clone();
        let summary = summarize_sizes(&mut sizes);

        let id = sqlx::query_scalar::<_, ProductId>(
            r"
            INSERT INTO storefront.products
                (name, category, description, ingredients, sizes, images, price_range, sold_out)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(&draft.description)
        .bind(&draft.ingredients)
        .bind(Json(&sizes))
        .bind(Json(&draft.images))
        .bind(&summary.price_range)
        .bind(summary.sold_out)
        .fetch_one(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Overwrite a product's writable fields.
    ///
    /// Returns `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut sizes = draft.sizes.clone();
        let summary = summarize_sizes(&mut sizes);

        let updated = sqlx::query_scalar::<_, ProductId>(
            r"
            UPDATE storefront.products
            SET name = $2, category = $3, description = $4, ingredients = $5,
                sizes = $6, images = $7, price_range = $8, sold_out = $9,
                updated_at = now()
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(&draft.description)
        .bind(&draft.ingredients)
        .bind(Json(&sizes))
        .bind(Json(&draft.images))
        .bind(&summary.price_range)
        .bind(summary.sold_out)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }

    /// Delete a product, returning the images it referenced.
    ///
    /// Returns `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<Option<Vec<ProductImage>>, RepositoryError> {
        let images = sqlx::query_scalar::<_, Json<Vec<ProductImage>>>(
            "DELETE FROM storefront.products WHERE id = $1 RETURNING images",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(images.map(|Json(images)| images))
    }

    /// Delete every product. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.products")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Sorted distinct categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM storefront.products ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Sorted distinct size labels across all products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sizes(&self) -> Result<Vec<String>, RepositoryError> {
        let sizes = sqlx::query_scalar::<_, String>(
            r"
            SELECT DISTINCT s.value ->> 'size' AS size
            FROM storefront.products p
            CROSS JOIN LATERAL jsonb_array_elements(p.sizes) AS s(value)
            WHERE s.value ->> 'size' IS NOT NULL
            ORDER BY size
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(sizes)
    }

    /// Whether any product still references the stored image `public_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn image_in_use(&self, public_id: &str) -> Result<bool, RepositoryError> {
        let in_use = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM storefront.products p
                CROSS JOIN LATERAL jsonb_array_elements(p.images) AS i(value)
                WHERE i.value ->> 'publicId' = $1
            )
            ",
        )
        .bind(public_id)
        .fetch_one(self.pool)
        .await?;
        Ok(in_use)
    }

    /// Record `user`'s rating, replacing any earlier one, and recompute the
    /// average.
    ///
    /// Returns `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn rate(
        &self,
        id: ProductId,
        user: UserId,
        value: RatingValue,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the product row so concurrent ratings serialize on the average
        let exists = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM storefront.products WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r"
            INSERT INTO storefront.product_ratings (product_id, user_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, user_id)
            DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            ",
        )
        .bind(id)
        .bind(user)
        .bind(i16::from(value.get()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE storefront.products
            SET average_rating = (
                    SELECT COALESCE(AVG(value), 0)::float8
                    FROM storefront.product_ratings
                    WHERE product_id = $1
                ),
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use desh_perfume_core::Price;

    use super::*;

    fn size(label: &str) -> Size {
        Size {
            size: label.to_owned(),
            price: Price::from_taka(500),
            quantity: 1,
            in_stock: true,
            image_url: None,
        }
    }

    #[test]
    fn test_normalize_trims_fields() {
        let mut draft = ProductDraft {
            name: "  Oud Royale ".to_owned(),
            category: " Attar".to_owned(),
            sizes: vec![size(" 50ml ")],
            ..ProductDraft::default()
        };
        draft.normalize().unwrap();
        assert_eq!(draft.name, "Oud Royale");
        assert_eq!(draft.category, "Attar");
        assert_eq!(draft.sizes[0].size, "50ml");
    }

    #[test]
    fn test_normalize_requires_name_and_category() {
        let mut draft = ProductDraft {
            name: "   ".to_owned(),
            category: "Attar".to_owned(),
            ..ProductDraft::default()
        };
        assert_eq!(draft.normalize(), Err(ProductError::MissingName));

        draft.name = "Oud".to_owned();
        draft.category = String::new();
        assert_eq!(draft.normalize(), Err(ProductError::MissingCategory));
    }

    #[test]
    fn test_normalize_rejects_duplicate_sizes() {
        let mut draft = ProductDraft {
            name: "Oud".to_owned(),
            category: "Attar".to_owned(),
            sizes: vec![size("50ml"), size("50ml ")],
            ..ProductDraft::default()
        };
        assert!(matches!(
            draft.normalize(),
            Err(ProductError::DuplicateSize(_))
        ));
    }
}
