//! Product route handlers.
//!
//! Reads are public. Create, update and delete take an admin token and a
//! multipart form; rating takes any valid token.

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::instrument;

use desh_perfume_core::{
    MessageResponse, Product, ProductError, ProductId, ProductImage, RatingRequest, Size,
};

use crate::db::{ProductDraft, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::state::AppState;

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        let message = err.to_string();
        let mut chars = message.chars();
        Self::BadRequest(
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default(),
        )
    }
}

fn product_not_found() -> AppError {
    AppError::NotFound("Product not found".to_owned())
}

/// An uploaded file from a multipart form.
#[derive(Debug)]
struct Upload {
    file_name: String,
    bytes: Bytes,
}

/// Fields of the product create/update form. Absent fields stay `None`.
#[derive(Debug, Default)]
struct ProductForm {
    name: Option<String>,
    category: Option<String>,
    description: Option<String>,
    ingredients: Option<String>,
    sizes: Option<Vec<Size>>,
    caption: Option<String>,
    image: Option<Upload>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid image upload: {e}")))?;
                form.image = Some(Upload { file_name, bytes });
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid form field {name}: {e}")))?;
            match name.as_str() {
                "name" => form.name = Some(text),
                "category" => form.category = Some(text),
                "description" => form.description = Some(text),
                "ingredients" => form.ingredients = Some(text),
                "caption" => form.caption = Some(text),
                "sizes" => form.sizes = Some(parse_sizes(&text)?),
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    /// Overwrite the draft with every provided field.
    fn apply_to(&mut self, draft: &mut ProductDraft) {
        if let Some(name) = self.name.take() {
            draft.name = name;
        }
        if let Some(category) = self.category.take() {
            draft.category = category;
        }
        if let Some(description) = self.description.take() {
            draft.description = description;
        }
        if let Some(ingredients) = self.ingredients.take() {
            draft.ingredients = ingredients;
        }
        if let Some(sizes) = self.sizes.take() {
            draft.sizes = sizes;
        }
    }
}

fn parse_sizes(text: &str) -> Result<Vec<Size>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text)
        .map_err(|e| AppError::BadRequest(format!("Invalid sizes: {e}")))
}

async fn store_upload(state: &AppState, upload: &Upload, caption: Option<&str>) -> Result<ProductImage> {
    Ok(state
        .images()
        .save(&upload.file_name, &upload.bytes, caption.unwrap_or_default())
        .await?)
}

/// Remove stored files that no product references any more.
async fn release_images(state: &AppState, images: &[ProductImage]) {
    let repo = ProductRepository::new(state.pool());
    for image in images {
        match repo.image_in_use(&image.public_id).await {
            Ok(false) => {
                if let Err(e) = state.images().delete(&image.public_id).await {
                    tracing::warn!(public_id = %image.public_id, error = %e, "Failed to delete image");
                }
            }
            Ok(true) => {}
            Err(e) => {
                tracing::warn!(public_id = %image.public_id, error = %e, "Failed to check image usage");
            }
        }
    }
}

/// Finish a product write, releasing a freshly stored upload if the write
/// did not land (error, or the product vanished mid-request).
async fn keep_upload_if_saved(
    state: &AppState,
    upload: Option<ProductImage>,
    written: std::result::Result<Option<Product>, RepositoryError>,
) -> Result<Product> {
    let written = written.map_err(AppError::from).and_then(|p| p.ok_or_else(product_not_found));
    if let (Err(_), Some(image)) = (&written, upload) {
        release_images(state, &[image]).await;
    }
    written
}

/// `GET /products`
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(ProductRepository::new(state.pool()).list().await?))
}

/// `GET /products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(product_not_found)
}

/// `GET /products/categories`
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(ProductRepository::new(state.pool()).categories().await?))
}

/// `GET /products/sizes`
#[instrument(skip(state))]
pub async fn sizes(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(ProductRepository::new(state.pool()).sizes().await?))
}

/// `POST /products`
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>)> {
    let mut form = ProductForm::read(multipart).await?;

    let mut draft = ProductDraft::default();
    form.apply_to(&mut draft);
    draft.normalize()?;

    let upload = form
        .image
        .take()
        .ok_or_else(|| AppError::BadRequest("At least one image is required".to_owned()))?;
    let image = store_upload(&state, &upload, form.caption.as_deref()).await?;
    draft.images.push(image.clone());

    let written = ProductRepository::new(state.pool()).create(&draft).await.map(Some);
    let product = keep_upload_if_saved(&state, Some(image), written).await?;
    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /products/{id}`
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<Product>> {
    let repo = ProductRepository::new(state.pool());
    let existing = repo.get(id).await?.ok_or_else(product_not_found)?;

    let mut form = ProductForm::read(multipart).await?;
    let mut draft = ProductDraft::from_product(&existing);
    form.apply_to(&mut draft);
    draft.normalize()?;

    let mut added = None;
    if let Some(upload) = form.image.take() {
        let image = store_upload(&state, &upload, form.caption.as_deref()).await?;
        if draft.images.iter().all(|i| i.public_id != image.public_id) {
            draft.images.push(image.clone());
            added = Some(image);
        }
    }

    let written = repo.update(id, &draft).await;
    let product = keep_upload_if_saved(&state, added, written).await?;
    tracing::info!(product_id = %product.id, "Product updated");
    Ok(Json(product))
}

/// `DELETE /products/{id}`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<MessageResponse>> {
    let images = ProductRepository::new(state.pool())
        .delete(id)
        .await?
        .ok_or_else(product_not_found)?;

    release_images(&state, &images).await;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(Json(MessageResponse::new("Product deleted")))
}

/// `POST /products/{id}/rating`
#[instrument(skip(state, claims), fields(user_id = %claims.id))]
pub async fn rate(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<ProductId>,
    Json(request): Json<RatingRequest>,
) -> Result<Json<Product>> {
    let value = request.rating().ok_or_else(|| {
        tracing::debug!(value = request.value, "Rejected rating");
        AppError::BadRequest("Rating must be between 1 and 5".to_owned())
    })?;

    ProductRepository::new(state.pool())
        .rate(id, claims.id, value)
        .await?
        .map(Json)
        .ok_or_else(product_not_found)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use desh_perfume_core::Price;

    use super::*;

    #[test]
    fn test_parse_sizes() {
        let sizes = parse_sizes(r#"[{"size":"50ml","price":"1200","quantity":3}]"#).unwrap();
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].size, "50ml");
        assert_eq!(sizes[0].price, Price::from_taka(1200));
        assert!(parse_sizes("  ").unwrap().is_empty());
        assert!(matches!(parse_sizes("[{"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_form_overwrites_only_provided_fields() {
        let mut draft = ProductDraft {
            name: "Oud Al Layl".to_owned(),
            category: "Attar".to_owned(),
            description: "Smoky".to_owned(),
            ..ProductDraft::default()
        };
        let mut form = ProductForm {
            category: Some("Perfume".to_owned()),
            ..ProductForm::default()
        };
        form.apply_to(&mut draft);
        assert_eq!(draft.name, "Oud Al Layl");
        assert_eq!(draft.category, "Perfume");
        assert_eq!(draft.description, "Smoky");
    }

    #[tokio::test]
    #[ignore = "Requires migrated PostgreSQL (STOREFRONT_DATABASE_URL)"]
    async fn test_upload_released_when_product_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::tests::test_config();
        config.upload_dir = dir.path().to_path_buf();
        let url = crate::config::database_url_from_env().unwrap();
        let pool = crate::db::create_pool(&url).await.unwrap();
        let state = AppState::new(config, pool);

        let upload = Upload {
            file_name: "bottle.png".to_owned(),
            bytes: Bytes::from_static(b"orphaned upload"),
        };
        let image = store_upload(&state, &upload, None).await.unwrap();
        let stored = dir.path().join(&image.public_id);
        assert!(stored.exists());

        let err = keep_upload_if_saved(&state, Some(image), Ok(None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!stored.exists());
    }

    #[test]
    fn test_product_error_message() {
        let err: AppError = ProductError::MissingName.into();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Product name is required"));
    }
}
