//! Product image storage on the local filesystem.
//!
//! Uploads are named by the SHA-256 of their contents, so uploading the same
//! picture twice stores one file. The file name doubles as the image's
//! `publicId`; files are served back under `/uploads`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;

use desh_perfume_core::ProductImage;

use crate::config::StorefrontConfig;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Errors from image storage.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("image is empty")]
    Empty,

    #[error("image exceeds {MAX_IMAGE_BYTES} bytes")]
    TooLarge,

    #[error("invalid image id: {0}")]
    InvalidId(String),

    #[error("image storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Content-addressed image directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    base_url: String,
}

impl ImageStore {
    /// Store files in `dir`, served from `base_url`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self::new(&config.upload_dir, config.upload_url(""))
    }

    /// Directory served under `/uploads`.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an uploaded file.
    ///
    /// `original_name` only supplies the extension.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::UnsupportedType` for anything other than
    /// jpg/jpeg/png/webp, `Empty`/`TooLarge` for bad sizes, or `Io` if the
    /// write fails.
    pub async fn save(
        &self,
        original_name: &str,
        bytes: &[u8],
        caption: &str,
    ) -> Result<ProductImage, ImageError> {
        let extension = extension_of(original_name)?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge);
        }

        let file_name = format!("{}.{extension}", hex::encode(Sha256::digest(bytes)));
        let path = self.dir.join(&file_name);

        tokio::fs::create_dir_all(&self.dir).await?;
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(public_id = %file_name, "Image already stored");
        } else {
            tokio::fs::write(&path, bytes).await?;
            tracing::info!(public_id = %file_name, size = bytes.len(), "Stored image");
        }

        Ok(ProductImage {
            image_url: format!("{}/{file_name}", self.base_url),
            public_id: file_name,
            caption: caption.trim().to_owned(),
            created_at: Utc::now(),
        })
    }

    /// Remove a stored file. Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::InvalidId` if `public_id` is not a stored file
    /// name, or `Io` if removal fails.
    pub async fn delete(&self, public_id: &str) -> Result<(), ImageError> {
        if !is_public_id(public_id) {
            return Err(ImageError::InvalidId(public_id.to_owned()));
        }
        match tokio::fs::remove_file(self.dir.join(public_id)).await {
            Ok(()) => {
                tracing::info!(%public_id, "Deleted image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn extension_of(name: &str) -> Result<String, ImageError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ImageError::UnsupportedType(name.to_owned()))
    }
}

/// `<64 hex chars>.<allowed extension>`
fn is_public_id(id: &str) -> bool {
    let Some((stem, extension)) = id.split_once('.') else {
        return false;
    };
    stem.len() == 64
        && stem.chars().all(|c| c.is_ascii_hexdigit())
        && ALLOWED_EXTENSIONS.contains(&extension)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> ImageStore {
        ImageStore::new(dir, "http://localhost:5000/uploads/")
    }

    #[tokio::test]
    async fn test_save_is_content_addressed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        let first = store.save("Oud.PNG", b"fake png bytes", " front ").await.unwrap();
        let second = store.save("copy.png", b"fake png bytes", "").await.unwrap();

        assert_eq!(first.public_id, second.public_id);
        assert!(first.public_id.ends_with(".png"));
        assert!(is_public_id(&first.public_id));
        assert_eq!(
            first.image_url,
            format!("http://localhost:5000/uploads/{}", first.public_id)
        );
        assert_eq!(first.caption, "front");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_bad_input() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        assert!(matches!(
            store.save("notes.txt", b"hello", "").await,
            Err(ImageError::UnsupportedType(_))
        ));
        assert!(matches!(
            store.save("empty.jpg", b"", "").await,
            Err(ImageError::Empty)
        ));
        let big = vec![0_u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            store.save("big.webp", &big, "").await,
            Err(ImageError::TooLarge)
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let image = store.save("a.jpg", b"jpeg", "").await.unwrap();

        store.delete(&image.public_id).await.unwrap();
        assert!(!tmp.path().join(&image.public_id).exists());
        // already gone
        store.delete(&image.public_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_rejects_paths() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            store(tmp.path()).delete("../config.toml").await,
            Err(ImageError::InvalidId(_))
        ));
    }
}
