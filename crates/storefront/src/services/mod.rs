//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Signup validation, password hashing and session tokens
//! - `images` - Content-addressed storage for product images

pub mod auth;
pub mod images;

pub use auth::{AuthError, AuthService, TokenSigner};
pub use images::{ImageError, ImageStore};
