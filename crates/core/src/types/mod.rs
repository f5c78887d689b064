//! Core types for Desh Perfume.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod auth;
pub mod email;
pub mod id;
pub mod price;
pub mod product;

pub use address::{
    Address, AddressError, AddressPatch, COUNTRY, DIVISIONS, FREE_SHIPPING_STATE, NewAddress,
    cities_of, validate_region,
};
pub use auth::{
    AuthResponse, LoginRequest, MessageResponse, PublicUser, RatingRequest, Role, SignupRequest,
    TokenClaims,
};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use product::{
    Product, ProductError, ProductImage, Rating, RatingError, RatingValue, Size, StockSummary,
    summarize_sizes, validate_sizes,
};
