//! Desh Perfume Core - Shared types library.
//!
//! This crate provides the domain types shared by every Desh Perfume component:
//! - `storefront` - REST backend (products, users, addresses)
//! - `client` - Cart, checkout and session logic that talks to the backend
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The optional `postgres` feature adds `sqlx`
//! encoding for IDs and emails.
//!
//! # Modules
//!
//! - [`types`] - IDs, emails, prices, products, addresses and auth payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
