//! Desh Perfume Storefront library.
//!
//! The REST backend behind the shop: products with per-size stock, accounts
//! with bearer tokens, and one shipping address per account. The binary in
//! `main.rs` and the `dp-cli` operator tool both build on this library.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
