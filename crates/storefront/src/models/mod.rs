//! Domain models for storefront.
//!
//! Products and addresses are served as the shared `desh_perfume_core`
//! types; only users need a server-side model, because the password hash
//! must never leave the server.

pub mod user;

pub use user::User;
