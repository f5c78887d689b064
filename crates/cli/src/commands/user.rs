//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! dp-cli user promote --email owner@deshperfume.com
//! ```
//!
//! Signup always creates plain `user` accounts; this is the only way to
//! grant the admin role.

use desh_perfume_core::{Email, Role};
use desh_perfume_storefront::db::{RepositoryError, UserRepository};

use super::{CommandError, connect};

/// Give the account with `email` the admin role.
///
/// # Errors
///
/// Returns `CommandError::Invalid` for a malformed email or when no account
/// uses it.
pub async fn promote(email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::Invalid(format!("{email}: {e}")))?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, Role::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                CommandError::Invalid(format!("no account with email {email}"))
            }
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    Ok(())
}
