//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! dp-cli migrate
//! ```
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in the
//! storefront library at compile time.

use desh_perfume_storefront::db::MIGRATOR;

use super::{CommandError, connect};

/// Run all pending storefront migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!(
        available = MIGRATOR.iter().count(),
        "Running storefront migrations..."
    );
    MIGRATOR.run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
