//! Address repository for database operations.
//!
//! `storefront.addresses.user_id` is unique, so a user holds at most one
//! address. Lookups are always scoped to the owning user.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use desh_perfume_core::{Address, AddressId, NewAddress, UserId};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    country: String,
    state: String,
    city: String,
    zip_code: String,
    phone_number: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user: row.user_id,
            country: row.country,
            state: row.state,
            city: row.city,
            zip_code: row.zip_code,
            phone_number: row.phone_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's address, if they have saved one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(&self, user: UserId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, user_id, country, state, city, zip_code, phone_number,
                   created_at, updated_at
            FROM storefront.addresses
            WHERE user_id = $1
            ",
        )
        .bind(user)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Address::from))
    }

    /// Save the user's first address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has one.
    pub async fn create(
        &self,
        user: UserId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            INSERT INTO storefront.addresses
                (user_id, country, state, city, zip_code, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, country, state, city, zip_code, phone_number,
                      created_at, updated_at
            ",
        )
        .bind(user)
        .bind(address.country.trim())
        .bind(address.state.trim())
        .bind(address.city.trim())
        .bind(address.zip_code.trim())
        .bind(address.phone_number.trim())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "address already exists"))?;
        Ok(row.into())
    }

    /// Overwrite the fields of an address owned by `address.user`.
    ///
    /// Returns `None` if no such address belongs to that user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, address: &Address) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            UPDATE storefront.addresses
            SET country = $3, state = $4, city = $5, zip_code = $6, phone_number = $7,
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, country, state, city, zip_code, phone_number,
                      created_at, updated_at
            ",
        )
        .bind(address.id)
        .bind(address.user)
        .bind(address.country.trim())
        .bind(address.state.trim())
        .bind(address.city.trim())
        .bind(address.zip_code.trim())
        .bind(address.phone_number.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Address::from))
    }

    /// Delete an address owned by `user`. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: AddressId, user: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
