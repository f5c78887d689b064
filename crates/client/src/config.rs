//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `DESH_API_URL` - API base URL (default: `http://localhost:5000/api`)
//! - `DESH_STORAGE_DIR` - Directory for the cart, token and theme files
//!   (default: `.desh-perfume`)
//! - `DESH_CATALOG_TTL_SECS` - How long a catalog snapshot is reused
//!   (default: 300)
//! - `DESH_FLAT_SHIPPING_FEE` - Whole-Taka delivery fee outside Dhaka
//!   (default: 100)

use std::path::PathBuf;
use std::time::Duration;

use desh_perfume_core::Price;
use thiserror::Error;
use url::Url;

use crate::checkout::{DEFAULT_FLAT_FEE, ShippingPolicy};

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_STORAGE_DIR: &str = ".desh-perfume";
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Storefront API base URL
    pub api_url: Url,
    /// Directory backing the durable key-value store
    pub storage_dir: PathBuf,
    /// Lifetime of a cached catalog snapshot
    pub catalog_ttl: Duration,
    /// Shipping charged outside the free-shipping division
    pub flat_shipping_fee: Price,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let api_url = Url::parse(&get("DESH_API_URL", DEFAULT_API_URL))
            .map_err(|e| ConfigError::InvalidEnvVar("DESH_API_URL".to_owned(), e.to_string()))?;
        let storage_dir = PathBuf::from(get("DESH_STORAGE_DIR", DEFAULT_STORAGE_DIR));
        let catalog_ttl = get("DESH_CATALOG_TTL_SECS", &DEFAULT_CATALOG_TTL_SECS.to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DESH_CATALOG_TTL_SECS".to_owned(), e.to_string())
            })?;
        let flat_shipping_fee = get("DESH_FLAT_SHIPPING_FEE", &DEFAULT_FLAT_FEE.to_string())
            .parse::<u32>()
            .map(Price::from_taka)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DESH_FLAT_SHIPPING_FEE".to_owned(), e.to_string())
            })?;

        Ok(Self {
            api_url,
            storage_dir,
            catalog_ttl,
            flat_shipping_fee,
        })
    }

    /// Shipping policy using the configured flat fee.
    #[must_use]
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: self.flat_shipping_fee,
            ..ShippingPolicy::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:5000/api");
        assert_eq!(config.storage_dir, PathBuf::from(".desh-perfume"));
        assert_eq!(config.catalog_ttl, Duration::from_secs(300));
        assert_eq!(config.flat_shipping_fee, Price::from_taka(100));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("DESH_API_URL", "https://shop.example.com/api"),
            ("DESH_FLAT_SHIPPING_FEE", "120"),
        ]))
        .unwrap();
        assert_eq!(config.api_url.host_str(), Some("shop.example.com"));
        assert_eq!(config.shipping_policy().flat_fee, Price::from_taka(120));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ClientConfig::from_lookup(lookup(&[("DESH_API_URL", "not a url")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("DESH_CATALOG_TTL_SECS", "-1")])).is_err());
    }
}
