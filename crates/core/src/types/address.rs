//! Shipping address types.
//!
//! The shop delivers only within Bangladesh. An address names one of the
//! eight administrative divisions (`state`) and a district (`city`) inside
//! it. Each user owns at most one address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AddressId, UserId};

/// The only country the shop ships to.
pub const COUNTRY: &str = "Bangladesh";

/// Division whose deliveries ship for free.
pub const FREE_SHIPPING_STATE: &str = "Dhaka";

/// Divisions of Bangladesh and the districts accepted in each.
pub const DIVISIONS: &[(&str, &[&str])] = &[
    (
        "Dhaka",
        &[
            "Dhaka",
            "Gazipur",
            "Narayanganj",
            "Tangail",
            "Kishoreganj",
            "Manikganj",
            "Munshiganj",
            "Narsingdi",
        ],
    ),
    (
        "Chattogram",
        &[
            "Chattogram",
            "Cox's Bazar",
            "Comilla",
            "Feni",
            "Noakhali",
            "Rangamati",
            "Khagrachhari",
            "Bandarban",
        ],
    ),
    (
        "Khulna",
        &[
            "Khulna",
            "Jessore",
            "Satkhira",
            "Bagerhat",
            "Magura",
            "Jhenaidah",
            "Narail",
            "Kushtia",
        ],
    ),
    (
        "Rajshahi",
        &[
            "Rajshahi",
            "Pabna",
            "Sirajganj",
            "Bogra",
            "Joypurhat",
            "Naogaon",
            "Natore",
            "Chapainawabganj",
        ],
    ),
    (
        "Barishal",
        &[
            "Barishal",
            "Bhola",
            "Jhalokathi",
            "Patuakhali",
            "Pirojpur",
            "Barguna",
            "Sherpur",
            "Madaripur",
        ],
    ),
    (
        "Sylhet",
        &[
            "Sylhet",
            "Habiganj",
            "Moulvibazar",
            "Sunamganj",
            "Brahmanbaria",
            "Lakshmipur",
            "Chandpur",
            "Shariatpur",
        ],
    ),
    (
        "Rangpur",
        &[
            "Rangpur",
            "Dinajpur",
            "Lalmonirhat",
            "Kurigram",
            "Nilphamari",
            "Gaibandha",
            "Thakurgaon",
            "Panchagarh",
        ],
    ),
    (
        "Mymensingh",
        &[
            "Mymensingh",
            "Jamalpur",
            "Netrokona",
            "Sherpur",
            "Tangail",
            "Kishoreganj",
            "Gaibandha",
            "Bogura",
        ],
    ),
];

/// Errors raised when validating an address.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A required field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// The country is not Bangladesh.
    #[error("shipping is only available within Bangladesh (got {0})")]
    UnsupportedCountry(String),
    /// The state is not a known division.
    #[error("invalid state: {0}")]
    UnknownState(String),
    /// The city does not belong to the given state.
    #[error("invalid city {city} for state {state}")]
    CityNotInState {
        /// City as submitted.
        city: String,
        /// State as submitted.
        state: String,
    },
}

/// Districts accepted for a division, if the division exists.
#[must_use]
pub fn cities_of(state: &str) -> Option<&'static [&'static str]> {
    DIVISIONS
        .iter()
        .find(|(division, _)| *division == state)
        .map(|(_, cities)| *cities)
}

/// Check that `city` lies within the division `state`.
///
/// # Errors
///
/// Returns [`AddressError::UnknownState`] or [`AddressError::CityNotInState`].
pub fn validate_region(state: &str, city: &str) -> Result<(), AddressError> {
    let cities = cities_of(state).ok_or_else(|| AddressError::UnknownState(state.to_owned()))?;
    if cities.contains(&city) {
        Ok(())
    } else {
        Err(AddressError::CityNotInState {
            city: city.to_owned(),
            state: state.to_owned(),
        })
    }
}

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user: UserId,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zip_code: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /address/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub phone_number: String,
}

fn default_country() -> String {
    COUNTRY.to_owned()
}

impl NewAddress {
    /// Validate required fields and the division/district pair.
    ///
    /// # Errors
    ///
    /// Returns the first [`AddressError`] found.
    pub fn validate(&self) -> Result<(), AddressError> {
        for (name, value) in [
            ("country", &self.country),
            ("state", &self.state),
            ("city", &self.city),
            ("zipCode", &self.zip_code),
            ("phoneNumber", &self.phone_number),
        ] {
            if value.trim().is_empty() {
                return Err(AddressError::MissingField(name));
            }
        }
        if self.country != COUNTRY {
            return Err(AddressError::UnsupportedCountry(self.country.clone()));
        }
        validate_region(&self.state, &self.city)
    }
}

/// Body of `PATCH /address/update/:id`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl AddressPatch {
    /// Merge the provided fields into `address` and re-validate the result.
    ///
    /// `address` is only modified when the merged address is valid.
    ///
    /// # Errors
    ///
    /// Returns the [`AddressError`] of the merged address.
    pub fn apply_to(&self, address: &mut Address) -> Result<(), AddressError> {
        let merged = NewAddress {
            country: self.country.clone().unwrap_or_else(|| address.country.clone()),
            state: self.state.clone().unwrap_or_else(|| address.state.clone()),
            city: self.city.clone().unwrap_or_else(|| address.city.clone()),
            zip_code: self.zip_code.clone().unwrap_or_else(|| address.zip_code.clone()),
            phone_number: self
                .phone_number
                .clone()
                .unwrap_or_else(|| address.phone_number.clone()),
        };
        merged.validate()?;

        address.country = merged.country;
        address.state = merged.state;
        address.city = merged.city;
        address.zip_code = merged.zip_code;
        address.phone_number = merged.phone_number;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_address(state: &str, city: &str) -> NewAddress {
        NewAddress {
            country: COUNTRY.to_owned(),
            state: state.to_owned(),
            city: city.to_owned(),
            zip_code: "1207".to_owned(),
            phone_number: "+8801711000000".to_owned(),
        }
    }

    fn saved(state: &str, city: &str) -> Address {
        Address {
            id: AddressId::new(1),
            user: UserId::new(1),
            country: COUNTRY.to_owned(),
            state: state.to_owned(),
            city: city.to_owned(),
            zip_code: "1207".to_owned(),
            phone_number: "+8801711000000".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_region() {
        assert!(validate_region("Dhaka", "Gazipur").is_ok());
        assert!(validate_region("Chattogram", "Cox's Bazar").is_ok());
        assert_eq!(
            validate_region("Dhaka", "Sylhet"),
            Err(AddressError::CityNotInState {
                city: "Sylhet".to_owned(),
                state: "Dhaka".to_owned(),
            })
        );
        assert!(matches!(
            validate_region("Atlantis", "Dhaka"),
            Err(AddressError::UnknownState(_))
        ));
    }

    #[test]
    fn test_new_address_requires_fields() {
        let mut address = new_address("Dhaka", "Dhaka");
        assert!(address.validate().is_ok());
        address.phone_number = " ".to_owned();
        assert_eq!(
            address.validate(),
            Err(AddressError::MissingField("phoneNumber"))
        );
    }

    #[test]
    fn test_new_address_defaults_country() {
        let parsed: NewAddress = serde_json::from_value(serde_json::json!({
            "state": "Khulna",
            "city": "Jessore",
            "zipCode": "7400",
            "phoneNumber": "01700000000"
        }))
        .unwrap();
        assert_eq!(parsed.country, COUNTRY);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_foreign_country_rejected() {
        let mut address = new_address("Dhaka", "Dhaka");
        address.country = "India".to_owned();
        assert!(matches!(
            address.validate(),
            Err(AddressError::UnsupportedCountry(_))
        ));
    }

    #[test]
    fn test_patch_merges_fields() {
        let mut address = saved("Dhaka", "Dhaka");
        let patch = AddressPatch {
            state: Some("Sylhet".to_owned()),
            city: Some("Habiganj".to_owned()),
            ..AddressPatch::default()
        };
        patch.apply_to(&mut address).unwrap();
        assert_eq!(address.state, "Sylhet");
        assert_eq!(address.city, "Habiganj");
        assert_eq!(address.zip_code, "1207");
    }

    #[test]
    fn test_invalid_patch_leaves_address_unchanged() {
        let mut address = saved("Dhaka", "Gazipur");
        let patch = AddressPatch {
            state: Some("Rangpur".to_owned()),
            ..AddressPatch::default()
        };
        assert!(patch.apply_to(&mut address).is_err());
        assert_eq!(address.state, "Dhaka");
        assert_eq!(address.city, "Gazipur");
    }
}
