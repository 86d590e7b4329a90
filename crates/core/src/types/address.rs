//! Street addresses and US zip codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ZipCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("zip code must be 12345 or 12345-6789")]
pub struct ZipCodeError;

/// A US zip code, `12345` or `12345-6789`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Parse a zip code.
    ///
    /// # Errors
    ///
    /// Returns [`ZipCodeError`] unless the input is five digits, optionally
    /// followed by a dash and four digits.
    pub fn parse(s: &str) -> Result<Self, ZipCodeError> {
        let s = s.trim();
        let (five, plus_four) = match s.split_once('-') {
            Some((five, four)) => (five, Some(four)),
            None => (s, None),
        };
        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.chars().all(|c| c.is_ascii_digit())
        };
        if !all_digits(five, 5) || plus_four.is_some_and(|four| !all_digits(four, 4)) {
            return Err(ZipCodeError);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the zip code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = ZipCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

/// Errors from [`Address::validate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("street address must be between 5 and 200 characters")]
    Street,
    #[error("unit/apt must be at most 20 characters")]
    Unit,
    #[error("city must be between 2 and 100 characters")]
    City,
    #[error("country is required")]
    Country,
    #[error(transparent)]
    Zip(#[from] ZipCodeError),
}

/// A service address.
///
/// Stored as loose text columns (and as JSON on orders) because guest orders
/// arrive from the field apps with whatever the customer typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    #[serde(default, rename = "street_address", alias = "street")]
    pub street: String,
    #[serde(default)]
    pub unit_apt: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
}

impl Address {
    /// Country used when a form leaves it blank.
    pub const DEFAULT_COUNTRY: &'static str = "United States";

    /// Join the non-empty parts with `", "` for display and directions.
    ///
    /// ```
    /// use cfac_core::Address;
    ///
    /// let address = Address {
    ///     street: "12 Elm St".into(),
    ///     city: "Austin".into(),
    ///     country: "United States".into(),
    ///     zip_code: "78701".into(),
    ///     ..Address::default()
    /// };
    /// assert_eq!(address.full_address(), "12 Elm St, Austin, United States, 78701");
    /// ```
    #[must_use]
    pub fn full_address(&self) -> String {
        [
            &self.street,
            &self.unit_apt,
            &self.city,
            &self.country,
            &self.zip_code,
        ]
        .into_iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Whether no part of the address is filled in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_address().is_empty()
    }

    /// Check the length rules used by the registration and account forms.
    ///
    /// # Errors
    ///
    /// Returns the first [`AddressError`] found.
    pub fn validate(&self) -> Result<(), AddressError> {
        let street = self.street.trim().chars().count();
        if !(5..=200).contains(&street) {
            return Err(AddressError::Street);
        }
        if self.unit_apt.trim().chars().count() > 20 {
            return Err(AddressError::Unit);
        }
        let city = self.city.trim().chars().count();
        if !(2..=100).contains(&city) {
            return Err(AddressError::City);
        }
        if self.country.trim().is_empty() {
            return Err(AddressError::Country);
        }
        ZipCode::parse(&self.zip_code)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            street: "400 Congress Ave".into(),
            unit_apt: "Apt 5".into(),
            city: "Austin".into(),
            country: Address::DEFAULT_COUNTRY.into(),
            zip_code: "78701-1234".into(),
        }
    }

    #[test]
    fn test_zip_code() {
        assert!(ZipCode::parse("78701").is_ok());
        assert!(ZipCode::parse("78701-1234").is_ok());
        assert!(ZipCode::parse("7870").is_err());
        assert!(ZipCode::parse("78701-12").is_err());
        assert!(ZipCode::parse("7870a").is_err());
        assert!(ZipCode::parse("78701-").is_err());
    }

    #[test]
    fn test_full_address_skips_blank_parts() {
        let mut addr = address();
        assert_eq!(
            addr.full_address(),
            "400 Congress Ave, Apt 5, Austin, United States, 78701-1234"
        );
        addr.unit_apt = "  ".into();
        assert_eq!(
            addr.full_address(),
            "400 Congress Ave, Austin, United States, 78701-1234"
        );
        assert!(Address::default().is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(address().validate().is_ok());

        let mut short_street = address();
        short_street.street = "1 A".into();
        assert_eq!(short_street.validate(), Err(AddressError::Street));

        let mut bad_zip = address();
        bad_zip.zip_code = "ABCDE".into();
        assert_eq!(bad_zip.validate(), Err(AddressError::Zip(ZipCodeError)));
    }

    #[test]
    fn test_deserialize_accepts_api_field_names() {
        let json = r#"{"street_address":"9 Oak Rd","city":"Waco","country":"US","zip_code":"76701"}"#;
        let addr: Address = serde_json::from_str(json).unwrap();
        assert_eq!(addr.street, "9 Oak Rd");
        assert_eq!(addr.unit_apt, "");
    }
}
