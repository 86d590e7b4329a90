//! Phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number cannot be empty")]
    Empty,
    #[error("invalid phone number format")]
    InvalidFormat,
    #[error("phone number must have 10 digits to receive text messages")]
    NotUsNumber,
}

/// A phone number stored as digits only.
///
/// Input may use spaces, dashes, dots, and parentheses as separators. After
/// removing them it must match `^\+?1?\d{9,15}$`; the optional `+` is dropped
/// when stored, so lookups by phone compare plain digit strings.
///
/// ```
/// use cfac_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("(555) 123-4567").unwrap();
/// assert_eq!(phone.as_str(), "5551234567");
/// assert_eq!(phone.to_e164_us().unwrap(), "+15551234567");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_DIGITS: usize = 9;
    const MAX_DIGITS: usize = 15;

    /// Parse a phone number entered by a person.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::Empty`] for blank input and
    /// [`PhoneError::InvalidFormat`] when the digits don't fit the pattern.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let compact: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();
        if compact.is_empty() {
            return Err(PhoneError::Empty);
        }

        let digits = compact.strip_prefix('+').unwrap_or(&compact);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneError::InvalidFormat);
        }

        // The leading `1?` is optional, so a 10-16 digit run starting with 1
        // still matches as long as the remainder is 9-15 digits.
        let body_len = digits.strip_prefix('1').map_or(digits.len(), str::len);
        let fits = (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len())
            || (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&body_len);
        if !fits {
            return Err(PhoneError::InvalidFormat);
        }

        Ok(Self(digits.to_owned()))
    }

    /// Extract digits for an exact-match lookup (e.g. a login identifier).
    ///
    /// Returns `None` when the input has no digits at all.
    #[must_use]
    pub fn digits_of(s: &str) -> Option<String> {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        (!digits.is_empty()).then_some(digits)
    }

    /// Returns the stored digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Format as a US E.164 number (`+1XXXXXXXXXX`) for SMS delivery.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::NotUsNumber`] unless the number has exactly ten
    /// digits, or eleven with a leading country code of `1`.
    pub fn to_e164_us(&self) -> Result<String, PhoneError> {
        let national = match self.0.len() {
            10 => self.0.as_str(),
            11 => self.0.strip_prefix('1').ok_or(PhoneError::NotUsNumber)?,
            _ => return Err(PhoneError::NotUsNumber),
        };
        Ok(format!("+1{national}"))
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_separators_and_plus() {
        assert_eq!(PhoneNumber::parse("+1 555-123-4567").unwrap().as_str(), "15551234567");
        assert_eq!(PhoneNumber::parse("555.123.4567").unwrap().as_str(), "5551234567");
    }

    #[test]
    fn test_parse_length_bounds() {
        assert!(PhoneNumber::parse("123456789").is_ok());
        assert!(PhoneNumber::parse("12345678").is_err());
        assert!(PhoneNumber::parse("1234567890123456").is_ok());
        assert!(PhoneNumber::parse("2234567890123456").is_err());
    }

    #[test]
    fn test_parse_rejects_letters_and_blank() {
        assert_eq!(PhoneNumber::parse("   "), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse("555-CALL-NOW"), Err(PhoneError::InvalidFormat));
        assert_eq!(PhoneNumber::parse("12+5551234567"), Err(PhoneError::InvalidFormat));
    }

    #[test]
    fn test_to_e164_us() {
        let ten = PhoneNumber::parse("5551234567").unwrap();
        assert_eq!(ten.to_e164_us().unwrap(), "+15551234567");

        let eleven = PhoneNumber::parse("15551234567").unwrap();
        assert_eq!(eleven.to_e164_us().unwrap(), "+15551234567");

        let short = PhoneNumber::parse("555123456").unwrap();
        assert_eq!(short.to_e164_us(), Err(PhoneError::NotUsNumber));

        let foreign = PhoneNumber::parse("+445551234567").unwrap();
        assert_eq!(foreign.to_e164_us(), Err(PhoneError::NotUsNumber));
    }

    #[test]
    fn test_digits_of() {
        assert_eq!(PhoneNumber::digits_of("(555) 123-4567").as_deref(), Some("5551234567"));
        assert_eq!(PhoneNumber::digits_of("jane@example.com"), None);
    }
}
