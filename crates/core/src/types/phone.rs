//! Bangladeshi mobile phone numbers.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::email::IdentityEmail;

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input does not have exactly eleven characters.
    #[error("phone number must be exactly {expected} digits (got {len})")]
    WrongLength {
        /// Required length.
        expected: usize,
        /// Length of the input.
        len: usize,
    },
    /// The input contains something other than ASCII digits.
    #[error("phone number must contain digits only")]
    NonDigit,
    /// The number does not start with `01`.
    #[error("phone number must start with 01")]
    BadPrefix,
}

/// A local mobile number: exactly 11 digits starting with `01`.
///
/// The number doubles as the account key everywhere in the marketplace. The
/// identity provider only knows email/password accounts, so every number
/// maps onto a synthetic [`IdentityEmail`].
///
/// ## Examples
///
/// ```
/// use taja_haat_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("01712345678").unwrap();
/// assert_eq!(phone.identity_email().as_str(), "01712345678@gmail.com");
/// assert_eq!(phone.international(), "8801712345678");
///
/// assert!(PhoneNumber::parse("0171234567").is_err());  // too short
/// assert!(PhoneNumber::parse("02712345678").is_err()); // wrong prefix
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Number of digits in a local number.
    pub const LENGTH: usize = 11;

    /// Required leading digits.
    pub const PREFIX: &'static str = "01";

    /// Country calling code used by the messaging gateway.
    pub const COUNTRY_CODE: &'static str = "880";

    /// Parse a `PhoneNumber`, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, is not 11 characters
    /// long, contains a non-digit, or does not start with `01`.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::NonDigit);
        }

        if s.len() != Self::LENGTH {
            return Err(PhoneError::WrongLength {
                expected: Self::LENGTH,
                len: s.len(),
            });
        }

        if !s.starts_with(Self::PREFIX) {
            return Err(PhoneError::BadPrefix);
        }

        Ok(Self(s.to_owned()))
    }

    pub(crate) const fn new_unchecked(digits: String) -> Self {
        Self(digits)
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PhoneNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The synthetic identity-provider email for this number.
    #[must_use]
    pub fn identity_email(&self) -> IdentityEmail {
        IdentityEmail::from_phone(self)
    }

    /// The number in gateway format: drop the leading `0`, prepend `880`.
    #[must_use]
    pub fn international(&self) -> String {
        format!("{}{}", Self::COUNTRY_CODE, self.0.get(1..).unwrap_or_default())
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

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PhoneNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "sqlite")]
crate::sqlite_text_type!(PhoneNumber, |s: &str| PhoneNumber::parse(s));
