//! Synthetic identity-provider email addresses.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::phone::{PhoneError, PhoneNumber};

/// Errors that can occur when parsing an [`IdentityEmail`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input does not contain an @ symbol.
    #[error("identifier must contain an @ symbol")]
    MissingAtSymbol,
    /// The domain is not the one used for synthetic identifiers.
    #[error("identifier domain must be {expected}")]
    WrongDomain {
        /// Domain every synthetic identifier uses.
        expected: &'static str,
    },
    /// The local part is not a valid phone number.
    #[error("identifier local part is not a phone number: {0}")]
    InvalidPhone(#[from] PhoneError),
}

/// The email address the identity provider knows an account by.
///
/// The provider only supports email/password accounts, so each phone number
/// is mapped onto `<phone>@gmail.com`. The mapping is total and reversible:
/// [`IdentityEmail::phone`] recovers the original number.
///
/// ## Examples
///
/// ```
/// use taja_haat_core::{IdentityEmail, PhoneNumber};
///
/// let phone = PhoneNumber::parse("01712345678").unwrap();
/// let email = IdentityEmail::from_phone(&phone);
/// assert_eq!(email.as_str(), "01712345678@gmail.com");
/// assert_eq!(email.phone(), phone);
///
/// assert!(IdentityEmail::parse("someone@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct IdentityEmail(String);

impl IdentityEmail {
    /// Domain appended to every phone number.
    pub const DOMAIN: &'static str = "gmail.com";

    /// Build the identifier for a phone number.
    #[must_use]
    pub fn from_phone(phone: &PhoneNumber) -> Self {
        Self(format!("{phone}@{}", Self::DOMAIN))
    }

    /// Parse an `IdentityEmail` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has no @ symbol, uses another domain,
    /// or its local part is not a valid phone number.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let (local, domain) = s.split_once('@').ok_or(EmailError::MissingAtSymbol)?;

        if !domain.eq_ignore_ascii_case(Self::DOMAIN) {
            return Err(EmailError::WrongDomain {
                expected: Self::DOMAIN,
            });
        }

        let phone = PhoneNumber::parse(local)?;
        Ok(Self::from_phone(&phone))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `IdentityEmail` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the local part of the email (the phone digits).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }

    /// Recover the phone number this identifier was derived from.
    #[must_use]
    pub fn phone(&self) -> PhoneNumber {
        // Construction guarantees the local part is a valid number.
        PhoneNumber::new_unchecked(self.local_part().to_owned())
    }
}

impl fmt::Display for IdentityEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for IdentityEmail {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for IdentityEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&PhoneNumber> for IdentityEmail {
    fn from(phone: &PhoneNumber) -> Self {
        Self::from_phone(phone)
    }
}

impl<'de> Deserialize<'de> for IdentityEmail {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
