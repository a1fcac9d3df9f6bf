//! Identity provider error types.

use thiserror::Error;

/// Errors reported by an identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// An account already exists for the email.
    #[error("account already exists")]
    AccountExists,

    /// The provider rejected the password as too weak.
    #[error("password is too weak")]
    WeakCredential,

    /// No account exists for the email.
    #[error("account not found")]
    NotFound,

    /// Wrong password for an existing account.
    #[error("wrong credentials")]
    WrongCredential,

    /// The provider could not parse the email identifier.
    #[error("malformed identifier")]
    MalformedIdentifier,

    /// The account has been disabled by an administrator.
    #[error("account disabled")]
    AccountDisabled,

    /// The provider is throttling this client.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// Any other provider error code.
    #[error("provider error {code}")]
    Provider { code: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider response did not parse.
    #[error("parse error: {0}")]
    Parse(String),
}

impl IdentityError {
    /// Map a provider error code to an error.
    ///
    /// Codes may carry a detail suffix (`WEAK_PASSWORD : Password should be
    /// at least 6 characters`); only the leading code is matched.
    #[must_use]
    pub fn from_code(message: &str) -> Self {
        let code = message
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .trim();

        match code {
            "EMAIL_EXISTS" => Self::AccountExists,
            "WEAK_PASSWORD" => Self::WeakCredential,
            "EMAIL_NOT_FOUND" => Self::NotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::WrongCredential,
            "INVALID_EMAIL" => Self::MalformedIdentifier,
            "USER_DISABLED" => Self::AccountDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            other => Self::Provider {
                code: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert!(matches!(
            IdentityError::from_code("EMAIL_EXISTS"),
            IdentityError::AccountExists
        ));
        assert!(matches!(
            IdentityError::from_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            IdentityError::WeakCredential
        ));
        assert!(matches!(
            IdentityError::from_code("INVALID_LOGIN_CREDENTIALS"),
            IdentityError::WrongCredential
        ));
        assert!(matches!(
            IdentityError::from_code("USER_DISABLED"),
            IdentityError::AccountDisabled
        ));
        assert!(matches!(
            IdentityError::from_code("OPERATION_NOT_ALLOWED"),
            IdentityError::Provider { ref code } if code == "OPERATION_NOT_ALLOWED"
        ));
    }
}
