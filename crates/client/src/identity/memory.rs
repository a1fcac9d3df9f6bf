//! In-process identity provider.
//!
//! Keeps accounts in a map and applies the same rules as the hosted
//! provider: unique emails, six-character minimum passwords, disabled
//! accounts refused at sign-in. Used by tests and offline demos.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};

use taja_haat_core::IdentityEmail;

use super::{IdentityError, IdentityProvider, IdentitySession};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug)]
struct Account {
    uid: String,
    password: SecretString,
    display_name: Option<String>,
    disabled: bool,
}

/// Identity provider backed by an in-memory map.
#[derive(Debug, Default)]
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the account for `email`; later sign-ins fail.
    pub fn disable(&self, email: &IdentityEmail) {
        if let Some(account) = self.lock().get_mut(email.as_str()) {
            account.disabled = true;
        }
    }

    /// Display name stored for `email`.
    #[must_use]
    pub fn display_name(&self, email: &IdentityEmail) -> Option<String> {
        self.lock()
            .get(email.as_str())
            .and_then(|a| a.display_name.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_for(email: &IdentityEmail, account: &Account) -> IdentitySession {
        IdentitySession {
            uid: account.uid.clone(),
            email: email.clone(),
            id_token: SecretString::from(format!("token-{}", account.uid)),
            refresh_token: None,
            display_name: account.display_name.clone(),
        }
    }
}

impl IdentityProvider for MemoryIdentity {
    async fn sign_up(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> Result<IdentitySession, IdentityError> {
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::WeakCredential);
        }

        let mut accounts = self.lock();
        if accounts.contains_key(email.as_str()) {
            return Err(IdentityError::AccountExists);
        }

        let account = Account {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            password: password.clone(),
            display_name: None,
            disabled: false,
        };
        let session = Self::session_for(email, &account);
        accounts.insert(email.as_str().to_string(), account);

        Ok(session)
    }

    async fn sign_in(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> Result<IdentitySession, IdentityError> {
        let accounts = self.lock();
        let account = accounts
            .get(email.as_str())
            .ok_or(IdentityError::NotFound)?;

        if account.disabled {
            return Err(IdentityError::AccountDisabled);
        }
        if account.password.expose_secret() != password.expose_secret() {
            return Err(IdentityError::WrongCredential);
        }

        Ok(Self::session_for(email, account))
    }

    async fn update_profile(
        &self,
        id_token: &SecretString,
        display_name: &str,
    ) -> Result<(), IdentityError> {
        let uid = id_token
            .expose_secret()
            .strip_prefix("token-")
            .ok_or_else(|| IdentityError::Provider {
                code: "INVALID_ID_TOKEN".to_string(),
            })?
            .to_string();

        let mut accounts = self.lock();
        let account = accounts
            .values_mut()
            .find(|a| a.uid == uid)
            .ok_or(IdentityError::NotFound)?;
        account.display_name = Some(display_name.to_string());

        Ok(())
    }

    async fn sign_out(&self, _session: &IdentitySession) -> Result<(), IdentityError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use taja_haat_core::PhoneNumber;

    use super::*;

    fn email() -> IdentityEmail {
        PhoneNumber::parse("01712345678").unwrap().identity_email()
    }

    fn password(p: &str) -> SecretString {
        SecretString::from(p)
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = MemoryIdentity::new();
        let created = provider.sign_up(&email(), &password("secret1")).await.unwrap();

        let session = provider.sign_in(&email(), &password("secret1")).await.unwrap();

        assert_eq!(session.uid, created.uid);
    }

    #[tokio::test]
    async fn test_rules() {
        let provider = MemoryIdentity::new();

        assert!(matches!(
            provider.sign_up(&email(), &password("12345")).await,
            Err(IdentityError::WeakCredential)
        ));
        provider.sign_up(&email(), &password("secret1")).await.unwrap();
        assert!(matches!(
            provider.sign_up(&email(), &password("secret2")).await,
            Err(IdentityError::AccountExists)
        ));
        assert!(matches!(
            provider.sign_in(&email(), &password("secret2")).await,
            Err(IdentityError::WrongCredential)
        ));

        provider.disable(&email());
        assert!(matches!(
            provider.sign_in(&email(), &password("secret1")).await,
            Err(IdentityError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let provider = MemoryIdentity::new();
        let session = provider.sign_up(&email(), &password("secret1")).await.unwrap();

        provider
            .update_profile(&session.id_token, "Karim Uddin")
            .await
            .unwrap();

        assert_eq!(provider.display_name(&email()).as_deref(), Some("Karim Uddin"));
    }
}
