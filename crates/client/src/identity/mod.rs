//! Identity provider port.
//!
//! The marketplace keys accounts by phone number, but the provider only
//! knows email/password accounts. Callers pass the synthetic
//! [`IdentityEmail`] derived from the phone; the provider never sees the
//! raw number.

mod error;
pub mod firebase;
pub mod memory;

use std::future::Future;

use secrecy::SecretString;
use taja_haat_core::IdentityEmail;

pub use error::IdentityError;
pub use firebase::FirebaseIdentity;
pub use memory::MemoryIdentity;

/// A signed-in provider account.
#[derive(Debug, Clone)]
pub struct IdentitySession {
    /// Provider account id.
    pub uid: String,
    pub email: IdentityEmail,
    pub id_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub display_name: Option<String>,
}

/// An email/password identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    fn sign_up(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> impl Future<Output = Result<IdentitySession, IdentityError>> + Send;

    /// Sign in to an existing account.
    fn sign_in(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> impl Future<Output = Result<IdentitySession, IdentityError>> + Send;

    /// Set the account's display name.
    fn update_profile(
        &self,
        id_token: &SecretString,
        display_name: &str,
    ) -> impl Future<Output = Result<(), IdentityError>> + Send;

    /// End the provider session.
    fn sign_out(
        &self,
        session: &IdentitySession,
    ) -> impl Future<Output = Result<(), IdentityError>> + Send;
}

impl<P: IdentityProvider> IdentityProvider for std::sync::Arc<P> {
    fn sign_up(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> impl Future<Output = Result<IdentitySession, IdentityError>> + Send {
        (**self).sign_up(email, password)
    }

    fn sign_in(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> impl Future<Output = Result<IdentitySession, IdentityError>> + Send {
        (**self).sign_in(email, password)
    }

    fn update_profile(
        &self,
        id_token: &SecretString,
        display_name: &str,
    ) -> impl Future<Output = Result<(), IdentityError>> + Send {
        (**self).update_profile(id_token, display_name)
    }

    fn sign_out(
        &self,
        session: &IdentitySession,
    ) -> impl Future<Output = Result<(), IdentityError>> + Send {
        (**self).sign_out(session)
    }
}
