//! Session state machine.
//!
//! ```text
//! Anonymous ──start_registration──▶ OtpPending ──complete_registration──▶ Authenticated
//! Anonymous ──login───────────────────────────────────────────────────────▶ Authenticated
//! any ──logout──▶ Anonymous
//! ```
//!
//! [`SessionManager`] is the only owner of session state. Identity, storage
//! and OTP checking are injected, so the same machine runs against the
//! hosted provider and a file store in the CLI, and against in-memory
//! doubles in tests.

pub mod otp;
pub mod store;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use taja_haat_core::{Actor, IdentityEmail, NewUser, PhoneError, PhoneNumber, Role, User};

use crate::api::{ApiClient, ApiError};
use crate::identity::{IdentityError, IdentityProvider, IdentitySession};
use crate::integrations::images::{ImageHost, ImageUpload};

pub use otp::{DemoOtp, OtpVerifier};
pub use store::{FileSessionStore, MemorySessionStore, Scope, SessionStore, StoreError, keys};

/// Shortest password the registration form accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Route for the OTP entry form.
pub const VERIFY_OTP_PATH: &str = "/verify-otp";

/// Route for the login form.
pub const LOGIN_PATH: &str = "/login";

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("name is required")]
    InvalidName,

    #[error("malformed phone number: {0}")]
    MalformedIdentifier(String),

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakCredential,

    #[error("an account already exists for this phone number")]
    AccountExists,

    #[error("invalid verification code")]
    InvalidOtp,

    #[error("no registration is waiting for verification")]
    NoPendingRegistration,

    #[error("the registration password must be entered again")]
    PasswordRequired,

    #[error("already signed in")]
    AlreadyAuthenticated,

    #[error("no account for this phone number")]
    NotFound,

    #[error("wrong phone number or password")]
    WrongCredential,

    #[error("account disabled")]
    AccountDisabled,

    #[error("too many attempts")]
    TooManyAttempts,

    #[error("identity provider error: {0}")]
    Identity(IdentityError),

    #[error("backend error: {0}")]
    Api(#[from] ApiError),

    #[error("session storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::AccountExists => Self::AccountExists,
            IdentityError::WeakCredential => Self::WeakCredential,
            IdentityError::NotFound => Self::NotFound,
            IdentityError::WrongCredential => Self::WrongCredential,
            IdentityError::MalformedIdentifier => {
                Self::MalformedIdentifier("rejected by identity provider".to_string())
            }
            IdentityError::AccountDisabled => Self::AccountDisabled,
            IdentityError::TooManyAttempts => Self::TooManyAttempts,
            other => Self::Identity(other),
        }
    }
}

impl From<PhoneError> for AuthError {
    fn from(err: PhoneError) -> Self {
        Self::MalformedIdentifier(err.to_string())
    }
}

impl AuthError {
    /// Text for the form-level error line.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidName => "Please enter your name.".to_string(),
            Self::MalformedIdentifier(_) => {
                "Enter an 11-digit mobile number starting with 01.".to_string()
            }
            Self::WeakCredential => {
                format!("Password must be at least {MIN_PASSWORD_LEN} characters.")
            }
            Self::AccountExists => {
                "This phone number is already registered. Please log in.".to_string()
            }
            Self::InvalidOtp => "Invalid OTP. Please try again.".to_string(),
            Self::NoPendingRegistration => {
                "Your registration has expired. Please register again.".to_string()
            }
            Self::PasswordRequired => {
                "Please enter your password again to finish registering.".to_string()
            }
            Self::AlreadyAuthenticated => "You are already logged in.".to_string(),
            Self::NotFound => "No account found for this phone number.".to_string(),
            Self::WrongCredential => "Wrong phone number or password.".to_string(),
            Self::AccountDisabled => "This account has been disabled.".to_string(),
            Self::TooManyAttempts => {
                "Too many attempts. Please wait a moment and try again.".to_string()
            }
            Self::Identity(_) | Self::Api(_) | Self::Store(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

/// What the registration form collects.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub name: String,
    pub phone: String,
    pub password: SecretString,
    pub role: Role,
    pub address: String,
    pub image: Option<ImageUpload>,
}

/// A registration waiting for its OTP. Lives in [`Scope::Session`].
///
/// The password is held in memory only. A registration restored from the
/// store needs [`SessionManager::supply_password`] before it can finish.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub name: String,
    pub phone: PhoneNumber,
    pub email: IdentityEmail,
    #[serde(skip)]
    password: Option<SecretString>,
    /// Provider account created by an attempt that failed afterwards.
    #[serde(default)]
    pub provider_uid: Option<String>,
    pub role: Role,
    pub address: String,
    pub image: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl std::fmt::Debug for PendingRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRegistration")
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("provider_uid", &self.provider_uid)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Lets the login form prefill the last account. Never holds the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallRecord {
    pub phone: PhoneNumber,
    pub name: String,
    pub role: Role,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Identity provider account id.
    pub uid: String,
    pub name: String,
    pub phone: PhoneNumber,
    pub role: Role,
    pub is_phone_verified: bool,
    pub created_at: DateTime<Utc>,
    /// The backend's record, refreshed at login.
    #[serde(default)]
    pub backend_user: Option<User>,
}

impl SessionUser {
    /// This user as an order actor.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::new(self.role, self.phone.clone())
    }

    fn from_backend(uid: String, user: User) -> Self {
        Self {
            uid,
            name: user.name.clone(),
            phone: user.phone.clone(),
            role: user.role,
            is_phone_verified: user.is_phone_verified,
            created_at: user.created_at,
            backend_user: Some(user),
        }
    }
}

/// Where the session stands.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    OtpPending(PendingRegistration),
    Authenticated(SessionUser),
}

/// Owns the session and drives every auth transition.
pub struct SessionManager<P, S, V = DemoOtp> {
    api: ApiClient,
    identity: P,
    store: S,
    otp: V,
    images: ImageHost,
    state: SessionState,
    identity_session: Option<IdentitySession>,
}

impl<P, S> SessionManager<P, S, DemoOtp>
where
    P: IdentityProvider,
    S: SessionStore,
{
    /// Create a manager with the demo OTP and no image host.
    #[must_use]
    pub fn new(api: ApiClient, identity: P, store: S) -> Self {
        Self::with_parts(api, identity, store, DemoOtp, ImageHost::disabled())
    }
}

impl<P, S, V> SessionManager<P, S, V>
where
    P: IdentityProvider,
    S: SessionStore,
    V: OtpVerifier,
{
    /// Create a manager from every part.
    #[must_use]
    pub const fn with_parts(api: ApiClient, identity: P, store: S, otp: V, images: ImageHost) -> Self {
        Self {
            api,
            identity,
            store,
            otp,
            images,
            state: SessionState::Anonymous,
            identity_session: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn current_user(&self) -> Option<&SessionUser> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Rebuild state from the store.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the store cannot be read.
    pub fn restore(&mut self) -> Result<&SessionState, AuthError> {
        self.state = if let Some(user) = self.store.load::<SessionUser>(Scope::Local, keys::USER)? {
            SessionState::Authenticated(user)
        } else if let Some(pending) = self
            .store
            .load::<PendingRegistration>(Scope::Session, keys::PENDING_REGISTRATION)?
        {
            SessionState::OtpPending(pending)
        } else {
            SessionState::Anonymous
        };

        Ok(&self.state)
    }

    /// The last account that signed in on this device.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the store cannot be read.
    pub fn recall(&self) -> Result<Option<RecallRecord>, AuthError> {
        Ok(self.store.load(Scope::Local, keys::RECALL)?)
    }

    /// Validate the form and wait for the OTP.
    ///
    /// # Errors
    ///
    /// - `InvalidName`, `MalformedIdentifier` or `WeakCredential` for bad input
    /// - `AccountExists` if the backend already has a user with this phone
    /// - `AlreadyAuthenticated` when someone is signed in
    #[instrument(skip(self, form), fields(phone = %form.phone, role = %form.role))]
    pub async fn start_registration(
        &mut self,
        form: RegistrationForm,
    ) -> Result<PendingRegistration, AuthError> {
        if matches!(self.state, SessionState::Authenticated(_)) {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let name = form.name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidName);
        }
        let phone = PhoneNumber::parse(&form.phone)?;
        if form.password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakCredential);
        }

        if self.api.get_user_by_phone(&phone).await?.is_some() {
            return Err(AuthError::AccountExists);
        }

        let image = self
            .images
            .upload_or_avatar(form.image.as_ref(), name)
            .await;

        let pending = PendingRegistration {
            name: name.to_string(),
            email: phone.identity_email(),
            phone,
            password: Some(form.password),
            provider_uid: None,
            role: form.role,
            address: form.address.trim().to_string(),
            image: Some(image),
            started_at: Utc::now(),
        };
        self.store
            .save(Scope::Session, keys::PENDING_REGISTRATION, &pending)?;
        info!(email = %pending.email, "Registration waiting for OTP");

        self.state = SessionState::OtpPending(pending.clone());
        Ok(pending)
    }

    /// Give a restored registration its password back.
    ///
    /// # Errors
    ///
    /// - `NoPendingRegistration` outside `OtpPending`
    /// - `WeakCredential` for a password the form would have refused
    pub fn supply_password(&mut self, password: SecretString) -> Result<(), AuthError> {
        let SessionState::OtpPending(pending) = &mut self.state else {
            return Err(AuthError::NoPendingRegistration);
        };
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakCredential);
        }
        pending.password = Some(password);
        Ok(())
    }

    /// Check the OTP and create the account.
    ///
    /// A wrong code leaves the registration pending. If the backend refuses
    /// the user, the error is returned and the registration stays pending so
    /// the code can be submitted again; the retry signs in to the provider
    /// account the failed attempt created.
    ///
    /// # Errors
    ///
    /// - `NoPendingRegistration` outside `OtpPending`
    /// - `InvalidOtp` for a wrong code
    /// - `PasswordRequired` for a restored registration without its password
    /// - `AccountExists` if the provider already has an account for the
    ///   phone that this registration did not create
    /// - other identity errors from account creation
    /// - `Api` if the backend user cannot be created
    #[instrument(skip(self, code))]
    pub async fn complete_registration(&mut self, code: &str) -> Result<SessionUser, AuthError> {
        let SessionState::OtpPending(pending) = &self.state else {
            return Err(AuthError::NoPendingRegistration);
        };
        let mut pending = pending.clone();

        if !self.otp.verify(&pending.phone, code) {
            warn!(phone = %pending.phone, "OTP rejected");
            return Err(AuthError::InvalidOtp);
        }
        let password = pending.password.clone().ok_or(AuthError::PasswordRequired)?;

        let session = match self.identity.sign_up(&pending.email, &password).await {
            Ok(session) => {
                pending.provider_uid = Some(session.uid.clone());
                self.store
                    .save(Scope::Session, keys::PENDING_REGISTRATION, &pending)?;
                self.state = SessionState::OtpPending(pending.clone());
                session
            }
            Err(IdentityError::AccountExists) if pending.provider_uid.is_some() => {
                self.identity.sign_in(&pending.email, &password).await?
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self
            .identity
            .update_profile(&session.id_token, &pending.name)
            .await
        {
            warn!(error = %e, "Could not set identity display name");
        }

        let user = self
            .api
            .create_user(&NewUser {
                uid: session.uid.clone(),
                name: pending.name.clone(),
                phone: pending.phone.clone(),
                role: pending.role,
                address: pending.address.clone(),
                image: pending.image.clone(),
                is_phone_verified: true,
            })
            .await?;

        let recall = RecallRecord {
            phone: user.phone.clone(),
            name: user.name.clone(),
            role: user.role,
        };
        let session_user = SessionUser::from_backend(session.uid.clone(), user);

        self.store.save(Scope::Local, keys::RECALL, &recall)?;
        self.store.save(Scope::Local, keys::USER, &session_user)?;
        self.store
            .remove(Scope::Session, keys::PENDING_REGISTRATION)?;
        info!(uid = %session_user.uid, role = %session_user.role, "Registration complete");

        self.identity_session = Some(session);
        self.state = SessionState::Authenticated(session_user.clone());
        Ok(session_user)
    }

    /// Sign in with phone and password.
    ///
    /// # Errors
    ///
    /// - `MalformedIdentifier` for a bad phone
    /// - `NotFound`, `WrongCredential` or `AccountDisabled` from the provider
    /// - `NotFound` if the backend has no user for the phone
    #[instrument(skip(self, password))]
    pub async fn login(
        &mut self,
        phone: &str,
        password: &SecretString,
    ) -> Result<SessionUser, AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        let session = self
            .identity
            .sign_in(&phone.identity_email(), password)
            .await?;

        let user = self
            .api
            .get_user_by_phone(&phone)
            .await?
            .ok_or(AuthError::NotFound)?;

        let session_user = SessionUser::from_backend(session.uid.clone(), user);
        self.store.save(Scope::Local, keys::USER, &session_user)?;
        self.store.save(
            Scope::Local,
            keys::RECALL,
            &RecallRecord {
                phone: session_user.phone.clone(),
                name: session_user.name.clone(),
                role: session_user.role,
            },
        )?;
        info!(uid = %session_user.uid, role = %session_user.role, "Logged in");

        self.identity_session = Some(session);
        self.state = SessionState::Authenticated(session_user.clone());
        Ok(session_user)
    }

    /// Sign out and clear session data. Never fails; problems are logged.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) {
        if let Some(session) = self.identity_session.take() {
            if let Err(e) = self.identity.sign_out(&session).await {
                warn!(error = %e, "Identity sign-out failed");
            }
        }

        if let Err(e) = self.store.remove(Scope::Local, keys::USER) {
            warn!(error = %e, "Could not clear stored user");
        }
        if let Err(e) = self.store.clear(Scope::Session) {
            warn!(error = %e, "Could not clear session scope");
        }

        self.state = SessionState::Anonymous;
        info!("Logged out");
    }

    /// Where the UI should send the user now.
    #[must_use]
    pub const fn redirect_path(&self) -> &'static str {
        match &self.state {
            SessionState::Authenticated(user) => user.role.dashboard_path(),
            SessionState::OtpPending(_) => VERIFY_OTP_PATH,
            SessionState::Anonymous => LOGIN_PATH,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
