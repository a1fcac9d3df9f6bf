//! Shared wiring for commands that talk to the backend.

use std::sync::Arc;

use taja_haat_client::config::ClientConfig;
use taja_haat_client::identity::FirebaseIdentity;
use taja_haat_client::integrations::{ImageHost, SmsNotifier};
use taja_haat_client::session::{DemoOtp, Scope, SessionStore, keys};
use taja_haat_client::{
    ApiClient, CommunityBoard, FileSessionStore, OrderDesk, SessionManager, SessionUser,
};
use taja_haat_core::Role;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub type Session = SessionManager<FirebaseIdentity, Arc<FileSessionStore>, DemoOtp>;

/// Configuration, local store and backend client for one invocation.
pub struct Context {
    pub config: ClientConfig,
    pub store: Arc<FileSessionStore>,
    pub api: ApiClient,
}

impl Context {
    /// Load settings and open the local store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the data
    /// directory cannot be opened.
    pub fn load() -> CliResult<Self> {
        let config = ClientConfig::from_env()?;
        let store = Arc::new(FileSessionStore::open(&config.data_dir)?);
        let api = ApiClient::new(&config.api_base_url)?;
        tracing::debug!(data_dir = %config.data_dir.display(), api = api.base_url(), "Loaded client context");
        Ok(Self { config, store, api })
    }

    /// A session manager restored from the local store.
    ///
    /// # Errors
    ///
    /// Returns an error if identity settings are missing or the stored
    /// session cannot be read.
    pub fn session(&self) -> CliResult<Session> {
        let identity = FirebaseIdentity::new(self.config.require_identity()?)?;
        let mut session = SessionManager::with_parts(
            self.api.clone(),
            identity,
            Arc::clone(&self.store),
            DemoOtp,
            ImageHost::new(self.config.imgbb.clone()),
        );
        session.restore()?;
        Ok(session)
    }

    /// The signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is signed in.
    pub fn current_user(&self) -> CliResult<SessionUser> {
        self.store
            .load::<SessionUser>(Scope::Local, keys::USER)?
            .ok_or_else(|| "Not signed in. Run `haat login` first.".into())
    }

    /// The signed-in user, who must have `role`.
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is signed in or the role differs.
    pub fn current_user_as(&self, role: Role) -> CliResult<SessionUser> {
        let user = self.current_user()?;
        if user.role != role {
            return Err(format!("This command is for {role} accounts; you are signed in as {}.", user.role).into());
        }
        Ok(user)
    }

    pub fn order_desk(&self) -> OrderDesk<Arc<FileSessionStore>> {
        OrderDesk::new(
            self.api.clone(),
            Arc::clone(&self.store),
            self.config.sms.clone().map(SmsNotifier::new),
        )
    }

    pub fn community(&self) -> CommunityBoard<Arc<FileSessionStore>> {
        CommunityBoard::new(Arc::clone(&self.store), Some(self.api.clone()))
    }
}
