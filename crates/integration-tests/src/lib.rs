//! End-to-end tests for Taja Haat.
//!
//! Each test starts the backend router on an ephemeral port over a fresh
//! in-memory `SQLite` database and drives it through the client library.
//! The identity provider is the in-memory adapter and every simulated
//! device gets its own in-memory session store.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p taja-haat-integration-tests
//! ```

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::SqlitePool;
use url::Url;

use taja_haat_backend::config::BackendConfig;
use taja_haat_backend::db::{self, ProductRepository};
use taja_haat_backend::state::AppState;
use taja_haat_client::identity::MemoryIdentity;
use taja_haat_client::session::{DemoOtp, MemorySessionStore, RegistrationForm};
use taja_haat_client::{ApiClient, CommunityBoard, OrderDesk, SessionManager, SessionUser};
use taja_haat_core::{NewProduct, PhoneNumber, Product, Role, Taka};

/// Password every test account uses.
pub const PASSWORD: &str = "secret1";

pub type Session = SessionManager<Arc<MemoryIdentity>, Arc<MemorySessionStore>>;

/// A running backend plus the shared identity provider.
pub struct TestContext {
    pub base_url: Url,
    pub api: ApiClient,
    pub pool: SqlitePool,
    pub identity: Arc<MemoryIdentity>,
}

/// One simulated phone or browser.
pub struct Device {
    pub session: Session,
    pub store: Arc<MemorySessionStore>,
}

impl Device {
    /// The signed-in user.
    pub fn user(&self) -> SessionUser {
        self.session.current_user().cloned().unwrap()
    }
}

impl TestContext {
    pub async fn new() -> Self {
        let config = BackendConfig::in_memory();
        let pool = db::create_pool(&config.database_url).await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let app = taja_haat_backend::app(AppState::new(config, pool.clone()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let base_url = Url::parse(&format!("http://{addr}")).unwrap();
        let api = ApiClient::new(&base_url).unwrap();

        Self {
            base_url,
            api,
            pool,
            identity: Arc::new(MemoryIdentity::new()),
        }
    }

    /// A fresh device with nobody signed in.
    pub fn device(&self) -> Device {
        let store = Arc::new(MemorySessionStore::new());
        Device {
            session: SessionManager::new(
                self.api.clone(),
                Arc::clone(&self.identity),
                Arc::clone(&store),
            ),
            store,
        }
    }

    /// A device signed in as a newly registered user.
    pub async fn registered(&self, name: &str, phone: &str, role: Role) -> Device {
        let mut device = self.device();
        device
            .session
            .start_registration(form(name, phone, role))
            .await
            .unwrap();
        device
            .session
            .complete_registration(DemoOtp::CODE)
            .await
            .unwrap();
        device
    }

    pub fn order_desk(&self, device: &Device) -> OrderDesk<Arc<MemorySessionStore>> {
        OrderDesk::new(self.api.clone(), Arc::clone(&device.store), None)
    }

    pub fn community(&self, device: &Device) -> CommunityBoard<Arc<MemorySessionStore>> {
        CommunityBoard::new(Arc::clone(&device.store), Some(self.api.clone()))
    }

    /// Insert a listing straight into the database.
    pub async fn product(&self, seller: &SessionUser, name: &str, price: Decimal) -> Product {
        ProductRepository::new(&self.pool)
            .create(&NewProduct {
                name: name.to_string(),
                category: "vegetables".to_string(),
                description: String::new(),
                unit: "kg".to_string(),
                price_per_unit: Taka::new(price),
                quantity_available: 500,
                seller_phone: seller.phone.clone(),
                seller_name: seller.name.clone(),
                image: None,
            })
            .await
            .unwrap()
    }
}

/// A valid registration form.
pub fn form(name: &str, phone: &str, role: Role) -> RegistrationForm {
    RegistrationForm {
        name: name.to_string(),
        phone: phone.to_string(),
        password: SecretString::from(PASSWORD),
        role,
        address: "Bogura Sadar".to_string(),
        image: None,
    }
}

pub fn phone(raw: &str) -> PhoneNumber {
    PhoneNumber::parse(raw).unwrap()
}
