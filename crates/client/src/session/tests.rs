use std::sync::Arc;

use secrecy::SecretString;
use taja_haat_core::{PhoneNumber, Role};

use super::*;
use crate::identity::MemoryIdentity;
use crate::test_support::UserStub;

type Manager = SessionManager<Arc<MemoryIdentity>, Arc<MemorySessionStore>>;

struct Harness {
    stub: UserStub,
    identity: Arc<MemoryIdentity>,
    store: Arc<MemorySessionStore>,
    api: ApiClient,
}

impl Harness {
    async fn new() -> Self {
        let stub = UserStub::default();
        let api = stub.client().await;
        Self {
            stub,
            identity: Arc::new(MemoryIdentity::new()),
            store: Arc::new(MemorySessionStore::new()),
            api,
        }
    }

    fn manager(&self) -> Manager {
        SessionManager::new(
            self.api.clone(),
            Arc::clone(&self.identity),
            Arc::clone(&self.store),
        )
    }
}

fn form(phone: &str) -> RegistrationForm {
    RegistrationForm {
        name: "Karim Uddin".to_string(),
        phone: phone.to_string(),
        password: SecretString::from("secret1"),
        role: Role::Farmer,
        address: "Bogura".to_string(),
        image: None,
    }
}

async fn registered(harness: &Harness, phone: &str) -> Manager {
    let mut manager = harness.manager();
    manager.start_registration(form(phone)).await.unwrap();
    manager.complete_registration(DemoOtp::CODE).await.unwrap();
    manager
}

#[tokio::test]
async fn test_registration_with_demo_code() {
    let harness = Harness::new().await;
    let mut manager = harness.manager();

    let pending = manager.start_registration(form("01712345678")).await.unwrap();
    assert_eq!(pending.email.as_str(), "01712345678@gmail.com");
    assert_eq!(manager.redirect_path(), VERIFY_OTP_PATH);

    let user = manager.complete_registration("123456").await.unwrap();

    assert_eq!(user.phone.as_str(), "01712345678");
    assert_eq!(user.role, Role::Farmer);
    assert!(user.is_phone_verified);
    assert_eq!(manager.redirect_path(), "/farmer-dashboard");
    assert_eq!(harness.stub.count(), 1);
    assert_eq!(
        harness.identity.display_name(&pending.email).as_deref(),
        Some("Karim Uddin")
    );
    assert!(
        harness
            .store
            .get(Scope::Session, keys::PENDING_REGISTRATION)
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_wrong_code_keeps_registration_pending() {
    let harness = Harness::new().await;
    let mut manager = harness.manager();
    manager.start_registration(form("01712345678")).await.unwrap();

    let err = manager.complete_registration("000000").await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidOtp));
    assert_eq!(err.user_message(), "Invalid OTP. Please try again.");
    assert!(matches!(manager.state(), SessionState::OtpPending(_)));
    assert!(manager.current_user().is_none());
    assert_eq!(harness.stub.count(), 0);

    manager.complete_registration("123456").await.unwrap();
    assert!(manager.current_user().is_some());
}

#[tokio::test]
async fn test_malformed_phones_rejected() {
    let harness = Harness::new().await;
    let mut manager = harness.manager();

    for phone in ["0171234567", "017123456789", "02712345678", "01712-45678", ""] {
        let err = manager.start_registration(form(phone)).await.unwrap_err();
        assert!(
            matches!(err, AuthError::MalformedIdentifier(_)),
            "{phone:?} gave {err:?}"
        );
    }
    assert!(matches!(manager.state(), SessionState::Anonymous));
}

#[tokio::test]
async fn test_form_validation() {
    let harness = Harness::new().await;
    let mut manager = harness.manager();

    let mut weak = form("01712345678");
    weak.password = SecretString::from("12345");
    assert!(matches!(
        manager.start_registration(weak).await,
        Err(AuthError::WeakCredential)
    ));

    let mut nameless = form("01712345678");
    nameless.name = "   ".to_string();
    assert!(matches!(
        manager.start_registration(nameless).await,
        Err(AuthError::InvalidName)
    ));
}

#[tokio::test]
async fn test_existing_phone_rejected_at_start() {
    let harness = Harness::new().await;
    registered(&harness, "01712345678").await.logout().await;

    let err = harness
        .manager()
        .start_registration(form("01712345678"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::AccountExists));
}

#[tokio::test]
async fn test_complete_without_pending() {
    let harness = Harness::new().await;

    let err = harness
        .manager()
        .complete_registration("123456")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NoPendingRegistration));
}

#[tokio::test]
async fn test_backend_failure_keeps_pending_and_retry_succeeds() {
    let harness = Harness::new().await;
    let mut manager = harness.manager();
    manager.start_registration(form("01712345678")).await.unwrap();

    harness.stub.set_fail_create(true);
    let err = manager.complete_registration("123456").await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::Status { status: 503, .. })));
    assert!(matches!(manager.state(), SessionState::OtpPending(_)));

    // The provider account now exists; the retry signs in to it
    let SessionState::OtpPending(pending) = manager.state() else {
        panic!("registration should still be pending");
    };
    assert!(pending.provider_uid.is_some());
    harness.stub.set_fail_create(false);
    manager.complete_registration("123456").await.unwrap();
    assert_eq!(harness.stub.count(), 1);
}

#[tokio::test]
async fn test_provider_account_from_elsewhere_is_account_exists() {
    let harness = Harness::new().await;
    let phone = PhoneNumber::parse("01712345678").unwrap();
    harness
        .identity
        .sign_up(&phone.identity_email(), &SecretString::from("other-pass"))
        .await
        .unwrap();

    let mut manager = harness.manager();
    manager.start_registration(form("01712345678")).await.unwrap();
    let err = manager.complete_registration("123456").await.unwrap_err();

    assert!(matches!(err, AuthError::AccountExists));
    assert!(matches!(manager.state(), SessionState::OtpPending(_)));
    assert_eq!(harness.stub.count(), 0);
}

#[tokio::test]
async fn test_pending_password_stays_off_disk() {
    let harness = Harness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::open(dir.path()).unwrap());
    let mut manager = SessionManager::new(
        harness.api.clone(),
        Arc::clone(&harness.identity),
        Arc::clone(&store),
    );

    manager.start_registration(form("01712345678")).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("session.json")).unwrap();
    assert!(raw.contains("01712345678"));
    assert!(!raw.contains("secret1"));
    assert!(!raw.contains("password"));

    // A later process has to ask for the password again
    let mut resumed = SessionManager::new(
        harness.api.clone(),
        Arc::clone(&harness.identity),
        Arc::clone(&store),
    );
    resumed.restore().unwrap();
    assert!(matches!(
        resumed.complete_registration("123456").await,
        Err(AuthError::PasswordRequired)
    ));
    assert!(matches!(
        resumed.supply_password(SecretString::from("123")),
        Err(AuthError::WeakCredential)
    ));
    resumed
        .supply_password(SecretString::from("secret1"))
        .unwrap();
    resumed.complete_registration("123456").await.unwrap();

    assert!(resumed.current_user().is_some());
    let raw = std::fs::read_to_string(dir.path().join("session.json")).unwrap();
    assert!(!raw.contains(keys::PENDING_REGISTRATION));
}

#[tokio::test]
async fn test_registration_without_image_gets_avatar() {
    let harness = Harness::new().await;
    let manager = registered(&harness, "01712345678").await;

    let user = manager.current_user().unwrap();
    let image = user.backend_user.as_ref().unwrap().image.clone().unwrap();
    assert_eq!(
        image,
        "https://ui-avatars.com/api/?name=Karim%20Uddin&background=random"
    );
}

#[tokio::test]
async fn test_login_and_logout() {
    let harness = Harness::new().await;
    registered(&harness, "01712345678").await.logout().await;

    let mut manager = harness.manager();
    let user = manager
        .login("01712345678", &SecretString::from("secret1"))
        .await
        .unwrap();
    assert_eq!(user.name, "Karim Uddin");
    assert!(user.backend_user.is_some());

    manager.logout().await;

    assert!(matches!(manager.state(), SessionState::Anonymous));
    assert_eq!(manager.redirect_path(), LOGIN_PATH);
    assert!(harness.store.get(Scope::Local, keys::USER).unwrap().is_none());
}

#[tokio::test]
async fn test_login_failures() {
    let harness = Harness::new().await;
    registered(&harness, "01712345678").await.logout().await;
    let mut manager = harness.manager();

    assert!(matches!(
        manager.login("0171234", &SecretString::from("secret1")).await,
        Err(AuthError::MalformedIdentifier(_))
    ));
    assert!(matches!(
        manager.login("01712345678", &SecretString::from("wrong-1")).await,
        Err(AuthError::WrongCredential)
    ));
    assert!(matches!(
        manager.login("01899999999", &SecretString::from("secret1")).await,
        Err(AuthError::NotFound)
    ));

    let phone = PhoneNumber::parse("01712345678").unwrap();
    harness.identity.disable(&phone.identity_email());
    assert!(matches!(
        manager.login("01712345678", &SecretString::from("secret1")).await,
        Err(AuthError::AccountDisabled)
    ));
    assert!(matches!(manager.state(), SessionState::Anonymous));
}

#[tokio::test]
async fn test_logout_clears_pending_registration() {
    let harness = Harness::new().await;
    let mut manager = harness.manager();
    manager.start_registration(form("01712345678")).await.unwrap();

    manager.logout().await;

    assert!(matches!(manager.state(), SessionState::Anonymous));
    assert!(
        harness
            .store
            .get(Scope::Session, keys::PENDING_REGISTRATION)
            .unwrap()
            .is_none()
    );
    assert!(matches!(
        manager.complete_registration("123456").await,
        Err(AuthError::NoPendingRegistration)
    ));
}

#[tokio::test]
async fn test_recall_record_has_no_password() {
    let harness = Harness::new().await;
    let manager = registered(&harness, "01712345678").await;

    let recall = manager.recall().unwrap().unwrap();
    assert_eq!(recall.phone.as_str(), "01712345678");
    assert_eq!(recall.role, Role::Farmer);

    let raw = harness.store.get(Scope::Local, keys::RECALL).unwrap().unwrap();
    assert!(!raw.to_string().contains("secret1"));
    assert!(raw.get("password").is_none());
}

#[tokio::test]
async fn test_restore() {
    let harness = Harness::new().await;

    let mut pending = harness.manager();
    pending.start_registration(form("01712345678")).await.unwrap();
    let mut restored = harness.manager();
    assert!(matches!(restored.restore().unwrap(), SessionState::OtpPending(_)));

    restored
        .supply_password(SecretString::from("secret1"))
        .unwrap();
    restored.complete_registration("123456").await.unwrap();
    let mut restored_again = harness.manager();
    assert!(matches!(
        restored_again.restore().unwrap(),
        SessionState::Authenticated(user) if user.phone.as_str() == "01712345678"
    ));

    restored_again.logout().await;
    let mut after_logout = harness.manager();
    assert!(matches!(after_logout.restore().unwrap(), SessionState::Anonymous));
}

#[tokio::test]
async fn test_cannot_register_while_signed_in() {
    let harness = Harness::new().await;
    let mut manager = registered(&harness, "01712345678").await;

    assert!(matches!(
        manager.start_registration(form("01812345678")).await,
        Err(AuthError::AlreadyAuthenticated)
    ));
}
