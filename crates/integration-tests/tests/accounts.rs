//! Registration, login and logout against a live backend.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use taja_haat_client::AuthError;
use taja_haat_client::SessionState;
use taja_haat_client::session::DemoOtp;
use taja_haat_core::Role;
use taja_haat_integration_tests::{PASSWORD, TestContext, form, phone};

#[tokio::test]
async fn test_registration_needs_the_right_code() {
    let ctx = TestContext::new().await;
    let mut device = ctx.device();

    device
        .session
        .start_registration(form("Karim Uddin", "01712345678", Role::Farmer))
        .await
        .unwrap();
    assert!(matches!(device.session.state(), SessionState::OtpPending(_)));

    let err = device
        .session
        .complete_registration("000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOtp));
    assert!(matches!(device.session.state(), SessionState::OtpPending(_)));
    assert!(
        ctx.api
            .get_user_by_phone(&phone("01712345678"))
            .await
            .unwrap()
            .is_none()
    );

    let user = device
        .session
        .complete_registration(DemoOtp::CODE)
        .await
        .unwrap();

    assert_eq!(user.role, Role::Farmer);
    assert!(user.is_phone_verified);
    assert_eq!(device.session.redirect_path(), "/farmer-dashboard");
    let stored = ctx
        .api
        .get_user_by_phone(&phone("01712345678"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "Karim Uddin");
}

#[tokio::test]
async fn test_phone_can_only_register_once() {
    let ctx = TestContext::new().await;
    ctx.registered("Karim Uddin", "01712345678", Role::Farmer)
        .await;

    let mut second = ctx.device();
    let err = second
        .session
        .start_registration(form("Someone Else", "01712345678", Role::Buyer))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::AccountExists));
    assert!(matches!(second.session.state(), SessionState::Anonymous));
}

#[tokio::test]
async fn test_login_on_another_device_and_logout() {
    let ctx = TestContext::new().await;
    let mut first = ctx
        .registered("Rahima Begum", "01812345678", Role::Buyer)
        .await;
    first.session.logout().await;
    assert!(matches!(first.session.state(), SessionState::Anonymous));
    assert_eq!(first.session.redirect_path(), "/login");

    let mut phone_device = ctx.device();
    let err = phone_device
        .session
        .login("01812345678", &SecretString::from("wrong-password"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::WrongCredential));

    let user = phone_device
        .session
        .login("01812345678", &SecretString::from(PASSWORD))
        .await
        .unwrap();
    assert_eq!(user.role, Role::Buyer);
    assert!(user.backend_user.is_some());
    assert_eq!(phone_device.session.redirect_path(), "/buyer-dashboard");

    // Login before any account exists for the number
    let err = ctx
        .device()
        .session
        .login("01999999999", &SecretString::from(PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}
