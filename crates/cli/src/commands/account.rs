//! Account commands: register, verify, login, logout, whoami.
//!
//! Registration takes two invocations. `register` stores the pending form
//! in the session scope, without the password, and `verify` completes it
//! with the code sent to the phone (`123456` while SMS verification is
//! simulated) and the password again.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::debug;

use taja_haat_client::AuthError;
use taja_haat_client::integrations::ImageUpload;
use taja_haat_client::session::{RegistrationForm, SessionState};
use taja_haat_core::Role;

use super::context::{CliResult, Context};
use super::say;

/// Form fields collected from the command line.
pub struct RegisterArgs {
    pub name: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
    pub address: String,
    pub image: Option<PathBuf>,
}

fn friendly(err: AuthError) -> Box<dyn std::error::Error> {
    debug!(error = %err, "Session operation failed");
    err.user_message().into()
}

fn read_image(path: &Path) -> CliResult<ImageUpload> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(ImageUpload { file_name, bytes })
}

/// Start a registration.
///
/// # Errors
///
/// Returns the form-level message for invalid input or an existing account.
pub async fn register(ctx: &Context, args: RegisterArgs) -> CliResult {
    let mut session = ctx.session()?;
    let image = args.image.as_deref().map(read_image).transpose()?;

    let pending = session
        .start_registration(RegistrationForm {
            name: args.name,
            phone: args.phone,
            password: SecretString::from(args.password),
            role: args.role,
            address: args.address,
            image,
        })
        .await
        .map_err(friendly)?;

    say(format!(
        "Verification code sent to {}. Run `haat verify <code> --password <password>` to finish.",
        pending.phone
    ));
    Ok(())
}

/// Finish a registration with the verification code.
///
/// # Errors
///
/// Returns the form-level message for a wrong code or a failed sign-up.
pub async fn verify(ctx: &Context, code: &str, password: String) -> CliResult {
    let mut session = ctx.session()?;
    session
        .supply_password(SecretString::from(password))
        .map_err(friendly)?;
    let user = session
        .complete_registration(code)
        .await
        .map_err(friendly)?;

    say(format!("Welcome, {}! You are registered as a {}.", user.name, user.role));
    say(format!("Dashboard: {}", session.redirect_path()));
    Ok(())
}

/// Sign in.
///
/// # Errors
///
/// Returns the form-level message for bad credentials.
pub async fn login(ctx: &Context, phone: &str, password: String) -> CliResult {
    let mut session = ctx.session()?;
    let user = session
        .login(phone, &SecretString::from(password))
        .await
        .map_err(friendly)?;

    say(format!("Signed in as {} ({}).", user.name, user.role));
    say(format!("Dashboard: {}", session.redirect_path()));
    Ok(())
}

/// Sign out and clear the local session.
///
/// # Errors
///
/// Returns an error if identity settings are missing.
pub async fn logout(ctx: &Context) -> CliResult {
    let mut session = ctx.session()?;
    session.logout().await;
    say("Signed out.");
    Ok(())
}

/// Show who is signed in, or what is pending.
///
/// # Errors
///
/// Returns an error if identity settings are missing or the store is
/// unreadable.
pub fn whoami(ctx: &Context) -> CliResult {
    let session = ctx.session()?;
    match session.state() {
        SessionState::Authenticated(user) => {
            say(format!("{} <{}>", user.name, user.phone));
            say(format!("Role: {}", user.role));
            say(format!(
                "Phone verified: {}",
                if user.is_phone_verified { "yes" } else { "no" }
            ));
        }
        SessionState::OtpPending(pending) => {
            say(format!(
                "Registration for {} is waiting for its verification code.",
                pending.phone
            ));
        }
        SessionState::Anonymous => {
            say("Not signed in.");
            if let Some(recall) = session.recall()? {
                say(format!("Last account on this device: {} ({})", recall.phone, recall.role));
            }
        }
    }
    say(format!("Dashboard: {}", session.redirect_path()));
    Ok(())
}
