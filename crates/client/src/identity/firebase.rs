//! Identity Toolkit REST client.
//!
//! Uses the email/password endpoints (`accounts:signUp`,
//! `accounts:signInWithPassword`, `accounts:update`). The API key travels as
//! the `key` query parameter; error responses carry a code in
//! `error.message`.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use taja_haat_core::IdentityEmail;

use super::{IdentityError, IdentityProvider, IdentitySession};
use crate::config::IdentityConfig;

/// Identity Toolkit client.
#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl FirebaseIdentity {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn call<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, IdentityError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .query(&[("key", self.api_key.expose_secret())])
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(%status, endpoint, "Identity provider returned an error");

        match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => Err(IdentityError::from_code(&envelope.error.message)),
            Err(_) => Err(IdentityError::Provider {
                code: format!("HTTP_{}", status.as_u16()),
            }),
        }
    }

    async fn password_call(
        &self,
        endpoint: &str,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> Result<IdentitySession, IdentityError> {
        let response = self
            .call(
                endpoint,
                &PasswordRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                    return_secure_token: true,
                },
            )
            .await?;

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        Ok(IdentitySession {
            uid: auth.local_id,
            email: email.clone(),
            id_token: SecretString::from(auth.id_token),
            refresh_token: auth.refresh_token.map(SecretString::from),
            display_name: auth.display_name.filter(|n| !n.is_empty()),
        })
    }
}

impl IdentityProvider for FirebaseIdentity {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> Result<IdentitySession, IdentityError> {
        self.password_call("accounts:signUp", email, password).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &IdentityEmail,
        password: &SecretString,
    ) -> Result<IdentitySession, IdentityError> {
        self.password_call("accounts:signInWithPassword", email, password)
            .await
    }

    #[instrument(skip(self, id_token))]
    async fn update_profile(
        &self,
        id_token: &SecretString,
        display_name: &str,
    ) -> Result<(), IdentityError> {
        self.call(
            "accounts:update",
            &UpdateRequest {
                id_token: id_token.expose_secret(),
                display_name,
                return_secure_token: false,
            },
        )
        .await?;

        Ok(())
    }

    async fn sign_out(&self, session: &IdentitySession) -> Result<(), IdentityError> {
        // Tokens are bearer-only; signing out means forgetting them.
        debug!(uid = %session.uid, "Dropped identity tokens");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use taja_haat_core::PhoneNumber;
    use url::Url;

    use super::*;

    async fn stub_provider() -> FirebaseIdentity {
        let app = Router::new()
            .route(
                "/v1/accounts:signUp",
                post(|Json(body): Json<Value>| async move {
                    if body["email"] == "01712345678@gmail.com" {
                        (
                            axum::http::StatusCode::BAD_REQUEST,
                            Json(json!({ "error": { "code": 400, "message": "EMAIL_EXISTS" } })),
                        )
                    } else {
                        (
                            axum::http::StatusCode::OK,
                            Json(json!({
                                "localId": "uid-new",
                                "email": body["email"],
                                "idToken": "token-new",
                                "refreshToken": "refresh-new"
                            })),
                        )
                    }
                }),
            )
            .route(
                "/v1/accounts:signInWithPassword",
                post(|| async {
                    (
                        axum::http::StatusCode::BAD_REQUEST,
                        Json(json!({ "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" } })),
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        FirebaseIdentity::new(&IdentityConfig {
            api_key: SecretString::from("AIzaSyD4-k9Qx7Lm2Pw8Zr5Tn1Vb6Hc3Jf0Ge"),
            base_url: Url::parse(&format!("http://{addr}/v1")).unwrap(),
        })
        .unwrap()
    }

    fn email(phone: &str) -> IdentityEmail {
        PhoneNumber::parse(phone).unwrap().identity_email()
    }

    #[tokio::test]
    async fn test_sign_up_success() {
        let provider = stub_provider().await;

        let session = provider
            .sign_up(&email("01812345678"), &SecretString::from("secret1"))
            .await
            .unwrap();

        assert_eq!(session.uid, "uid-new");
        assert_eq!(session.id_token.expose_secret(), "token-new");
        assert_eq!(session.email.as_str(), "01812345678@gmail.com");
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_maps_to_account_exists() {
        let provider = stub_provider().await;

        let err = provider
            .sign_up(&email("01712345678"), &SecretString::from("secret1"))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::AccountExists));
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let provider = stub_provider().await;

        let err = provider
            .sign_in(&email("01712345678"), &SecretString::from("nope123"))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::WrongCredential));
    }
}
