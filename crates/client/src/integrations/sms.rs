//! Order notifications over a BulkSMS-style HTTP gateway.
//!
//! The gateway takes a form post (`api_key`, `type`, `number`, `senderid`,
//! `message`) and answers `{ "response_code": 202, ... }` when the message
//! was accepted. Numbers are sent in international form (`8801XXXXXXXXX`).

use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use taja_haat_core::{Order, PhoneNumber};

use crate::config::SmsConfig;

/// Gateway code for an accepted message.
const ACCEPTED: i64 = 202;

/// Errors from the messaging gateway.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a code other than 202.
    #[error("gateway rejected message (code {code}): {message}")]
    Rejected { code: i64, message: String },
}

#[derive(Deserialize)]
struct GatewayResponse {
    response_code: i64,
    #[serde(default)]
    error_message: String,
}

/// Messaging gateway client.
#[derive(Debug, Clone)]
pub struct SmsNotifier {
    client: reqwest::Client,
    config: SmsConfig,
}

impl SmsNotifier {
    #[must_use]
    pub fn new(config: SmsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// Returns `SmsError::Rejected` unless the gateway answers 202.
    #[instrument(skip(self, message), fields(to = %to))]
    pub async fn send(&self, to: &PhoneNumber, message: &str) -> Result<(), SmsError> {
        let number = to.international();
        let response = self
            .client
            .post(self.config.api_url.as_str())
            .form(&[
                ("api_key", self.config.api_key.expose_secret()),
                ("type", "text"),
                ("number", number.as_str()),
                ("senderid", self.config.sender_id.as_str()),
                ("message", message),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: GatewayResponse = serde_json::from_str(&text).map_err(|_| SmsError::Rejected {
            code: i64::from(status.as_u16()),
            message: text.clone(),
        })?;

        if body.response_code != ACCEPTED {
            return Err(SmsError::Rejected {
                code: body.response_code,
                message: body.error_message,
            });
        }

        debug!("SMS accepted by gateway");
        Ok(())
    }

    /// Tell the seller about a new order.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; callers log it and carry on.
    pub async fn notify_new_order(&self, order: &Order) -> Result<(), SmsError> {
        self.send(&order.seller_phone, &order_message(order)).await
    }
}

/// Text sent to the seller when an order is placed.
#[must_use]
pub fn order_message(order: &Order) -> String {
    format!(
        "Taja Haat: new order for {} x {} from {} ({}). Total {}. Order {}.",
        order.quantity,
        order.product_name,
        order.buyer_name,
        order.buyer_phone,
        order.price,
        order.id
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Form, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use url::Url;

    use super::*;
    use crate::test_support::spawn;

    type Seen = Arc<Mutex<Vec<Vec<(String, String)>>>>;

    async fn gateway(code: i64) -> (SmsNotifier, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/api/smsapi",
                post(
                    move |State(seen): State<Seen>, Form(fields): Form<Vec<(String, String)>>| async move {
                        seen.lock().unwrap().push(fields);
                        let error = if code == 202 { "" } else { "Invalid Number" };
                        Json::<Value>(json!({ "response_code": code, "error_message": error }))
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let base = spawn(app).await;

        let notifier = SmsNotifier::new(SmsConfig {
            api_key: SecretString::from("k3Y9xQ2mV7pL4zR8"),
            sender_id: "8809617".to_string(),
            api_url: Url::parse(&format!("{base}api/smsapi")).unwrap(),
        });
        (notifier, seen)
    }

    fn field<'a>(fields: &'a [(String, String)], name: &str) -> &'a str {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_uses_international_number() {
        let (notifier, seen) = gateway(202).await;
        let phone = PhoneNumber::parse("01712345678").unwrap();

        notifier.send(&phone, "hello").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(field(&seen[0], "number"), "8801712345678");
        assert_eq!(field(&seen[0], "senderid"), "8809617");
        assert_eq!(field(&seen[0], "type"), "text");
        assert_eq!(field(&seen[0], "message"), "hello");
    }

    #[tokio::test]
    async fn test_non_202_is_rejected() {
        let (notifier, _) = gateway(1002).await;
        let phone = PhoneNumber::parse("01712345678").unwrap();

        let err = notifier.send(&phone, "hello").await.unwrap_err();

        assert!(matches!(err, SmsError::Rejected { code: 1002, .. }));
    }
}
