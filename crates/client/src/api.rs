//! HTTP client for the Taja Haat backend.
//!
//! One method per backend route. Non-2xx responses are turned into
//! [`ApiError`]; nothing is retried.

use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use taja_haat_core::{
    NewOrder, NewProduct, NewUser, Order, OrderId, OrderStatus, PhoneNumber, Product, ProductId,
    StatusUpdate, SyncRecord, User, UserId, UserUpdate,
};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend has no such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write lost against a concurrent change.
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        current_version: Option<i64>,
    },

    /// Any other non-2xx response.
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not what the route returns.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether the backend could not be reached at all.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_connect() || e.is_timeout() || e.is_request())
    }
}

/// Backend error body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(default)]
    current_version: Option<i64>,
}

/// Filters for [`ApiClient::list_products`].
#[derive(Debug, Default, Clone)]
pub struct ProductQuery {
    pub seller: Option<PhoneNumber>,
    pub category: Option<String>,
}

/// Filters for [`ApiClient::list_orders`].
#[derive(Debug, Default, Clone)]
pub struct OrderQuery {
    pub buyer: Option<PhoneNumber>,
    pub seller: Option<PhoneNumber>,
    pub status: Option<OrderStatus>,
}

/// Backend REST client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: &Url) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("taja-haat-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are sent to, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Conflict` if the phone is already registered.
    #[instrument(skip(self, user), fields(phone = %user.phone))]
    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        self.send(self.request(Method::POST, "/users").json(user))
            .await
    }

    /// Find the user registered with `phone`.
    ///
    /// The backend filters by phone; the result is re-checked here so a
    /// backend that ignores the filter cannot hand back someone else.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(phone = %phone))]
    pub async fn get_user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, ApiError> {
        let users: Vec<User> = self
            .send(
                self.request(Method::GET, "/users")
                    .query(&[("phone", phone.as_str())]),
            )
            .await?;

        Ok(users.into_iter().find(|u| &u.phone == phone))
    }

    /// List every user.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_all_users(&self) -> Result<Vec<User>, ApiError> {
        self.send(self.request(Method::GET, "/users")).await
    }

    /// Apply a partial update to a user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the user does not exist.
    #[instrument(skip(self, update))]
    pub async fn update_user(&self, id: &UserId, update: &UserUpdate) -> Result<User, ApiError> {
        self.send(
            self.request(Method::PUT, &format!("/users/{}", encode(id.as_str())))
                .json(update),
        )
        .await
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// List products.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, ApiError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(seller) = &query.seller {
            params.push(("seller", seller.as_str()));
        }
        if let Some(category) = &query.category {
            params.push(("category", category.as_str()));
        }

        self.send(self.request(Method::GET, "/products").query(&params))
            .await
    }

    /// Get a product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        self.send(self.request(Method::GET, &format!("/products/{}", encode(id.as_str()))))
            .await
    }

    /// List a new product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` if the backend rejects the listing.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        self.send(self.request(Method::POST, "/products").json(product))
            .await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// List orders.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, ApiError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(buyer) = &query.buyer {
            params.push(("buyer", buyer.as_str()));
        }
        if let Some(seller) = &query.seller {
            params.push(("seller", seller.as_str()));
        }
        if let Some(status) = &query.status {
            params.push(("status", status.as_str()));
        }

        self.send(self.request(Method::GET, "/orders").query(&params))
            .await
    }

    /// Get an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        self.send(self.request(Method::GET, &format!("/orders/{}", encode(id.as_str()))))
            .await
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown product and
    /// `ApiError::Status` when the backend refuses the order.
    #[instrument(skip(self, order), fields(product_id = %order.product_id, quantity = order.quantity))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, ApiError> {
        self.send(self.request(Method::POST, "/orders").json(order))
            .await
    }

    /// Write a new status for an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Conflict` with the current version when
    /// `update.version` is stale.
    #[instrument(skip(self, update), fields(to = %update.status, version = update.version))]
    pub async fn update_order_status(
        &self,
        id: &OrderId,
        update: &StatusUpdate,
    ) -> Result<Order, ApiError> {
        self.send(
            self.request(Method::PUT, &format!("/orders/{}", encode(id.as_str())))
                .json(update),
        )
        .await
    }

    // =========================================================================
    // Community collections
    // =========================================================================

    /// Pull records of one collection changed at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(collection = %T::COLLECTION))]
    pub async fn pull<T: SyncRecord>(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<T>, ApiError> {
        let mut request = self.request(Method::GET, &format!("/{}", T::COLLECTION));
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        self.send(request).await
    }

    /// Push one record; returns the copy the backend kept.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, record), fields(collection = %T::COLLECTION, id = record.id()))]
    pub async fn push<T: SyncRecord>(&self, record: &T) -> Result<T, ApiError> {
        self.send(
            self.request(
                Method::PUT,
                &format!("/{}/{}", T::COLLECTION, encode(record.id())),
            )
            .json(record),
        )
        .await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn error_from_response(status: StatusCode, text: &str) -> ApiError {
    let (message, current_version) = serde_json::from_str::<ErrorBody>(text).map_or_else(
        |_| (text.to_string(), None),
        |body| (body.error, body.current_version),
    );

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::CONFLICT => ApiError::Conflict {
            message,
            current_version,
        },
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_json_body() {
        let err = error_from_response(
            StatusCode::CONFLICT,
            r#"{"error":"order changed since version 1; current version is 2","currentVersion":2}"#,
        );
        assert!(matches!(
            err,
            ApiError::Conflict {
                current_version: Some(2),
                ..
            }
        ));

        let err = error_from_response(StatusCode::NOT_FOUND, r#"{"error":"product p-9"}"#);
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "product p-9"));
    }

    #[test]
    fn test_error_from_plain_body() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(
            err,
            ApiError::Status { status: 502, ref message } if message == "upstream down"
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new(&Url::parse("http://127.0.0.1:4000/").unwrap()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:4000");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) is closed on test machines
        let client = ApiClient::new(&Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
        let err = client.get_all_users().await.unwrap_err();
        assert!(err.is_transport());
    }
}
