//! HTTP route handlers for the backend.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database reachable)
//!
//! # Users
//! POST /users                  - Create user (409 if the phone is registered)
//! GET  /users                  - List users (?phone= filters)
//! GET  /users/{id}             - User detail
//! PUT  /users/{id}             - Partial update
//!
//! # Products
//! GET  /products               - List products (?seller=&category=)
//! POST /products               - Create listing
//! GET  /products/{id}          - Product detail
//!
//! # Orders
//! GET  /orders                 - List orders (?buyer=&seller=&status=)
//! POST /orders                 - Place order
//! GET  /orders/{id}            - Order detail
//! PUT  /orders/{id}            - Status write { status, version, actor }
//!
//! # Community collections
//! GET  /demands                - Demand posts (?since=RFC3339)
//! PUT  /demands/{id}           - Last-write-wins upsert
//! GET  /bids                   - Bids (?since=)
//! PUT  /bids/{id}              - Last-write-wins upsert
//! GET  /reviews                - Reviews (?since=)
//! PUT  /reviews/{id}           - Last-write-wins upsert
//! ```

pub mod collections;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    routing::{get, put},
};

use taja_haat_core::{Bid, DemandPost, PhoneNumber, Review};

use crate::error::AppError;
use crate::state::AppState;

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index).post(users::create))
        .route("/{id}", get(users::show).put(users::update))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/{id}", get(products::show))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show).put(orders::update_status))
}

/// Create the routes for one synced collection.
fn collection_routes<T: taja_haat_core::SyncRecord>() -> Router<AppState> {
    Router::new()
        .route("/", get(collections::index::<T>))
        .route("/{id}", put(collections::upsert::<T>))
}

/// Create all routes for the backend.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/users", user_routes())
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/demands", collection_routes::<DemandPost>())
        .nest("/bids", collection_routes::<Bid>())
        .nest("/reviews", collection_routes::<Review>())
}

/// Parse an optional phone query parameter.
fn parse_phone_param(name: &str, value: Option<&str>) -> Result<Option<PhoneNumber>, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            PhoneNumber::parse(v).map_err(|e| AppError::BadRequest(format!("invalid {name}: {e}")))
        })
        .transpose()
}
