//! Database operations for the backend `SQLite` store.
//!
//! ## Tables
//!
//! - `users` - Marketplace users keyed by phone number
//! - `products` - Farmer listings
//! - `orders` - Orders with a version column for optimistic concurrency
//! - `collection_records` - Synced demand posts, bids and reviews (JSON)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/backend/migrations/` and run via:
//! ```bash
//! cargo run -p taja-haat-cli -- migrate
//! ```

pub mod collections;
pub mod orders;
pub mod products;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub use collections::CollectionRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique phone).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// In-memory databases get a single connection that is never recycled, so
/// every query sees the same database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be
/// established.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    if url.contains(":memory:") || url.contains("mode=memory") {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await;
    }

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Apply pending migrations from `crates/backend/migrations/`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Fresh in-memory database with all migrations applied.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = create_pool(&SecretString::from("sqlite::memory:"))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
