//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! haat migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BACKEND_DATABASE_URL` - `SQLite` connection string (falls back to
//!   `DATABASE_URL`, then `sqlite://taja-haat.db`)
//!
//! Migration files live in `crates/backend/migrations/`.

use taja_haat_backend::config::{BackendConfig, ConfigError};
use taja_haat_backend::db;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply pending backend migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database cannot be opened or a migration
/// fails.
pub async fn run() -> Result<(), MigrationError> {
    let config = BackendConfig::from_env()?;

    info!("Connecting to backend database...");
    let pool = db::create_pool(&config.database_url).await?;

    info!("Running backend migrations...");
    db::run_migrations(&pool).await?;

    info!("Backend migrations complete");
    Ok(())
}
