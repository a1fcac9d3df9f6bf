//! Taja Haat backend - REST service for the marketplace.
//!
//! Serves users, products, orders and the synced community collections on
//! port 4000. Run `haat migrate` before the first start; the server never
//! migrates on its own.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use thiserror::Error;

use taja_haat_backend::config::{BackendConfig, ConfigError};
use taja_haat_backend::db;
use taja_haat_backend::state::AppState;
use taja_haat_backend::telemetry;

#[derive(Debug, Error)]
enum StartupError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cannot serve: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match BackendConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::InvalidEnvVar(key, reason)) => {
            // No subscriber yet
            #[allow(clippy::print_stderr)]
            {
                eprintln!("invalid {key}: {reason}");
            }
            return ExitCode::FAILURE;
        }
    };
    let _telemetry = telemetry::init(&config);

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Backend stopped");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: BackendConfig) -> Result<(), StartupError> {
    let pool = db::create_pool(&config.database_url).await?;
    let addr = config.socket_addr();

    let app = taja_haat_backend::app(AppState::new(config, pool))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down");
}
