//! Liveness and readiness probes.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Readiness {
    database: &'static str,
    version: &'static str,
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// GET /health/ready
///
/// 503 while the database does not answer.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(state.pool())
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Database not ready");
            "unreachable"
        }
    };
    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(Readiness {
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
