//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; the body is always JSON `{ "error": "..." }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use taja_haat_core::TransitionError;

use crate::db::RepositoryError;
use crate::services::OrderServiceError;

/// Application-level error type for the backend.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Order status write refused or failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderServiceError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Well-formed request that breaks a business rule.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<i64>,
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) | Self::Order(OrderServiceError::Repository(err)) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Order(err) => match err {
                OrderServiceError::NotFound => StatusCode::NOT_FOUND,
                OrderServiceError::Stale { .. } => StatusCode::CONFLICT,
                OrderServiceError::Transition(
                    TransitionError::RoleNotPermitted { .. } | TransitionError::NotParticipant { .. },
                ) => StatusCode::FORBIDDEN,
                OrderServiceError::Transition(TransitionError::IllegalTransition { .. }) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                OrderServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let error = match &self {
            _ if status.is_server_error() => "Internal server error".to_string(),
            Self::Database(err) | Self::Order(OrderServiceError::Repository(err)) => {
                err.to_string()
            }
            Self::Order(err) => err.to_string(),
            Self::NotFound(msg) | Self::BadRequest(msg) | Self::Unprocessable(msg) => msg.clone(),
            Self::Internal(_) => "Internal server error".to_string(),
        };

        let current_version = match &self {
            Self::Order(OrderServiceError::Stale { current, .. }) => Some(*current),
            _ => None,
        };

        (
            status,
            Json(ErrorBody {
                error,
                current_version,
            }),
        )
            .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use taja_haat_core::{OrderAction, OrderStatus, Role};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product p-1".to_string());
        assert_eq!(err.to_string(), "Not found: product p-1");

        let err = AppError::BadRequest("invalid phone".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid phone");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".to_string()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_error_status_codes() {
        assert_eq!(
            get_status(AppError::Order(OrderServiceError::Stale {
                expected: 1,
                current: 3
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Order(OrderServiceError::Transition(
                TransitionError::IllegalTransition {
                    from: OrderStatus::Completed,
                    to: OrderStatus::Pending,
                }
            ))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Order(OrderServiceError::Transition(
                TransitionError::RoleNotPermitted {
                    role: Role::Driver,
                    action: OrderAction::Cancel,
                }
            ))),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_stale_body_carries_current_version() {
        let response = AppError::Order(OrderServiceError::Stale {
            expected: 1,
            current: 3,
        })
        .into_response();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["currentVersion"], 3);
        assert!(json["error"].as_str().unwrap().contains("version"));
    }
}
