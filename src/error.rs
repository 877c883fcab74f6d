//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::domain::LedgerError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn store_failure(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::Timeout => {
            tracing::warn!("Store operation timed out");
            (StatusCode::SERVICE_UNAVAILABLE, "timeout")
        }
        other => {
            tracing::error!("Store error: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),

            AppError::Ledger(ledger_err) => match ledger_err {
                LedgerError::InvalidAmount(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", None)
                }
                LedgerError::ItemNotFound(item) => {
                    (StatusCode::BAD_REQUEST, "item_not_found", Some(item.clone()))
                }
                LedgerError::InsufficientFunds {
                    required,
                    available,
                } => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_funds",
                    Some(format!("required {}, available {}", required, available)),
                ),
                LedgerError::RecipientNotFound(name) => {
                    (StatusCode::BAD_REQUEST, "recipient_not_found", Some(name.clone()))
                }
                LedgerError::UserNotFound(id) => {
                    (StatusCode::NOT_FOUND, "user_not_found", Some(id.to_string()))
                }
                LedgerError::Store(store_err) => {
                    let (status, code) = store_failure(store_err);
                    (status, code, None)
                }
            },

            AppError::Auth(auth_err) => match auth_err {
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "invalid_credentials", None)
                }
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "unauthorized", None),
                AuthError::UsernameTaken(name) => {
                    (StatusCode::CONFLICT, "username_taken", Some(name.clone()))
                }
                AuthError::InvalidUsername(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_username", Some(msg.clone()))
                }
                AuthError::EmptyPassword => (StatusCode::BAD_REQUEST, "invalid_password", None),
                AuthError::Store(store_err) => {
                    let (status, code) = store_failure(store_err);
                    (status, code, None)
                }
            },
        };

        // Storage failures must not leak driver messages to clients
        let error = if status.is_server_error() {
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
