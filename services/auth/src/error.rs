//! Error taxonomy for the authentication service

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message shown for every credential failure, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Errors raised by the stores and the auth flows
#[derive(Error, Debug)]
pub enum AuthError {
    /// Empty or malformed input at the boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Credential mismatch; never says which field was wrong
    #[error("{}", INVALID_CREDENTIALS)]
    AuthenticationFailed,

    /// Username already registered
    #[error("Username already exists")]
    AlreadyExists,

    /// Persistence unreachable or timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::AlreadyExists,
            _ => AuthError::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AuthError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::AuthenticationFailed => {
                (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string())
            }
            AuthError::AlreadyExists => (StatusCode::CONFLICT, self.to_string()),
            AuthError::StoreUnavailable(detail) => {
                error!("Request aborted, store unavailable: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for auth results
pub type AuthResult<T> = Result<T, AuthError>;
