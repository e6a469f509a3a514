//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Input Errors**: Malformed amount, unknown service, missing field. Raised
///   before any storage access.
/// - **Lookup Errors**: Account, card or rate absent. No mutation happens.
/// - **Business Rule Errors**: Insufficient balance. No mutation happens.
/// - **Concurrency Errors**: The balance changed under the unit of work.
/// - **Storage Errors**: Any failure while reading or committing. The unit of
///   work is rolled back before the error is reported.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error, failed commit).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A non-database storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Bearer token is missing, malformed, unknown, or revoked.
    #[error("Invalid or missing token")]
    InvalidToken,

    /// Amount is not a number or is not greater than zero.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Service code is missing or not one of the payable services.
    #[error("Invalid service type")]
    InvalidService,

    /// A required request field is absent or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Request body is invalid for a reason not covered above.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// No account for the user id, or no active account for the card number.
    #[error("Account not found")]
    AccountNotFound,

    /// The rate table has no row for the requested service.
    #[error("Service rate not found")]
    RateNotFound,

    /// Balance is lower than the price of the requested service.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// The balance read in this unit of work no longer matches storage.
    ///
    /// Safe for the caller to retry.
    #[error("Concurrent balance update, retry the request")]
    Conflict,

    /// An account with this email already exists.
    #[error("Email already exists")]
    EmailTaken,
}

impl AppError {
    /// Stable machine-readable code and HTTP status for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount"),
            AppError::InvalidService => (StatusCode::BAD_REQUEST, "invalid_service"),
            AppError::MissingField(_) => (StatusCode::BAD_REQUEST, "missing_field"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::InsufficientBalance => (StatusCode::BAD_REQUEST, "insufficient_balance"),
            AppError::AccountNotFound => (StatusCode::NOT_FOUND, "account_not_found"),
            AppError::RateNotFound => (StatusCode::NOT_FOUND, "rate_not_found"),
            AppError::EmailTaken => (StatusCode::CONFLICT, "email_taken"),
            AppError::Conflict => (StatusCode::INTERNAL_SERVER_ERROR, "conflict"),
            AppError::Database(_) | AppError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

/// Body rejected by the JSON extractor (bad syntax, wrong field types,
/// missing content type).
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "insufficient_balance",
///     "message": "Insufficient balance"
///   }
/// }
/// ```
///
/// Storage errors are logged here and replaced by a generic message so that
/// database details never reach the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::InvalidRequest(msg) | AppError::InvalidAmount(msg) => msg.clone(),
            AppError::Database(_) | AppError::Storage(_) => {
                tracing::error!(error = %self, "request failed with storage error");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
