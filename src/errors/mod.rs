//! Error handling module for the contest tracker.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const MALFORMED_PAYLOAD: &str = "MALFORMED_PAYLOAD";
    pub const RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";
    pub const SYNC_FAILED: &str = "SYNC_FAILED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Bad request
    BadRequest(String),
    /// Database error
    Database(String),
    /// Transport failure or non-2xx answer from an upstream provider
    Http(String),
    /// Upstream body does not have the expected container shape
    Payload(String),
    /// Every attempt of a retried request failed
    RetryExhausted {
        target: String,
        attempts: u32,
        last: Box<AppError>,
    },
    /// A sync cycle produced no data from any provider
    SyncFailed {
        message: String,
        errors: Vec<String>,
    },
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Payload(_) => StatusCode::BAD_GATEWAY,
            AppError::RetryExhausted { .. } => StatusCode::BAD_GATEWAY,
            AppError::SyncFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Http(_) => codes::UPSTREAM_ERROR,
            AppError::Payload(_) => codes::MALFORMED_PAYLOAD,
            AppError::RetryExhausted { .. } => codes::RETRY_EXHAUSTED,
            AppError::SyncFailed { .. } => codes::SYNC_FAILED,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Http(msg) => msg.clone(),
            AppError::Payload(msg) => msg.clone(),
            AppError::RetryExhausted {
                target,
                attempts,
                last,
            } => format!(
                "{} failed after {} attempt(s): {}",
                target,
                attempts,
                last.message()
            ),
            AppError::SyncFailed { message, .. } => message.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::RetryExhausted { last, .. } => Some(last.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AppError::Http(format!("upstream answered {}", status)),
            None => AppError::Http(format!("request failed: {}", err)),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Payload(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::SyncFailed { errors, .. } => Some(serde_json::json!({ "errors": errors })),
            AppError::RetryExhausted { attempts, .. } => {
                Some(serde_json::json!({ "attempts": attempts }))
            }
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
