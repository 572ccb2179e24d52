//! Error types for linkmap-service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use linkmap_core::LinkmapError;
use serde::Serialize;
use thiserror::Error;

/// Service bootstrap errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption key or cipher setup error
    #[error("Crypto error: {0}")]
    Crypto(#[from] LinkmapError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique slot already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Row could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Message is shown to the client as-is; keep it generic.
    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn project_not_found() -> Self {
        Self::NotFound("project not found".to_string())
    }
}

impl From<LinkmapError> for ApiError {
    fn from(err: LinkmapError) -> Self {
        match err {
            LinkmapError::InvalidKeyName(_) | LinkmapError::InvalidEnvironment(_) => {
                Self::BadRequest(err.to_string())
            }
            LinkmapError::InvalidKey(_) | LinkmapError::Crypto(_) => {
                tracing::error!(error = %err, "crypto failure while handling request");
                Self::Internal("internal server error".to_string())
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "authentication required".to_string(),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "CONFLICT", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
            ApiError::Storage(StorageError::NotFound(message)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            ApiError::Storage(StorageError::Conflict(message)) => {
                (StatusCode::CONFLICT, "CONFLICT", message)
            }
            ApiError::Storage(err) => {
                tracing::error!(error = %err, "storage failure while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message, code })).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for service bootstrap
pub type ServiceResult<T> = Result<T, ServiceError>;
