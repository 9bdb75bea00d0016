use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Unified error type for the Vigil service
#[derive(Error, Debug)]
pub enum VigilError {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    // Persisted store errors
    #[error("Stored proxy list is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist proxy list: {0}")]
    PersistFailure(String),

    // Health check errors
    #[error("Probe failed for {address}: {reason}")]
    ProbeFailure { address: String, reason: String },

    #[error("A health check cycle is already in progress")]
    ConcurrentCycleRejected,

    // Import errors
    #[error("Import failed: {0}")]
    ImportFailure(String),

    #[error("Import source unreachable: {0}")]
    ImportFetch(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

impl VigilError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            VigilError::InvalidRequest(_) | VigilError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }

            // 404 Not Found
            VigilError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            VigilError::ConcurrentCycleRejected => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            VigilError::ImportFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 502 Bad Gateway
            VigilError::ImportFetch(_) | VigilError::ProbeFailure { .. } => {
                StatusCode::BAD_GATEWAY
            }

            // 503 Service Unavailable
            VigilError::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            VigilError::Database(_)
            | VigilError::Serialization(_)
            | VigilError::PersistFailure(_)
            | VigilError::Io(_)
            | VigilError::Http(_)
            | VigilError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for VigilError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_server_error() {
            error!(status = %status, "Request failed: {}", self);
        }
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

// Convert from reqwest client errors
impl From<reqwest::Error> for VigilError {
    fn from(err: reqwest::Error) -> Self {
        VigilError::Http(err.to_string())
    }
}
