//! Error types for MedForge services
//!
//! Provides a single error taxonomy for the clinical pipeline with:
//! - Fatal request errors (bad input, cancellation)
//! - Non-fatal pipeline signals (degraded stages, suppressed findings)
//! - Backend failures that drive operating-mode demotion
//! - HTTP status code mapping and structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    ExtractionError,
    ValidationError,

    // Pipeline signals (2xxx)
    RetrievalEmpty,
    StageDegraded,
    ValidationFailed,

    // Knowledge errors (3xxx)
    StoreUnavailable,
    OntologyUnavailable,

    // Rate limiting (6xxx)
    RateLimited,

    // Backend errors (8xxx)
    UpstreamError,
    BackendTimeout,
    BackendUnavailable,
    BackendRateLimited,
    EmbeddingError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    Cancelled,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ExtractionError => 1001,
            ErrorCode::ValidationError => 1002,

            ErrorCode::RetrievalEmpty => 2001,
            ErrorCode::StageDegraded => 2002,
            ErrorCode::ValidationFailed => 2003,

            ErrorCode::StoreUnavailable => 3001,
            ErrorCode::OntologyUnavailable => 3002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::BackendTimeout => 8002,
            ErrorCode::BackendUnavailable => 8003,
            ErrorCode::BackendRateLimited => 8004,
            ErrorCode::EmbeddingError => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::Cancelled => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Extraction failed: {message}")]
    Extraction { message: String },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },


    // Pipeline signals
    #[error("Retrieval returned no documents")]
    RetrievalEmpty,

    #[error("Stage {stage} degraded: {reason}")]
    StageDegraded { stage: String, reason: String },

    #[error("Finding {finding_id} failed validation: {reason}")]
    ValidationFailed { finding_id: String, reason: String },

    // Knowledge collaborators
    #[error("Knowledge store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Concept ontology unavailable: {message}")]
    OntologyUnavailable { message: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Language backends
    #[error("Backend {backend} timed out after {timeout_ms}ms")]
    BackendTimeout { backend: String, timeout_ms: u64 },

    #[error("Backend {backend} unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    #[error("Backend {backend} rate limited")]
    BackendRateLimited { backend: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request cancelled")]
    Cancelled,

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Extraction { .. } => ErrorCode::ExtractionError,
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::RetrievalEmpty => ErrorCode::RetrievalEmpty,
            AppError::StageDegraded { .. } => ErrorCode::StageDegraded,
            AppError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::OntologyUnavailable { .. } => ErrorCode::OntologyUnavailable,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::BackendTimeout { .. } => ErrorCode::BackendTimeout,
            AppError::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            AppError::BackendRateLimited { .. } => ErrorCode::BackendRateLimited,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Cancelled => ErrorCode::Cancelled,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Extraction { .. } | AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 499 is not a registered status; cancelled requests report 408
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,

            // 422 for pipeline signals that escape to the edge
            AppError::RetrievalEmpty
            | AppError::StageDegraded { .. }
            | AppError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. }
            | AppError::OntologyUnavailable { .. }
            | AppError::BackendUnavailable { .. }
            | AppError::BackendRateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::BackendTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether this error means a language backend could not serve the call.
    ///
    /// These are health signals for the mode controller, not request failures.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            AppError::BackendTimeout { .. }
                | AppError::BackendUnavailable { .. }
                | AppError::BackendRateLimited { .. }
                | AppError::HttpClient(_)
        )
    }

    /// Whether a single retry of the failed call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::BackendTimeout { .. } | AppError::BackendRateLimited { .. } => true,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
