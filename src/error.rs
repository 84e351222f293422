//! # Error Handling
//!
//! This module defines the HTTP-facing error type and how it is converted to
//! responses. Domain failures from the chat pipeline (`ChatError`) are mapped
//! here, at the request boundary, and nowhere else.
//!
//! ## Error Payload:
//! Every failure returns JSON whose `error` field is a human-readable string,
//! so the chat frontend can display it directly:
//! ```json
//! {
//!   "error": "Generation failed: HTTP 503: overloaded",
//!   "type": "generation_error",
//!   "timestamp": "2025-01-01T12:00:00Z"
//! }
//! ```
//!
//! ## Status Mapping:
//! - BadRequest / ValidationError / InvalidTurn → 400
//! - PayloadTooLarge → 413
//! - ServiceUnavailable (adapter disabled by configuration) → 503
//! - Transcription / Generation / Synthesis / Storage / Internal / ConfigError → 500

use crate::conversation::ChatError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Upload exceeded the configured size limit
    PayloadTooLarge(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// The requested capability is switched off in this deployment
    ServiceUnavailable(String),

    /// Failure raised by the chat pipeline
    Chat(ChatError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "{}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "{}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "{}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "{}", msg),
            AppError::Chat(err) => write!(f, "{}", err),
        }
    }
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::ConfigError(_) => "config_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::Chat(err) => err.kind(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Chat(ChatError::InvalidTurn(_)) => StatusCode::BAD_REQUEST,
            AppError::Chat(_) | AppError::Internal(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error_type = self.kind(), "{}", self);
        } else {
            tracing::warn!(error_type = self.kind(), "{}", self);
        }

        HttpResponse::build(status).json(json!({
            "error": self.to_string(),
            "type": self.kind(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        AppError::Chat(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
