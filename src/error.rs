//! Error types for wis2-downloader
//!
//! This module provides error handling for the whole pipeline, including:
//! - Domain-specific error types (subscriptions, per-job download failures)
//! - HTTP status code mapping for the administrative API
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for wis2-downloader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wis2-downloader
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// The startup subscription list could not be loaded
    #[error("failed to load subscriptions from {path}: {reason}")]
    SubscriptionFile {
        /// Path of the subscription file
        path: PathBuf,
        /// Why it could not be used
        reason: String,
    },

    /// Subscription management error
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// MQTT client error (request could not be handed to the event loop)
    #[error("MQTT error: {0}")]
    Mqtt(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<rumqttc::ClientError> for Error {
    fn from(e: rumqttc::ClientError) -> Self {
        Error::Mqtt(e.to_string())
    }
}

/// Errors raised by the subscription controller
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Request did not name a topic
    #[error("No topic passed")]
    MissingTopic,

    /// Topic string is not a usable MQTT topic filter
    #[error("invalid topic {topic}: {reason}")]
    InvalidTopic {
        /// The rejected topic
        topic: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Per-job failures. These never leave the worker; they are logged and
/// carried in [`JobOutcome::Failed`](crate::types::JobOutcome::Failed).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum JobError {
    /// Canonical link could not be parsed as a URL
    #[error("invalid canonical link {href}: {reason}")]
    InvalidLink {
        /// The raw link
        href: String,
        /// Parse failure
        reason: String,
    },

    /// Request did not complete (connect error, timeout, body read)
    #[error("error downloading {url}: {reason}")]
    Request {
        /// Address that was requested
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("error downloading {url}: HTTP {status}")]
    HttpStatus {
        /// Address that was requested
        url: String,
        /// Returned status code
        status: u16,
    },

    /// Target directory or file could not be written
    #[error("error saving to disk {path}: {reason}")]
    Write {
        /// Path that could not be written
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "validation_error",
///     "message": "No topic passed"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Subscription(SubscriptionError::MissingTopic) => 400,
            Error::Subscription(SubscriptionError::InvalidTopic { .. }) => 400,

            Error::SubscriptionFile { .. } => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // Broker unreachable or refused the request
            Error::Mqtt(_) => 502,

            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::SubscriptionFile { .. } => "subscription_file_error",
            Error::Subscription(e) => match e {
                SubscriptionError::MissingTopic => "validation_error",
                SubscriptionError::InvalidTopic { .. } => "invalid_topic",
            },
            Error::Mqtt(_) => "mqtt_error",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Subscription(SubscriptionError::InvalidTopic { topic, reason }) => {
                Some(serde_json::json!({ "topic": topic, "reason": reason }))
            }
            Error::SubscriptionFile { path, .. } => Some(serde_json::json!({ "path": path })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
