//! Error types for gcfexample
//!
//! `AppError` implements `IntoResponse` for Axum handlers. The remaining
//! enums describe failures of the individual integrations and are either
//! mapped into `AppError` or logged and absorbed by the request handler.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure to bring up the process-wide clients
///
/// Any of these means the function cannot serve requests until the
/// environment is corrected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable unset or missing")]
    MissingVariable(&'static str),

    #[error("Failed to initialize trace exporter: {0}")]
    ExporterInitFailed(String),

    #[error("Failed to initialize logging client: {0}")]
    ClientInitFailed(String),
}

/// Errors raised by the logging client and its sinks
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Invalid project id '{project_id}': {reason}")]
    InvalidProjectId { project_id: String, reason: String },

    #[error("Failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write log entries: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the custom-metrics API client
#[derive(Error, Debug)]
pub enum MonitoringError {
    #[error("Failed to obtain access token: {0}")]
    Token(String),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Monitoring API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid monitoring request: {0}")]
    InvalidRequest(String),
}

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Function not initialized: {0}")]
    Unavailable(#[from] ConfigError),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
