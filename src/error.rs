//! Error handling module for the procurement relay
//!
//! This module defines the error types used throughout the relay. The
//! variants follow the failure taxonomy of a relay cycle: connection
//! failures and remote rejections abort the cycle, protocol violations are
//! skipped record by record.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the procurement relay
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker or HTTP endpoint unreachable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Broker rejected an operation after the connection was established
    #[error("Broker error: {0}")]
    Broker(String),

    /// Remote procurement service answered with a non-success status
    #[error("Remote rejection during {stage}: HTTP {status}")]
    RemoteRejection { stage: &'static str, status: u16 },

    /// Unexpected message type or malformed record
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Validation errors for incoming data
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors that are not connection failures
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Error::Connection(msg.into())
    }

    /// Create a broker error
    pub fn broker<S: Into<String>>(msg: S) -> Self {
        Error::Broker(msg.into())
    }

    /// Create a protocol violation
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::ProtocolViolation(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::Connection(_) | Error::Broker(_) | Error::RemoteRejection { .. } => {
                StatusCode::BAD_GATEWAY
            },
            Error::Config(_)
            | Error::ProtocolViolation(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Http(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error abandons the rest of a relay cycle
    ///
    /// Protocol violations and validation failures concern a single record
    /// and are skipped; everything else stops the cycle at the failing stage.
    pub fn aborts_cycle(&self) -> bool {
        !matches!(self, Error::ProtocolViolation(_) | Error::Validation(_))
    }
}

/// Implement IntoResponse for automatic error responses in Axum
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type(&self),
                "status": status.as_u16(),
            }
        }));

        match status {
            StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::BAD_GATEWAY => {
                tracing::error!(error = ?self, "Internal server error");
            },
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                tracing::warn!(error = ?self, "Client error");
            },
            _ => {
                tracing::info!(error = ?self, "Request error");
            },
        }

        (status, body).into_response()
    }
}

/// Get a string representation of the error type
fn error_type(error: &Error) -> &'static str {
    match error {
        Error::Config(_) => "configuration_error",
        Error::Connection(_) => "connection_error",
        Error::Broker(_) => "broker_error",
        Error::RemoteRejection { .. } => "remote_rejection",
        Error::ProtocolViolation(_) => "protocol_violation",
        Error::Validation(_) => "validation_error",
        Error::Serialization(_) => "serialization_error",
        Error::Io(_) => "io_error",
        Error::Http(_) => "http_error",
        Error::Internal(_) => "internal_error",
        Error::NotFound(_) => "not_found",
        Error::Timeout(_) => "timeout",
    }
}

/// Convert from anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Convert from envconfig::Error to our Error type
impl From<envconfig::Error> for Error {
    fn from(err: envconfig::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Classify reqwest failures: unreachable endpoints are connection errors
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Error::Connection(err.to_string())
        } else if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::validation("test").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::connection("broker down").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::internal("test").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cycle_abort_classification() {
        assert!(Error::connection("test").aborts_cycle());
        assert!(Error::RemoteRejection {
            stage: "submit",
            status: 500
        }
        .aborts_cycle());
        assert!(!Error::protocol("binary message").aborts_cycle());
        assert!(!Error::validation("isbn").aborts_cycle());
    }

    #[test]
    fn test_remote_rejection_display() {
        let err = Error::RemoteRejection {
            stage: "fetch",
            status: 503,
        };
        assert_eq!(err.to_string(), "Remote rejection during fetch: HTTP 503");
        assert_eq!(error_type(&err), "remote_rejection");
    }
}
