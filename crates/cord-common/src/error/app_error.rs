//! Application error types
//!
//! Top-level errors surfaced by the client binary and facade.

use crate::config::ConfigError;
use crate::telemetry::TracingError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TracingError),

    // Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    // Session invalidated by the gateway; a fresh Identify is required
    #[error("Session rejected: {0}")]
    SessionRejected(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Get a stable error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Telemetry(_) => "TELEMETRY_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::SessionRejected(_) => "SESSION_REJECTED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same operation could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Process exit code for the binary
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Telemetry(_) => 78, // EX_CONFIG
            Self::SessionRejected(_) => 77,             // EX_NOPERM
            Self::Connection(_) => 69,                  // EX_UNAVAILABLE
            Self::Internal(_) => 70,                    // EX_SOFTWARE
        }
    }

    /// Create a connection error
    #[must_use]
    pub fn connection(msg: impl std::fmt::Display) -> Self {
        Self::Connection(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
