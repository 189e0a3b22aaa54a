//! Error types for the Home Assistant history MCP server
//!
//! Every fallible operation in the crate returns [`HistoryError`]. Errors carry
//! a machine-readable [`ErrorCode`] so transports can map them onto JSON-RPC
//! error codes without string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for history server operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Error types for history server operations
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Invalid or out-of-bound request parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database query errors
    #[error("Database error: {0}")]
    Database(String),

    /// Database or transport connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Not found errors (tools, entities, statistics)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Connection errors (1000-1099)
    ConnectionLost,
    ConnectionTimeout,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,

    // Data errors (1400-1499)
    ParsingFailed,
    ValidationFailed,

    // Service errors (1600-1699)
    DatabaseError,
    NotFound,

    // Internal errors (1900-1999)
    InternalError,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::ConnectionLost => 1003,
            ErrorCode::ConnectionTimeout => 1001,
            ErrorCode::ConfigurationInvalid => 1202,
            ErrorCode::ParsingFailed => 1401,
            ErrorCode::ValidationFailed => 1403,
            ErrorCode::DatabaseError => 1603,
            ErrorCode::NotFound => 1604,
            ErrorCode::InternalError => 1901,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1000..=1099 => "connection",
            1200..=1299 => "configuration",
            1400..=1499 => "data",
            1600..=1699 => "service",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

impl HistoryError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Generic(anyhow::anyhow!(msg.into()))
    }

    /// Map to structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            HistoryError::Validation(_) => ErrorCode::ValidationFailed,
            HistoryError::Config(_) => ErrorCode::ConfigurationInvalid,
            HistoryError::Database(_) => ErrorCode::DatabaseError,
            HistoryError::Connection(_) => ErrorCode::ConnectionLost,
            HistoryError::Json(_) => ErrorCode::ParsingFailed,
            HistoryError::NotFound(_) => ErrorCode::NotFound,
            HistoryError::Timeout(_) => ErrorCode::ConnectionTimeout,
            HistoryError::Io(_) | HistoryError::Generic(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the caller sent bad parameters (as opposed to a server fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HistoryError::Validation(_) | HistoryError::NotFound(_) | HistoryError::Json(_)
        )
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for HistoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Timeout("database pool timed out".to_string()),
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::PoolClosed => Self::Connection("database pool closed".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for HistoryError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_categories() {
        let err = HistoryError::validation("end must be after start");
        assert_eq!(err.to_error_code(), ErrorCode::ValidationFailed);
        assert_eq!(err.to_error_code().as_number(), 1403);
        assert_eq!(err.to_error_code().category(), "data");
        assert!(err.is_client_error());

        let err = HistoryError::database("relation \"states\" does not exist");
        assert_eq!(err.to_error_code().category(), "service");
        assert!(!err.is_client_error());
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_pool_timeout_maps_to_connection_timeout() {
        let err: HistoryError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, HistoryError::Timeout(_)));
        assert_eq!(err.to_error_code(), ErrorCode::ConnectionTimeout);
        assert_eq!(err.to_error_code().category(), "connection");
    }

    #[test]
    fn test_error_display() {
        let err = HistoryError::validation("Query range exceeds 90 days");
        assert_eq!(err.to_string(), "Validation error: Query range exceeds 90 days");

        let err = HistoryError::internal("boom");
        assert_eq!(err.to_error_code(), ErrorCode::InternalError);
    }

    #[test]
    fn test_config_error_conversion() {
        let err: HistoryError = config::ConfigError::Message("bad port".to_string()).into();
        assert!(matches!(err, HistoryError::Config(_)));
    }
}
