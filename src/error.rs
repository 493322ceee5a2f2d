//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Clientbook.
//! All errors are structured and map to stable error codes for JSON output.
//!
//! # Error Categories
//! - `MissingRequiredField`: a create call lacks `name`, `surname` or `mail`
//! - `InsufficientIdentifyingData`: no usable key to resolve a client
//! - `ClientNotFound`: a resolution strategy ran but matched nothing
//! - `InvalidPhoneFormat`: a candidate phone number does not end in 10 digits
//! - `UniqueConstraintViolation`: duplicate `mail` or `number`
//! - `ConnectionFailed`: the database could not be reached (fatal at startup)
//! - `InvalidInput`: malformed input rejected by the engine (length/check constraints)
//! - `EngineError`: any other engine-specific database error
//! - `ConfigError`: configuration file or connection registry errors

use thiserror::Error;

/// Main error type for Clientbook operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientbookError {
    /// Required field absent on create
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Descriptor carries no key the resolver can use
    #[error(
        "Insufficient identifying data: provide client_id, mail, number, or name and surname"
    )]
    InsufficientIdentifyingData,

    /// Resolution strategy matched no client
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Candidate phone number too short or not ending in digits
    #[error("Invalid phone format: {0} (must end in 10 digits)")]
    InvalidPhoneFormat(String),

    /// Duplicate value on a unique column
    #[error("Value '{value}' for '{field}' already exists")]
    UniqueConstraintViolation { field: String, value: String },

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid input rejected by the storage engine
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Engine-specific database error
    #[error("Engine error ({engine}): {detail}")]
    EngineError { engine: String, detail: String },

    /// Configuration error (file not found, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ClientbookError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingRequiredField(_) => "MISSING_REQUIRED_FIELD",
            Self::InsufficientIdentifyingData => "INSUFFICIENT_IDENTIFYING_DATA",
            Self::ClientNotFound(_) => "CLIENT_NOT_FOUND",
            Self::InvalidPhoneFormat(_) => "INVALID_PHONE_FORMAT",
            Self::UniqueConstraintViolation { .. } => "UNIQUE_CONSTRAINT_VIOLATION",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::EngineError { .. } => "ENGINE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Get human-readable error message (no credentials included)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether the caller can carry on after this error.
    ///
    /// Only an unreachable database or an unusable configuration ends the process.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ConnectionFailed(_) | Self::ConfigError(_))
    }

    /// Create a missing required field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingRequiredField(field.into())
    }

    /// Create a client not found error
    pub fn client_not_found(message: impl Into<String>) -> Self {
        Self::ClientNotFound(message.into())
    }

    /// Create an invalid phone format error
    pub fn invalid_phone(value: impl Into<String>) -> Self {
        Self::InvalidPhoneFormat(value.into())
    }

    /// Create a uniqueness violation error
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UniqueConstraintViolation { field: field.into(), value: value.into() }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an engine-specific error
    pub fn engine_error(engine: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::EngineError { engine: engine.into(), detail: detail.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for Clientbook operations
pub type Result<T> = std::result::Result<T, ClientbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ClientbookError::missing_field("mail").error_code(), "MISSING_REQUIRED_FIELD");
        assert_eq!(
            ClientbookError::InsufficientIdentifyingData.error_code(),
            "INSUFFICIENT_IDENTIFYING_DATA"
        );
        assert_eq!(ClientbookError::client_not_found("x").error_code(), "CLIENT_NOT_FOUND");
        assert_eq!(ClientbookError::invalid_phone("123").error_code(), "INVALID_PHONE_FORMAT");
        assert_eq!(
            ClientbookError::duplicate("mail", "x@test").error_code(),
            "UNIQUE_CONSTRAINT_VIOLATION"
        );
        assert_eq!(ClientbookError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(ClientbookError::invalid_input("test").error_code(), "INVALID_INPUT");
        assert_eq!(ClientbookError::engine_error("sqlite", "test").error_code(), "ENGINE_ERROR");
        assert_eq!(ClientbookError::config_error("test").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_error_messages() {
        let err = ClientbookError::duplicate("mail", "x@test");
        assert!(err.message().contains("mail"));
        assert!(err.message().contains("x@test"));

        let err = ClientbookError::engine_error("postgres", "connection reset");
        assert!(err.message().contains("postgres"));
        assert!(err.message().contains("connection reset"));

        let err = ClientbookError::invalid_phone("123");
        assert!(err.message().contains("123"));
    }

    #[test]
    fn test_only_connection_and_config_errors_are_fatal() {
        assert!(!ClientbookError::connection_failed("down").is_recoverable());
        assert!(!ClientbookError::config_error("bad json").is_recoverable());

        assert!(ClientbookError::missing_field("name").is_recoverable());
        assert!(ClientbookError::InsufficientIdentifyingData.is_recoverable());
        assert!(ClientbookError::client_not_found("mail").is_recoverable());
        assert!(ClientbookError::invalid_phone("1").is_recoverable());
        assert!(ClientbookError::duplicate("number", "9991234567").is_recoverable());
        assert!(ClientbookError::engine_error("sqlite", "locked").is_recoverable());
    }
}
