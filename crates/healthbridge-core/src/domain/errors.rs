//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as validation failures and unparseable stored values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// User identifier was empty or malformed
    #[error("Invalid user ID: {0}")]
    InvalidUserId(String),

    /// Unknown platform name
    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    /// Unknown snapshot source name
    #[error("Invalid sync source: {0}")]
    InvalidSource(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidUserId(String::new());
        assert_eq!(err.to_string(), "Invalid user ID: ");

        let err = DomainError::InvalidPlatform("symbian".to_string());
        assert_eq!(err.to_string(), "Invalid platform: symbian");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidSource("cron".to_string());
        let err2 = DomainError::InvalidSource("cron".to_string());
        let err3 = DomainError::InvalidSource("push".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
