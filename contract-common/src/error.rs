//! Centralized error types shared by the contract engine crates.
//!
//! Errors are classified as retryable or not so that [`crate::RetryPolicy`]
//! can decide whether another attempt is worthwhile.

use thiserror::Error;

/// Common error type for infrastructure operations.
#[derive(Error, Debug)]
pub enum CommonError {
    /// Local resource (socket, file) is temporarily unavailable
    #[error("Resource unavailable: {0}")]
    Unavailable(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CommonError {
    /// Check if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_common::CommonError;
    ///
    /// let err = CommonError::unavailable("port in use");
    /// assert!(err.is_retryable());
    ///
    /// let err = CommonError::invalid_input("bad host");
    /// assert!(!err.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CommonError::unavailable("socket").is_retryable());
        assert!(!CommonError::invalid_input("host").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = CommonError::unavailable("address in use");
        assert_eq!(err.to_string(), "Resource unavailable: address in use");
    }
}
