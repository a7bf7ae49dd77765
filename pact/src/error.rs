//! Contract engine error types using thiserror 2.0.

use axum::http::StatusCode;
use contract_common::CommonError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the contract engine.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PactError {
    /// An interaction with the same method, path and provider state (or the
    /// same id) is already registered.
    #[error("Duplicate interaction: {method} {path} (provider state: {provider_state})")]
    DuplicateInteraction {
        /// HTTP method of the rejected interaction
        method: String,
        /// Path example of the rejected interaction
        path: String,
        /// Provider state, or `<none>`
        provider_state: String,
    },

    /// The mock server could not bind a listening socket.
    #[error("Failed to bind mock server on {address}: {reason}")]
    Bind {
        /// Address that was attempted last
        address: String,
        /// Underlying failure
        reason: String,
    },

    /// No registered interaction matched an incoming request.
    #[error("No matching interaction for {method} {path} ({mismatches} mismatches on closest candidate)")]
    NoMatchingInteraction {
        /// Request method
        method: String,
        /// Request path
        path: String,
        /// Mismatch count of the best-scoring candidate
        mismatches: usize,
    },

    /// Interactions were registered but none was exercised.
    #[error("Incomplete contract: {registered} interactions registered, none exercised")]
    IncompleteContract {
        /// Number of registered interactions
        registered: usize,
    },

    /// The incoming request could not be decoded.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// A matcher was constructed with inconsistent arguments.
    #[error("Invalid matcher: {0}")]
    InvalidMatcher(String),

    /// An interaction cannot be served as declared.
    #[error("Invalid interaction: {0}")]
    InvalidInteraction(String),

    /// A contract document was requested for a run that did not pass.
    #[error("Run did not pass verification, no contract written:\n{summary}")]
    RunFailed {
        /// Rendered verdict
        summary: String,
    },

    /// Registration attempted after the mock server started.
    #[error("Interaction registry is frozen once the mock server has started")]
    RegistryFrozen,

    /// Operation not allowed in the server's current lifecycle state.
    #[error("Invalid mock server state: expected {expected}, found {actual}")]
    InvalidState {
        /// State required by the operation
        expected: &'static str,
        /// Current state
        actual: &'static str,
    },

    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem error while writing or reading a contract
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shared infrastructure error
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl PactError {
    /// Whether the error belongs to a single request and must not stop the server.
    #[must_use]
    pub const fn is_request_level(&self) -> bool {
        matches!(
            self,
            Self::NoMatchingInteraction { .. } | Self::MalformedRequest(_)
        )
    }

    /// HTTP status the mock server answers with for request-level errors.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateInteraction { .. } => "DuplicateInteraction",
            Self::Bind { .. } => "BindError",
            Self::NoMatchingInteraction { .. } => "NoMatchingInteraction",
            Self::IncompleteContract { .. } => "IncompleteContract",
            Self::MalformedRequest(_) => "MalformedRequest",
            Self::InvalidMatcher(_) => "InvalidMatcher",
            Self::InvalidInteraction(_) => "InvalidInteraction",
            Self::RunFailed { .. } => "RunFailed",
            Self::RegistryFrozen => "RegistryFrozen",
            Self::InvalidState { .. } => "InvalidState",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
            Self::Serialization(_) => "Serialization",
            Self::Common(_) => "Common",
        }
    }

    /// Create a malformed request error.
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    /// Create an invalid matcher error.
    #[must_use]
    pub fn invalid_matcher(msg: impl Into<String>) -> Self {
        Self::InvalidMatcher(msg.into())
    }
}
