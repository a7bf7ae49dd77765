//! Mock server configuration.
//!
//! Values come from builder methods or from `PACT_*` environment variables.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Host is not an IP address
    #[error("Invalid host {0}: must be an IP address")]
    InvalidHost(String),

    /// Body limit of zero
    #[error("Invalid body limit: must be greater than 0")]
    InvalidBodyLimit,

    /// Shutdown timeout of zero
    #[error("Invalid shutdown timeout: must be greater than 0")]
    InvalidTimeout,

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Settings of one mock server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Bind port; 0 picks an ephemeral port
    pub port: u16,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// Time allowed for in-flight requests on stop
    pub shutdown_timeout: Duration,
    /// Directory contract documents are written to
    pub contract_dir: PathBuf,
    /// Contract format version recorded in documents
    pub spec_version: String,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            max_body_bytes: 1024 * 1024,
            shutdown_timeout: Duration::from_secs(5),
            contract_dir: PathBuf::from("target/pacts"),
            spec_version: "3.0.0".to_string(),
        }
    }
}

impl MockServerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind host.
    #[must_use]
    pub const fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Set the bind port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the request body limit.
    #[must_use]
    pub const fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Set the graceful shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the contract output directory.
    #[must_use]
    pub fn with_contract_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.contract_dir = dir.into();
        self
    }

    /// Set the recorded contract format version.
    #[must_use]
    pub fn with_spec_version(mut self, version: impl Into<String>) -> Self {
        self.spec_version = version.into();
        self
    }

    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable does not parse or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable does not parse or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = match lookup("PACT_MOCK_HOST") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHost(raw.clone()))?,
            None => defaults.host,
        };

        let config = Self {
            host,
            port: parse_var(&lookup, "PACT_MOCK_PORT", defaults.port)?,
            max_body_bytes: parse_var(&lookup, "PACT_MAX_BODY_BYTES", defaults.max_body_bytes)?,
            shutdown_timeout: Duration::from_millis(parse_var(
                &lookup,
                "PACT_SHUTDOWN_TIMEOUT_MS",
                5000,
            )?),
            contract_dir: lookup("PACT_CONTRACT_DIR").map_or(defaults.contract_dir, PathBuf::from),
            spec_version: defaults.spec_version,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidBodyLimit);
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.contract_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("contract_dir".to_string()));
        }
        if self.spec_version.trim().is_empty() {
            return Err(ConfigError::MissingRequired("spec_version".to_string()));
        }
        Ok(())
    }
}

/// Parse a variable with a default value.
fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
