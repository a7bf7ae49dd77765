//! Tracing subscriber setup.
//!
//! Test binaries call [`init_tracing`] from many tests; only the first call
//! installs the global subscriber, later calls are no-ops.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Name recorded in the startup event
    pub service_name: String,
    /// Log level filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
    /// Whether to route output through the test writer (captured by libtest)
    pub test_writer: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "contract-engine".to_string(),
            log_level: "info".to_string(),
            json_output: false,
            test_writer: false,
        }
    }
}

impl TracingConfig {
    /// Set the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Write through libtest's capture.
    #[must_use]
    pub const fn for_tests(mut self) -> Self {
        self.test_writer = true;
        self
    }
}

/// Initialize tracing with the given configuration.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(config: &TracingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = match (config.json_output, config.test_writer) {
        (true, true) => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_test_writer())
            .try_init(),
        (true, false) => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        (false, true) => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init(),
        (false, false) => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    }
    .is_ok();

    if installed {
        tracing::info!(service = %config.service_name, "Tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "contract-engine");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_output);
        assert!(!config.test_writer);
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::default()
            .with_service_name("product-consumer")
            .with_log_level("debug")
            .with_json_output()
            .for_tests();

        assert_eq!(config.service_name, "product-consumer");
        assert_eq!(config.log_level, "debug");
        assert!(config.json_output);
        assert!(config.test_writer);
    }

    #[test]
    fn test_second_init_is_noop() {
        let config = TracingConfig::default().for_tests();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
