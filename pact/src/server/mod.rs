//! Mock provider server.
//!
//! A [`MockServer`] is an explicit handle for one consumer test run:
//! register interactions, `start`, exercise the consumer against the returned
//! URL, `stop` for the verdict, then take the contract document.

pub mod handler;
pub mod shutdown;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use contract_common::{CommonError, RetryPolicy};
use tokio::net::TcpListener;
use tracing::{info, warn};
use url::Url;

use crate::builder::ContractDocumentBuilder;
use crate::config::MockServerConfig;
use crate::contract::ContractDocument;
use crate::error::PactError;
use crate::interaction::InteractionSpec;
use crate::publisher::ContractPublisher;
use crate::registry::InteractionRegistry;
use crate::verification::{InteractionLogEntry, MatchResult, RunVerdict, VerificationTracker};

pub use handler::{MockApiState, MockResponse, create_mock_router, dispatch};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownSignal};

/// Lifecycle state of a [`MockServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Not serving
    Stopped,
    /// Binding the listener
    Starting,
    /// Serving requests
    Listening,
}

impl ServerState {
    /// State name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Starting => "Starting",
            Self::Listening => "Listening",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a mock provider for one run.
#[derive(Debug)]
pub struct MockServer {
    consumer: String,
    provider: String,
    config: MockServerConfig,
    registry: Arc<InteractionRegistry>,
    tracker: Arc<VerificationTracker>,
    state: ServerState,
    address: Option<SocketAddr>,
    coordinator: Option<ShutdownCoordinator>,
    verdict: Option<RunVerdict>,
}

impl MockServer {
    /// Mock server with default configuration.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::with_config(consumer, provider, MockServerConfig::default())
    }

    /// Mock server with explicit configuration.
    #[must_use]
    pub fn with_config(
        consumer: impl Into<String>,
        provider: impl Into<String>,
        config: MockServerConfig,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            config,
            registry: Arc::new(InteractionRegistry::new()),
            tracker: Arc::new(VerificationTracker::new()),
            state: ServerState::Stopped,
            address: None,
            coordinator: None,
            verdict: None,
        }
    }

    /// Register an interaction before starting.
    ///
    /// # Errors
    ///
    /// [`PactError::DuplicateInteraction`] or, once started, [`PactError::RegistryFrozen`].
    pub fn register_interaction(&self, spec: InteractionSpec) -> Result<(), PactError> {
        self.registry.register(spec)
    }

    /// Bind and start serving. Returns the base URL.
    ///
    /// The configured port is tried first; if binding fails the server retries
    /// once on an ephemeral port.
    ///
    /// # Errors
    ///
    /// - [`PactError::InvalidState`] unless this is the handle's first start.
    /// - [`PactError::Config`] for an invalid configuration.
    /// - [`PactError::Bind`] when both bind attempts fail.
    pub async fn start(&mut self) -> Result<Url, PactError> {
        if self.state != ServerState::Stopped || self.verdict.is_some() {
            return Err(PactError::InvalidState {
                expected: "Stopped before first start",
                actual: self.state.as_str(),
            });
        }
        self.config.validate()?;

        self.state = ServerState::Starting;
        self.registry.freeze();

        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(err) => {
                self.state = ServerState::Stopped;
                return Err(err);
            }
        };
        let address = listener.local_addr()?;
        let url = Url::parse(&format!("http://{address}")).map_err(|e| PactError::Bind {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        let router = create_mock_router(MockApiState {
            registry: Arc::clone(&self.registry),
            tracker: Arc::clone(&self.tracker),
            max_body_bytes: self.config.max_body_bytes,
        });
        let mut coordinator = ShutdownCoordinator::new();
        let signal = coordinator.subscribe();
        coordinator.spawn("mock-server", async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(signal.recv())
                .await
        });

        self.coordinator = Some(coordinator);
        self.address = Some(address);
        self.state = ServerState::Listening;
        info!(
            consumer = %self.consumer,
            provider = %self.provider,
            url = %url,
            interactions = self.registry.len(),
            "Mock server listening"
        );
        Ok(url)
    }

    async fn bind(&self) -> Result<TcpListener, PactError> {
        let host = self.config.host;
        let configured = self.config.port;
        RetryPolicy::once()
            .execute(|attempt| {
                let port = if attempt == 0 { configured } else { 0 };
                let address = SocketAddr::new(host, port);
                async move {
                    TcpListener::bind(address).await.map_err(|e| {
                        warn!(%address, attempt, error = %e, "Mock server bind failed");
                        classify_bind_error(address, &e)
                    })
                }
            })
            .await
            .map_err(|e| PactError::Bind {
                address: format!("{host}:{configured}"),
                reason: e.to_string(),
            })
    }

    /// Stop serving and decide the run's verdict.
    ///
    /// In-flight requests get the configured shutdown timeout to finish.
    ///
    /// # Errors
    ///
    /// [`PactError::InvalidState`] if the server is not listening.
    pub async fn stop(&mut self) -> Result<RunVerdict, PactError> {
        if self.state != ServerState::Listening {
            return Err(PactError::InvalidState {
                expected: "Listening",
                actual: self.state.as_str(),
            });
        }

        if let Some(mut coordinator) = self.coordinator.take() {
            let outcome = coordinator.shutdown(self.config.shutdown_timeout).await;
            if outcome == ShutdownOutcome::Aborted {
                warn!(timeout = ?self.config.shutdown_timeout, "In-flight requests aborted on stop");
            }
        }
        self.state = ServerState::Stopped;

        let verdict = self.tracker.finalize(&self.registry);
        info!(
            consumer = %self.consumer,
            provider = %self.provider,
            requests = self.tracker.len(),
            passed = verdict.is_pass(),
            "Mock server stopped"
        );
        self.verdict = Some(verdict.clone());
        Ok(verdict)
    }

    /// Contract document of a passing run.
    ///
    /// # Errors
    ///
    /// - [`PactError::InvalidState`] before the run was stopped.
    /// - [`PactError::RunFailed`] if the verdict was a failure.
    /// - [`PactError::IncompleteContract`] if nothing was exercised.
    pub fn document(&self) -> Result<ContractDocument, PactError> {
        match &self.verdict {
            None => Err(PactError::InvalidState {
                expected: "Stopped after a run",
                actual: self.state.as_str(),
            }),
            Some(verdict @ RunVerdict::Fail(_)) => Err(PactError::RunFailed {
                summary: verdict.to_string(),
            }),
            Some(RunVerdict::Pass) => ContractDocumentBuilder::new(&self.consumer, &self.provider)
                .spec_version(&self.config.spec_version)
                .build(&self.registry),
        }
    }

    /// Write the contract document into the configured directory.
    ///
    /// # Errors
    ///
    /// As [`Self::document`], plus [`PactError::Io`] when writing fails.
    pub fn write_contract(&self) -> Result<PathBuf, PactError> {
        self.document()?.write_to_dir(&self.config.contract_dir)
    }

    /// Hand the contract document to a publisher.
    ///
    /// # Errors
    ///
    /// As [`Self::document`], plus any publisher error.
    pub async fn publish(&self, publisher: &dyn ContractPublisher) -> Result<ContractDocument, PactError> {
        let document = self.document()?;
        publisher.publish(&document).await?;
        Ok(document)
    }

    /// Base URL while listening.
    #[must_use]
    pub fn url(&self) -> Option<Url> {
        if self.state != ServerState::Listening {
            return None;
        }
        self.address
            .and_then(|address| Url::parse(&format!("http://{address}")).ok())
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Verdict of the finished run.
    #[must_use]
    pub const fn verdict(&self) -> Option<&RunVerdict> {
        self.verdict.as_ref()
    }

    /// Match outcomes so far.
    #[must_use]
    pub fn match_results(&self) -> Vec<MatchResult> {
        self.tracker.results()
    }

    /// Request/response pairs seen so far.
    #[must_use]
    pub fn interaction_log(&self) -> Vec<InteractionLogEntry> {
        self.tracker.log()
    }

    /// The interaction registry.
    #[must_use]
    pub fn registry(&self) -> &InteractionRegistry {
        &self.registry
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &MockServerConfig {
        &self.config
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        // Dropping the coordinator aborts the serving task.
        if self.state == ServerState::Listening {
            warn!(
                consumer = %self.consumer,
                provider = %self.provider,
                "Mock server dropped without stop, aborting"
            );
        }
    }
}

/// A host that is not local cannot be fixed by another port; anything else
/// is worth one more attempt on an ephemeral port.
fn classify_bind_error(address: SocketAddr, error: &io::Error) -> CommonError {
    if error.kind() == io::ErrorKind::AddrNotAvailable {
        CommonError::invalid_input(format!("{address}: {error}"))
    } else {
        CommonError::unavailable(format!("{address}: {error}"))
    }
}
