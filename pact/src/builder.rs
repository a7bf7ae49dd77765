//! Contract document builder.

use tracing::{debug, info};

use crate::contract::{ContractDocument, Interaction};
use crate::error::PactError;
use crate::registry::InteractionRegistry;

/// Builds the contract document of a finished run.
#[derive(Debug, Clone)]
pub struct ContractDocumentBuilder {
    consumer: String,
    provider: String,
    spec_version: String,
}

impl ContractDocumentBuilder {
    /// Builder for a consumer/provider pair.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            spec_version: "3.0.0".to_string(),
        }
    }

    /// Override the recorded format version.
    #[must_use]
    pub fn spec_version(mut self, version: impl Into<String>) -> Self {
        self.spec_version = version.into();
        self
    }

    /// Document with every exercised interaction, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::IncompleteContract`] when interactions were
    /// registered but none was exercised.
    pub fn build(&self, registry: &InteractionRegistry) -> Result<ContractDocument, PactError> {
        let snapshot = registry.snapshot();
        let mut document = ContractDocument::new(
            self.consumer.clone(),
            self.provider.clone(),
            self.spec_version.clone(),
        );

        for status in snapshot.iter().filter(|status| status.is_exercised()) {
            document.interactions.push(Interaction::from_spec(&status.spec));
        }
        let skipped = snapshot.len() - document.interactions.len();
        if skipped > 0 {
            debug!(skipped, "Unexercised interactions left out of the contract");
        }

        if !snapshot.is_empty() && document.interactions.is_empty() {
            return Err(PactError::IncompleteContract {
                registered: snapshot.len(),
            });
        }

        info!(
            consumer = %self.consumer,
            provider = %self.provider,
            interactions = document.interactions.len(),
            "Contract document built"
        );
        Ok(document)
    }
}
