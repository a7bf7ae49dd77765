//! Contract publishing.
//!
//! [`ContractPublisher`] is the seam towards a contract broker. Only the local
//! directory implementation ships here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::contract::ContractDocument;
use crate::error::PactError;

/// Stores and retrieves contract documents.
#[async_trait]
pub trait ContractPublisher: Send + Sync {
    /// Store a document, replacing the previous one for the same pair.
    async fn publish(&self, document: &ContractDocument) -> Result<(), PactError>;

    /// Load the document for a consumer/provider pair, if one exists.
    async fn fetch(&self, consumer: &str, provider: &str) -> Result<Option<ContractDocument>, PactError>;
}

/// Publishes documents as `<consumer>-<provider>.json` files in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    /// Publisher rooted at `dir`; the directory is created on first publish.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, consumer: &str, provider: &str) -> PathBuf {
        self.dir
            .join(ContractDocument::new(consumer, provider, "").file_name())
    }
}

#[async_trait]
impl ContractPublisher for DirectoryPublisher {
    async fn publish(&self, document: &ContractDocument) -> Result<(), PactError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(document.file_name());
        tokio::fs::write(&path, document.to_json_pretty()?).await?;
        info!(
            path = %path.display(),
            consumer = %document.consumer.name,
            provider = %document.provider.name,
            "Contract published"
        );
        Ok(())
    }

    async fn fetch(&self, consumer: &str, provider: &str) -> Result<Option<ContractDocument>, PactError> {
        let path = self.path_for(consumer, provider);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => ContractDocument::from_json(&json).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No published contract");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
