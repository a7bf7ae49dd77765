//! Interaction registry.
//!
//! Interactions are registered before the mock server starts and are
//! read-only afterwards. Lookups take a shared read lock; exercise counters
//! are atomics so concurrent request handlers never lose an update.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::http::StatusCode;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::PactError;
use crate::interaction::{InteractionId, InteractionSpec};

#[derive(Debug)]
struct RegisteredInteraction {
    spec: Arc<InteractionSpec>,
    hits: AtomicUsize,
}

/// Snapshot of one interaction and how often it was exercised.
#[derive(Debug, Clone)]
pub struct InteractionStatus {
    /// The interaction
    pub spec: Arc<InteractionSpec>,
    /// Successful matches so far
    pub hits: usize,
}

impl InteractionStatus {
    /// Whether the interaction was matched at least once.
    #[must_use]
    pub const fn is_exercised(&self) -> bool {
        self.hits > 0
    }
}

/// Ordered collection of interaction specifications.
#[derive(Debug, Default)]
pub struct InteractionRegistry {
    entries: RwLock<Vec<RegisteredInteraction>>,
    frozen: AtomicBool,
}

impl InteractionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interaction.
    ///
    /// # Errors
    ///
    /// - [`PactError::DuplicateInteraction`] when the id, or the combination of
    ///   method, path and provider state, is already registered.
    /// - [`PactError::RegistryFrozen`] once serving has started.
    /// - [`PactError::InvalidInteraction`] for a response status HTTP cannot carry.
    pub fn register(&self, spec: InteractionSpec) -> Result<(), PactError> {
        if self.is_frozen() {
            return Err(PactError::RegistryFrozen);
        }
        if StatusCode::from_u16(spec.response.status).is_err() {
            return Err(PactError::InvalidInteraction(format!(
                "{}: response status {} is not a valid HTTP status",
                spec.id, spec.response.status
            )));
        }

        let mut entries = self.entries.write();
        let identity = spec.request.identity();
        let duplicate = entries.iter().any(|entry| {
            entry.spec.id == spec.id
                || (entry.spec.request.identity() == identity
                    && entry.spec.provider_state == spec.provider_state)
        });
        if duplicate {
            return Err(PactError::DuplicateInteraction {
                method: identity.0,
                path: spec.request.describe_path(),
                provider_state: spec
                    .provider_state
                    .clone()
                    .unwrap_or_else(|| "<none>".to_string()),
            });
        }

        info!(
            interaction = %spec.id,
            description = %spec.description,
            request = %spec.label(),
            "Interaction registered"
        );
        entries.push(RegisteredInteraction {
            spec: Arc::new(spec),
            hits: AtomicUsize::new(0),
        });
        Ok(())
    }

    /// Reject further registrations.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Whether registrations are rejected.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Interactions whose method and path could apply, in registration order.
    #[must_use]
    pub fn find_candidates(&self, method: &str, path: &str) -> Vec<Arc<InteractionSpec>> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.spec.request.applies_to(method, path))
            .map(|entry| Arc::clone(&entry.spec))
            .collect()
    }

    /// All interactions in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<InteractionSpec>> {
        self.entries
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.spec))
            .collect()
    }

    /// Record a successful match. Returns `true` the first time the
    /// interaction is exercised; the exercised flag itself is idempotent.
    pub fn mark_exercised(&self, id: &InteractionId) -> bool {
        let entries = self.entries.read();
        let Some(entry) = entries.iter().find(|entry| &entry.spec.id == id) else {
            return false;
        };
        let previous = entry.hits.fetch_add(1, Ordering::AcqRel);
        debug!(interaction = %id, hits = previous + 1, "Interaction exercised");
        previous == 0
    }

    /// Successful matches recorded for `id`.
    #[must_use]
    pub fn hit_count(&self, id: &InteractionId) -> usize {
        self.entries
            .read()
            .iter()
            .find(|entry| &entry.spec.id == id)
            .map_or(0, |entry| entry.hits.load(Ordering::Acquire))
    }

    /// Whether `id` was matched at least once.
    #[must_use]
    pub fn is_exercised(&self, id: &InteractionId) -> bool {
        self.hit_count(id) > 0
    }

    /// Every interaction with its hit count, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<InteractionStatus> {
        self.entries
            .read()
            .iter()
            .map(|entry| InteractionStatus {
                spec: Arc::clone(&entry.spec),
                hits: entry.hits.load(Ordering::Acquire),
            })
            .collect()
    }

    /// Number of registered interactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
