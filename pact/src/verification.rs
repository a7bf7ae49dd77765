//! Verification tracker: the run's interaction log and its final verdict.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::interaction::{Expectation, InteractionId};
use crate::matcher::{Mismatch, MismatchReason};
use crate::registry::InteractionRegistry;
use crate::request::RequestSummary;

/// Outcome of matching one incoming request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Matched interaction, or the closest candidate for a non-match
    pub interaction_id: Option<InteractionId>,
    /// The request that was evaluated
    pub request: RequestSummary,
    /// Whether an interaction matched
    pub matched: bool,
    /// Path-level diagnostics; empty when matched
    pub mismatches: Vec<Mismatch>,
}

impl MatchResult {
    /// A successful match.
    #[must_use]
    pub fn matched(id: InteractionId, request: RequestSummary) -> Self {
        Self {
            interaction_id: Some(id),
            request,
            matched: true,
            mismatches: Vec::new(),
        }
    }

    /// A request no interaction matched.
    #[must_use]
    pub fn unmatched(
        closest: Option<InteractionId>,
        request: RequestSummary,
        mismatches: Vec<Mismatch>,
    ) -> Self {
        Self {
            interaction_id: closest,
            request,
            matched: false,
            mismatches,
        }
    }

    /// A request that could not be decoded.
    #[must_use]
    pub fn malformed(request: RequestSummary, reason: impl Into<String>) -> Self {
        Self {
            interaction_id: None,
            request,
            matched: false,
            mismatches: vec![Mismatch::new(
                "$",
                "well-formed HTTP request",
                reason,
                MismatchReason::MalformedRequest,
            )],
        }
    }
}

/// One request/response pair seen by the mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionLogEntry {
    /// When the request arrived
    pub received_at: DateTime<Utc>,
    /// Status code returned
    pub status: u16,
    /// Match outcome
    pub result: MatchResult,
}

/// An interaction whose call-count expectation was not met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetExpectation {
    /// Interaction id
    pub id: InteractionId,
    /// Interaction description
    pub description: String,
    /// What was expected
    pub expected: Expectation,
    /// How often it was exercised
    pub hits: usize,
}

/// Details of a failed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationFailure {
    /// Requests that matched nothing or could not be decoded
    pub failed_requests: Vec<MatchResult>,
    /// Interactions exercised the wrong number of times
    pub unmet: Vec<UnmetExpectation>,
}

/// Final verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum RunVerdict {
    /// Every expectation met and every request matched
    Pass,
    /// At least one problem; see the failure details
    Fail(VerificationFailure),
}

impl RunVerdict {
    /// Whether the run passed.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Failure details, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&VerificationFailure> {
        match self {
            Self::Pass => None,
            Self::Fail(failure) => Some(failure),
        }
    }
}

impl fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failure = match self {
            Self::Pass => return f.write_str("PASS"),
            Self::Fail(failure) => failure,
        };
        writeln!(f, "FAIL")?;
        for result in &failure.failed_requests {
            writeln!(f, "  unmatched request {}", result.request)?;
            if let Some(id) = &result.interaction_id {
                writeln!(f, "    closest interaction: {id}")?;
            }
            for mismatch in &result.mismatches {
                writeln!(f, "    - {mismatch}")?;
            }
        }
        for unmet in &failure.unmet {
            writeln!(
                f,
                "  interaction {} ({}) expected {}, exercised {} times",
                unmet.id, unmet.description, unmet.expected, unmet.hits
            )?;
        }
        Ok(())
    }
}

/// Accumulates match outcomes for one run.
#[derive(Debug, Default)]
pub struct VerificationTracker {
    log: Mutex<Vec<InteractionLogEntry>>,
}

impl VerificationTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request/response pair.
    pub fn record(&self, status: u16, result: MatchResult) {
        self.log.lock().push(InteractionLogEntry {
            received_at: Utc::now(),
            status,
            result,
        });
    }

    /// Snapshot of the interaction log.
    #[must_use]
    pub fn log(&self) -> Vec<InteractionLogEntry> {
        self.log.lock().clone()
    }

    /// Snapshot of the match results.
    #[must_use]
    pub fn results(&self) -> Vec<MatchResult> {
        self.log.lock().iter().map(|entry| entry.result.clone()).collect()
    }

    /// Number of recorded requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    /// Whether no request was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Decide the run's verdict against the registry's expectations.
    #[must_use]
    pub fn finalize(&self, registry: &InteractionRegistry) -> RunVerdict {
        let failed_requests: Vec<MatchResult> = self
            .log
            .lock()
            .iter()
            .filter(|entry| !entry.result.matched)
            .map(|entry| entry.result.clone())
            .collect();

        let unmet: Vec<UnmetExpectation> = registry
            .snapshot()
            .into_iter()
            .filter(|status| !status.spec.expectation.is_met(status.hits))
            .map(|status| UnmetExpectation {
                id: status.spec.id.clone(),
                description: status.spec.description.clone(),
                expected: status.spec.expectation,
                hits: status.hits,
            })
            .collect();

        if failed_requests.is_empty() && unmet.is_empty() {
            info!(requests = self.len(), "Verification passed");
            RunVerdict::Pass
        } else {
            warn!(
                failed_requests = failed_requests.len(),
                unmet = unmet.len(),
                "Verification failed"
            );
            RunVerdict::Fail(VerificationFailure {
                failed_requests,
                unmet,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionSpec;

    fn registry_with(specs: Vec<InteractionSpec>) -> InteractionRegistry {
        let registry = InteractionRegistry::new();
        for spec in specs {
            registry.register(spec).unwrap();
        }
        registry
    }

    fn spec(id: &str, path: &str) -> InteractionSpec {
        InteractionSpec::builder(format!("get {path}"))
            .id(id)
            .with_request(|r| r.get(path))
            .build()
    }

    #[test]
    fn test_pass_when_all_exercised() {
        let registry = registry_with(vec![spec("p10", "/product/10")]);
        let tracker = VerificationTracker::new();
        registry.mark_exercised(&"p10".into());
        tracker.record(
            200,
            MatchResult::matched("p10".into(), RequestSummary::new("GET", "/product/10")),
        );

        assert!(tracker.finalize(&registry).is_pass());
    }

    #[test]
    fn test_unexercised_interactions_listed_by_id() {
        let registry = registry_with(vec![spec("p10", "/product/10"), spec("list", "/products")]);
        registry.mark_exercised(&"p10".into());

        let verdict = VerificationTracker::new().finalize(&registry);
        let failure = verdict.failure().unwrap();
        assert_eq!(failure.unmet.len(), 1);
        assert_eq!(failure.unmet[0].id.as_str(), "list");
        assert_eq!(failure.unmet[0].hits, 0);
    }

    #[test]
    fn test_unmatched_request_fails_run() {
        let registry = registry_with(vec![spec("p10", "/product/10")]);
        registry.mark_exercised(&"p10".into());
        let tracker = VerificationTracker::new();
        tracker.record(
            500,
            MatchResult::unmatched(
                Some("p10".into()),
                RequestSummary::new("GET", "/product/11"),
                vec![Mismatch::new(
                    "$.path",
                    "/product/10",
                    "/product/11",
                    MismatchReason::PathMismatch,
                )],
            ),
        );

        let verdict = tracker.finalize(&registry);
        assert!(!verdict.is_pass());
        let report = verdict.to_string();
        assert!(report.contains("unmatched request GET /product/11"));
        assert!(report.contains("$.path: path mismatch (expected /product/10, got /product/11)"));
    }

    #[test]
    fn test_optional_and_exact_expectations() {
        let registry = registry_with(vec![
            InteractionSpec::builder("optional")
                .id("opt")
                .with_request(|r| r.get("/opt"))
                .optional()
                .build(),
            InteractionSpec::builder("twice")
                .id("twice")
                .with_request(|r| r.get("/twice"))
                .times(2)
                .build(),
        ]);
        registry.mark_exercised(&"twice".into());

        let verdict = VerificationTracker::new().finalize(&registry);
        let unmet = &verdict.failure().unwrap().unmet;
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].id.as_str(), "twice");
        assert_eq!(unmet[0].expected, Expectation::Exactly(2));

        registry.mark_exercised(&"twice".into());
        assert!(VerificationTracker::new().finalize(&registry).is_pass());
    }

    #[test]
    fn test_malformed_result_carries_reason() {
        let result = MatchResult::malformed(RequestSummary::new("POST", "/x"), "invalid JSON body");
        assert!(!result.matched);
        assert_eq!(result.mismatches[0].reason, MismatchReason::MalformedRequest);
        assert_eq!(result.mismatches[0].actual, "invalid JSON body");
    }
}
