//! Request dispatch for the mock server.
//!
//! Every request, whatever its method or path, goes through [`dispatch`]:
//! candidates are tried in registration order and the first one without
//! mismatches answers. Non-matches get a 500 with a JSON diagnostic.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::PactError;
use crate::interaction::InteractionSpec;
use crate::matcher::Mismatch;
use crate::registry::InteractionRegistry;
use crate::request::{HttpRequest, RequestSummary};
use crate::verification::{MatchResult, VerificationTracker};

/// Shared state for the mock router.
#[derive(Debug, Clone)]
pub struct MockApiState {
    /// Registered interactions
    pub registry: Arc<InteractionRegistry>,
    /// Match outcomes of the run
    pub tracker: Arc<VerificationTracker>,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

/// Response produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    /// Status code
    pub status: StatusCode,
    /// Header values
    pub headers: BTreeMap<String, String>,
    /// Body; strings are sent as raw text, anything else as JSON
    pub body: Option<Value>,
}

impl MockResponse {
    fn json(status: StatusCode, body: Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body: Some(body),
        }
    }

    fn error(err: &PactError, request: &RequestSummary, closest: Option<&InteractionSpec>, mismatches: &[Mismatch]) -> Self {
        let closest = closest.map(|spec| {
            json!({
                "id": spec.id,
                "description": spec.description,
                "request": spec.label(),
            })
        });
        Self::json(
            err.status_code(),
            json!({
                "error": err.kind(),
                "message": err.to_string(),
                "request": request,
                "closestInteraction": closest,
                "mismatches": mismatches,
            }),
        )
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!(header = %name, "Skipping response header that is not valid HTTP"),
            }
        }
        let body = match self.body {
            None => Body::empty(),
            Some(Value::String(text)) => Body::from(text),
            Some(other) => Body::from(other.to_string()),
        };
        (self.status, headers, body).into_response()
    }
}

/// Router answering every path through the registry.
pub fn create_mock_router(state: MockApiState) -> Router {
    Router::new().fallback(handle_request).with_state(state)
}

async fn handle_request(State(state): State<MockApiState>, request: Request) -> MockResponse {
    let (parts, body) = request.into_parts();
    let summary = RequestSummary::from_parts(&parts);

    let decoded = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => HttpRequest::from_parts(&parts, &bytes),
        Err(e) => Err(PactError::malformed(format!(
            "body rejected (limit {} bytes): {e}",
            state.max_body_bytes
        ))),
    };

    match decoded {
        Ok(request) => dispatch(&state.registry, &state.tracker, &request),
        Err(err) => malformed(&state.tracker, summary, &err),
    }
}

fn malformed(tracker: &VerificationTracker, summary: RequestSummary, err: &PactError) -> MockResponse {
    warn!(request = %summary, error = %err, "Malformed request");
    let result = MatchResult::malformed(summary.clone(), err.to_string());
    let response = MockResponse::error(err, &summary, None, &result.mismatches);
    tracker.record(response.status.as_u16(), result);
    response
}

/// Match a decoded request, record the outcome and build the response.
pub fn dispatch(
    registry: &InteractionRegistry,
    tracker: &VerificationTracker,
    request: &HttpRequest,
) -> MockResponse {
    let summary = request.summary();

    let matched = registry
        .find_candidates(&request.method, &request.path)
        .into_iter()
        .find(|candidate| candidate.request.compare(request).is_empty());

    if let Some(spec) = matched {
        registry.mark_exercised(&spec.id);
        let rendered = spec.response.render();
        debug!(request = %summary, interaction = %spec.id, status = rendered.status, "Request matched");
        tracker.record(rendered.status, MatchResult::matched(spec.id.clone(), summary));
        return MockResponse {
            status: StatusCode::from_u16(rendered.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: rendered.headers,
            body: rendered.body,
        };
    }

    let closest = registry
        .all()
        .into_iter()
        .map(|spec| {
            let mismatches = spec.request.compare(request);
            (spec, mismatches)
        })
        .min_by_key(|(_, mismatches)| mismatches.len());
    let (closest_spec, mismatches) = match closest {
        Some((spec, mismatches)) => (Some(spec), mismatches),
        None => (None, Vec::new()),
    };

    let err = PactError::NoMatchingInteraction {
        method: summary.method.clone(),
        path: summary.path.clone(),
        mismatches: mismatches.len(),
    };
    warn!(
        request = %summary,
        closest = ?closest_spec.as_ref().map(|spec| spec.id.as_str()),
        mismatches = mismatches.len(),
        "No matching interaction"
    );

    let response = MockResponse::error(&err, &summary, closest_spec.as_deref(), &mismatches);
    tracker.record(
        response.status.as_u16(),
        MatchResult::unmatched(closest_spec.map(|spec| spec.id.clone()), summary, mismatches),
    );
    response
}
