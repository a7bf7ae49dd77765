//! Interaction specifications: what the consumer sends and what the mock
//! provider answers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::matcher::{
    MatcherNode, Mismatch, MismatchReason, literal, match_value_at, path,
};
use crate::request::HttpRequest;

/// Identifier of a registered interaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionId(String);

impl InteractionId {
    /// Wrap an explicit identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InteractionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for InteractionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How often an interaction must be exercised for the run to pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expectation {
    /// One or more times
    #[default]
    AtLeastOnce,
    /// Any number of times, including zero
    Optional,
    /// Exactly this many times
    Exactly(usize),
}

impl Expectation {
    /// Whether `hits` satisfies the expectation.
    #[must_use]
    pub const fn is_met(self, hits: usize) -> bool {
        match self {
            Self::AtLeastOnce => hits >= 1,
            Self::Optional => true,
            Self::Exactly(n) => hits == n,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeastOnce => f.write_str("at least once"),
            Self::Optional => f.write_str("optional"),
            Self::Exactly(n) => write!(f, "exactly {n} times"),
        }
    }
}

/// Expected shape of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPattern {
    /// Upper-case HTTP method
    pub method: String,
    /// Path matcher, usually a literal string or a regex
    pub path: MatcherNode,
    /// Header name (lower-case) to matcher
    pub headers: BTreeMap<String, MatcherNode>,
    /// Query parameter matchers; `None` leaves the query unconstrained
    pub query: Option<BTreeMap<String, MatcherNode>>,
    /// Body matcher; `None` leaves the body unconstrained
    pub body: Option<MatcherNode>,
}

impl Default for RequestPattern {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: literal("/"),
            headers: BTreeMap::new(),
            query: None,
            body: None,
        }
    }
}

impl RequestPattern {
    /// Whether method and path could apply to the request.
    #[must_use]
    pub fn applies_to(&self, method: &str, request_path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
            && match_value_at(&self.path, &Value::String(request_path.to_string()), "$.path")
                .is_match()
    }

    /// Compare a request against the full pattern, collecting every mismatch.
    #[must_use]
    pub fn compare(&self, request: &HttpRequest) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();

        if !self.method.eq_ignore_ascii_case(&request.method) {
            mismatches.push(Mismatch::new(
                "$.method",
                &self.method,
                &request.method,
                MismatchReason::MethodMismatch,
            ));
        }

        let actual_path = Value::String(request.path.clone());
        if !match_value_at(&self.path, &actual_path, "$.path").is_match() {
            mismatches.push(Mismatch::new(
                "$.path",
                describe(&self.path),
                &request.path,
                MismatchReason::PathMismatch,
            ));
        }

        if let Some(expected_query) = &self.query {
            for (name, node) in expected_query {
                let at = path::key("$.query", name);
                match request.query.get(name) {
                    None => mismatches.push(Mismatch::new(
                        at,
                        describe(node),
                        "<absent>",
                        MismatchReason::MissingQueryParameter,
                    )),
                    Some(values) => {
                        let actual = query_value(node, values);
                        mismatches.extend(match_value_at(node, &actual, &at).mismatches);
                    }
                }
            }
            for (name, values) in &request.query {
                if !expected_query.contains_key(name) {
                    mismatches.push(Mismatch::new(
                        path::key("$.query", name),
                        "<absent>",
                        values.join(","),
                        MismatchReason::UnexpectedQueryParameter,
                    ));
                }
            }
        }

        for (name, node) in &self.headers {
            let at = path::key("$.header", name);
            match request.headers.get(name) {
                None => mismatches.push(Mismatch::new(
                    at,
                    describe(node),
                    "<absent>",
                    MismatchReason::MissingHeader,
                )),
                Some(value) => {
                    let actual = Value::String(normalize_header(name, node, value));
                    mismatches.extend(match_value_at(node, &actual, &at).mismatches);
                }
            }
        }

        if let Some(node) = &self.body {
            match &request.body {
                None => mismatches.push(Mismatch::new(
                    "$.body",
                    node.resolve_example().to_string(),
                    "<absent>",
                    MismatchReason::MissingBody,
                )),
                Some(body) => mismatches.extend(match_value_at(node, body, "$.body").mismatches),
            }
        }

        mismatches
    }

    /// Example path served in documents.
    #[must_use]
    pub fn example_path(&self) -> String {
        self.path.resolve_string()
    }

    /// Key used to detect duplicate registrations. Paths compare as matchers,
    /// so a literal and a regex with the same text stay distinct.
    pub(crate) fn identity(&self) -> (String, &MatcherNode) {
        (self.method.to_ascii_uppercase(), &self.path)
    }

    /// Path matcher as shown in diagnostics.
    #[must_use]
    pub fn describe_path(&self) -> String {
        describe(&self.path)
    }
}

/// Values of one query name. Sequence matchers always see an array; other
/// matchers see a string for a single value and an array for repeats.
fn query_value(node: &MatcherNode, values: &[String]) -> Value {
    let expects_sequence = matches!(
        node,
        MatcherNode::EachLike { .. } | MatcherNode::Array(_)
    ) || matches!(node.resolve_example(), Value::Array(_));
    match values {
        [single] if !expects_sequence => Value::String(single.clone()),
        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
    }
}

/// A literal `Content-Type` without parameters is compared against the media
/// type only, so `application/json` accepts `application/json; charset=utf-8`.
fn normalize_header(name: &str, node: &MatcherNode, value: &str) -> String {
    if name == "content-type" {
        if let MatcherNode::Literal(Value::String(expected)) = node {
            if !expected.contains(';') {
                return value.split(';').next().unwrap_or_default().trim().to_string();
            }
        }
    }
    value.to_string()
}

/// Short description of a matcher for diagnostics.
fn describe(node: &MatcherNode) -> String {
    match node {
        MatcherNode::Regex { pattern, .. } => pattern.to_string(),
        other => other.resolve_string(),
    }
}

/// Response served when an interaction matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTemplate {
    /// HTTP status code
    pub status: u16,
    /// Header name to matcher; examples are served
    pub headers: BTreeMap<String, MatcherNode>,
    /// Body matcher tree; the resolved example is served
    pub body: Option<MatcherNode>,
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// A response with every matcher resolved to its example.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    /// HTTP status code
    pub status: u16,
    /// Header values
    pub headers: BTreeMap<String, String>,
    /// Body value
    pub body: Option<Value>,
}

impl ResponseTemplate {
    /// Header examples, adding `Content-Type: application/json` for JSON
    /// bodies when none was declared.
    #[must_use]
    pub fn rendered_headers(&self) -> BTreeMap<String, String> {
        let mut headers: BTreeMap<String, String> = self
            .headers
            .iter()
            .map(|(name, node)| (name.clone(), node.resolve_string()))
            .collect();
        let needs_content_type = self
            .body
            .as_ref()
            .is_some_and(|body| !matches!(body.resolve_example(), Value::String(_)));
        if needs_content_type && !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        headers
    }

    /// Resolve status, headers and body.
    #[must_use]
    pub fn render(&self) -> RenderedResponse {
        RenderedResponse {
            status: self.status,
            headers: self.rendered_headers(),
            body: self.body.as_ref().map(MatcherNode::resolve_example),
        }
    }
}

/// A registered expectation: provider state, request pattern, response.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSpec {
    /// Unique identifier
    pub id: InteractionId,
    /// Precondition the provider must set up
    pub provider_state: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Request the consumer is expected to send
    pub request: RequestPattern,
    /// Response the mock provider returns
    pub response: ResponseTemplate,
    /// How often the interaction must be exercised
    pub expectation: Expectation,
}

impl InteractionSpec {
    /// Start building an interaction.
    #[must_use]
    pub fn builder(description: impl Into<String>) -> InteractionBuilder {
        InteractionBuilder::new(description)
    }

    /// `METHOD path` for logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.request.method, self.request.example_path())
    }
}

/// Fluent builder for [`InteractionSpec`].
#[derive(Debug, Clone)]
pub struct InteractionBuilder {
    spec: InteractionSpec,
}

impl InteractionBuilder {
    /// New builder with a generated id.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            spec: InteractionSpec {
                id: InteractionId::generate(),
                provider_state: None,
                description: description.into(),
                request: RequestPattern::default(),
                response: ResponseTemplate::default(),
                expectation: Expectation::default(),
            },
        }
    }

    /// Use an explicit id.
    #[must_use]
    pub fn id(mut self, id: impl Into<InteractionId>) -> Self {
        self.spec.id = id.into();
        self
    }

    /// Set the provider state.
    #[must_use]
    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.spec.provider_state = Some(state.into());
        self
    }

    /// Describe the request.
    #[must_use]
    pub fn with_request(mut self, f: impl FnOnce(RequestBuilder) -> RequestBuilder) -> Self {
        self.spec.request = f(RequestBuilder::default()).pattern;
        self
    }

    /// Describe the response.
    #[must_use]
    pub fn will_respond_with(mut self, f: impl FnOnce(ResponseBuilder) -> ResponseBuilder) -> Self {
        self.spec.response = f(ResponseBuilder::default()).template;
        self
    }

    /// The interaction may go unexercised.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.spec.expectation = Expectation::Optional;
        self
    }

    /// The interaction must be exercised exactly `n` times.
    #[must_use]
    pub const fn times(mut self, n: usize) -> Self {
        self.spec.expectation = Expectation::Exactly(n);
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> InteractionSpec {
        self.spec
    }
}

/// Builder for [`RequestPattern`].
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    pattern: RequestPattern,
}

impl RequestBuilder {
    /// Set the method.
    #[must_use]
    pub fn method(mut self, method: &str) -> Self {
        self.pattern.method = method.to_ascii_uppercase();
        self
    }

    /// Literal path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.pattern.path = literal(path.into());
        self
    }

    /// Path matcher (e.g. a regex).
    #[must_use]
    pub fn path_matching(mut self, node: MatcherNode) -> Self {
        self.pattern.path = node;
        self
    }

    /// `GET path`.
    #[must_use]
    pub fn get(self, path: impl Into<String>) -> Self {
        self.method("GET").path(path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(self, path: impl Into<String>) -> Self {
        self.method("POST").path(path)
    }

    /// Literal header.
    #[must_use]
    pub fn header(self, name: &str, value: impl Into<String>) -> Self {
        self.header_matching(name, literal(value.into()))
    }

    /// Header matcher.
    #[must_use]
    pub fn header_matching(mut self, name: &str, node: MatcherNode) -> Self {
        self.pattern.headers.insert(name.to_ascii_lowercase(), node);
        self
    }

    /// Literal query parameter. Declaring any parameter makes undeclared ones
    /// a mismatch.
    #[must_use]
    pub fn query_param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_matching(name, literal(value.into()))
    }

    /// Query parameter matcher.
    #[must_use]
    pub fn query_matching(mut self, name: impl Into<String>, node: MatcherNode) -> Self {
        self.pattern
            .query
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), node);
        self
    }

    /// Require an empty query string.
    #[must_use]
    pub fn no_query(mut self) -> Self {
        self.pattern.query = Some(BTreeMap::new());
        self
    }

    /// Body matcher tree.
    #[must_use]
    pub fn body(mut self, node: MatcherNode) -> Self {
        self.pattern.body = Some(node);
        self
    }

    /// Exact JSON body.
    #[must_use]
    pub fn json_body(self, body: Value) -> Self {
        self.body(MatcherNode::Literal(body))
    }
}

/// Builder for [`ResponseTemplate`].
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    template: ResponseTemplate,
}

impl ResponseBuilder {
    /// Status code.
    #[must_use]
    pub const fn status(mut self, status: u16) -> Self {
        self.template.status = status;
        self
    }

    /// Literal header.
    #[must_use]
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_matching(name, literal(value.into()))
    }

    /// Header matcher; the example is served.
    #[must_use]
    pub fn header_matching(mut self, name: impl Into<String>, node: MatcherNode) -> Self {
        self.template.headers.insert(name.into(), node);
        self
    }

    /// Body matcher tree; the example is served.
    #[must_use]
    pub fn body(mut self, node: MatcherNode) -> Self {
        self.template.body = Some(node);
        self
    }

    /// Exact JSON body.
    #[must_use]
    pub fn json_body(self, body: Value) -> Self {
        self.body(MatcherNode::Literal(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{each_like, like, term};
    use serde_json::json;

    fn product_spec() -> InteractionSpec {
        InteractionSpec::builder("get product 10")
            .given("product 10 exists")
            .with_request(|r| r.get("/product/10").header("Accept", "application/json"))
            .will_respond_with(|r| {
                r.status(200)
                    .body(like(json!({"id": "10", "type": "CREDIT_CARD", "name": "28 Degrees"})))
            })
            .build()
    }

    #[test]
    fn test_exact_request_has_no_mismatches() {
        let request = HttpRequest::new("GET", "/product/10").with_header("accept", "application/json");
        assert!(product_spec().request.compare(&request).is_empty());
    }

    #[test]
    fn test_path_mismatch_reported() {
        let request = HttpRequest::new("GET", "/product/11").with_header("accept", "application/json");
        let mismatches = product_spec().request.compare(&request);

        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].reason, MismatchReason::PathMismatch);
        assert_eq!(mismatches[0].expected, "/product/10");
        assert_eq!(mismatches[0].actual, "/product/11");
    }

    #[test]
    fn test_all_mismatches_collected() {
        let spec = InteractionSpec::builder("create product")
            .with_request(|r| {
                r.post("/products")
                    .header("Content-Type", "application/json")
                    .query_param("dryRun", "true")
                    .body(like(json!({"name": "x"})))
            })
            .build();
        let request = HttpRequest::new("PUT", "/products").with_query("debug", "1");
        let reasons: Vec<_> = spec
            .request
            .compare(&request)
            .into_iter()
            .map(|m| m.reason)
            .collect();

        assert_eq!(
            reasons,
            vec![
                MismatchReason::MethodMismatch,
                MismatchReason::MissingQueryParameter,
                MismatchReason::UnexpectedQueryParameter,
                MismatchReason::MissingHeader,
                MismatchReason::MissingBody,
            ]
        );
    }

    #[test]
    fn test_sequence_query_matcher_accepts_single_value() {
        let spec = InteractionSpec::builder("products by tag")
            .with_request(|r| r.get("/products").query_matching("tag", each_like("credit")))
            .build();

        let single = HttpRequest::new("GET", "/products").with_query("tag", "debit");
        assert!(spec.request.compare(&single).is_empty());

        let repeated = single.with_query("tag", "gold");
        assert!(spec.request.compare(&repeated).is_empty());
    }

    #[test]
    fn test_scalar_query_matcher_sees_single_value_as_string() {
        let spec = InteractionSpec::builder("products by type")
            .with_request(|r| r.get("/products").query_matching("type", like("CREDIT_CARD")))
            .build();
        let request = HttpRequest::new("GET", "/products").with_query("type", "DEBIT");
        assert!(spec.request.compare(&request).is_empty());
    }

    #[test]
    fn test_content_type_parameters_ignored_for_plain_literal() {
        let spec = InteractionSpec::builder("create")
            .with_request(|r| r.post("/products").header("Content-Type", "application/json"))
            .build();
        let request = HttpRequest::new("POST", "/products")
            .with_header("content-type", "application/json; charset=utf-8");
        assert!(spec.request.compare(&request).is_empty());
    }

    #[test]
    fn test_regex_path_applies_structurally() {
        let spec = InteractionSpec::builder("any product")
            .with_request(|r| r.method("GET").path_matching(term(r"/product/\d+", "/product/10").unwrap()))
            .build();
        assert!(spec.request.applies_to("get", "/product/42"));
        assert!(!spec.request.applies_to("GET", "/product/abc"));
        assert_eq!(spec.request.example_path(), "/product/10");
    }

    #[test]
    fn test_render_resolves_examples_and_defaults_content_type() {
        let template = ResponseTemplate {
            status: 200,
            headers: BTreeMap::new(),
            body: Some(each_like(json!({"id": "10"}))),
        };
        let rendered = template.render();

        assert_eq!(rendered.status, 200);
        assert_eq!(rendered.headers["Content-Type"], "application/json");
        assert_eq!(rendered.body, Some(json!([{"id": "10"}])));
    }

    #[test]
    fn test_expectation_rules() {
        assert!(!Expectation::AtLeastOnce.is_met(0));
        assert!(Expectation::AtLeastOnce.is_met(3));
        assert!(Expectation::Optional.is_met(0));
        assert!(Expectation::Exactly(2).is_met(2));
        assert!(!Expectation::Exactly(2).is_met(3));
    }
}
