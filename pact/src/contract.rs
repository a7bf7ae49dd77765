//! Contract document types.
//!
//! The JSON layout follows Pact v3: resolved examples plus `matchingRules`
//! keyed by JSONPath, so a provider verifier can re-apply the matchers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::PactError;
use crate::interaction::{InteractionSpec, RequestPattern, ResponseTemplate};
use crate::matcher::{MatcherNode, value_to_plain_string};
use crate::rules::{self, MatchingRules};

/// The contract produced by one successful consumer run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    /// Consumer participant
    pub consumer: Participant,
    /// Provider participant
    pub provider: Participant,
    /// Contract format version
    pub spec_version: String,
    /// Exercised interactions in registration order
    pub interactions: Vec<Interaction>,
    /// Contract metadata
    pub metadata: ContractMetadata,
}

/// A participant in a contract (consumer or provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Participant name
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An interaction in a contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Interaction description
    pub description: String,
    /// Provider state (precondition)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    /// Expected request
    pub request: Request,
    /// Expected response
    pub response: Response,
}

/// HTTP request in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// HTTP method
    pub method: String,
    /// Example request path
    pub path: String,
    /// Query parameters; absent when the query is unconstrained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, Vec<String>>>,
    /// Request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Matcher annotations
    #[serde(default, skip_serializing_if = "MatchingRules::is_empty")]
    pub matching_rules: MatchingRules,
}

/// HTTP response in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Matcher annotations
    #[serde(default, skip_serializing_if = "MatchingRules::is_empty")]
    pub matching_rules: MatchingRules,
}

/// Contract metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractMetadata {
    /// Pact specification version
    #[serde(rename = "pactSpecification")]
    pub pact_specification: PactSpecification,
}

/// Pact specification version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PactSpecification {
    /// Version string
    pub version: String,
}

impl ContractMetadata {
    /// Metadata for the given format version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            pact_specification: PactSpecification {
                version: version.into(),
            },
        }
    }
}

impl Default for ContractMetadata {
    fn default() -> Self {
        Self::new("3.0.0")
    }
}

impl ContractDocument {
    /// An empty document between two participants.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>, spec_version: impl Into<String>) -> Self {
        let spec_version = spec_version.into();
        Self {
            consumer: Participant::new(consumer),
            provider: Participant::new(provider),
            metadata: ContractMetadata::new(spec_version.clone()),
            spec_version,
            interactions: Vec::new(),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Serialization`] if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String, PactError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Serialization`] for invalid JSON or layout.
    pub fn from_json(json: &str) -> Result<Self, PactError> {
        Ok(serde_json::from_str(json)?)
    }

    /// `<consumer>-<provider>.json`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            sanitize(&self.consumer.name),
            sanitize(&self.provider.name)
        )
    }

    /// Write the document into `dir`, replacing an earlier one for the same pair.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Io`] if the directory or file cannot be written.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, PactError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.to_json_pretty()?)?;
        info!(
            path = %path.display(),
            interactions = self.interactions.len(),
            "Contract written"
        );
        Ok(path)
    }

    /// Rebuild every interaction for provider-side verification.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] for inconsistent matching rules.
    pub fn to_specs(&self) -> Result<Vec<InteractionSpec>, PactError> {
        self.interactions.iter().map(Interaction::to_spec).collect()
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl Interaction {
    /// Document entry for a registered interaction.
    #[must_use]
    pub fn from_spec(spec: &InteractionSpec) -> Self {
        Self {
            description: spec.description.clone(),
            provider_state: spec.provider_state.clone(),
            request: Request::from_pattern(&spec.request),
            response: Response::from_template(&spec.response),
        }
    }

    /// Rebuild an [`InteractionSpec`] with matchers restored from the rules.
    ///
    /// The id is freshly generated and the expectation is the default.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] for a regex rule its example violates.
    pub fn to_spec(&self) -> Result<InteractionSpec, PactError> {
        let mut builder = InteractionSpec::builder(self.description.clone());
        if let Some(state) = &self.provider_state {
            builder = builder.given(state.clone());
        }
        let mut spec = builder.build();
        spec.request = self.request.to_pattern()?;
        spec.response = self.response.to_template()?;
        Ok(spec)
    }
}

impl Request {
    fn from_pattern(pattern: &RequestPattern) -> Self {
        let mut matching_rules = MatchingRules {
            path: rules::encode_flat(&pattern.path),
            ..MatchingRules::default()
        };

        let query: Option<BTreeMap<String, Vec<String>>> = pattern.query.as_ref().map(|query| {
            query
                .iter()
                .map(|(name, node)| {
                    rules::encode_named(name, node, &mut matching_rules.query);
                    (name.clone(), query_examples(node))
                })
                .collect()
        });

        let headers = encode_headers(&pattern.headers, &mut matching_rules.header);
        let body = pattern.body.as_ref().map(|node| {
            matching_rules.body = rules::encode_body(node);
            node.resolve_example()
        });

        Self {
            method: pattern.method.clone(),
            path: pattern.example_path(),
            query,
            headers,
            body,
            matching_rules,
        }
    }

    fn to_pattern(&self) -> Result<RequestPattern, PactError> {
        let matching = &self.matching_rules;
        let query = match &self.query {
            Some(query) => {
                let mut nodes = BTreeMap::new();
                for (name, values) in query {
                    let example = match values.as_slice() {
                        [single] if !rules::names_sequence(name, &matching.query) => {
                            Value::String(single.clone())
                        }
                        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
                    };
                    nodes.insert(name.clone(), rules::decode_named(name, &example, &matching.query)?);
                }
                Some(nodes)
            }
            None => None,
        };

        Ok(RequestPattern {
            method: self.method.to_ascii_uppercase(),
            path: rules::decode_flat(Value::String(self.path.clone()), matching.path.as_ref())?,
            headers: decode_headers(&self.headers, &matching.header, true)?,
            query,
            body: decode_optional_body(self.body.as_ref(), matching)?,
        })
    }
}

impl Response {
    fn from_template(template: &ResponseTemplate) -> Self {
        let mut matching_rules = MatchingRules::default();
        let headers = encode_headers(&template.headers, &mut matching_rules.header);
        let body = template.body.as_ref().map(|node| {
            matching_rules.body = rules::encode_body(node);
            node.resolve_example()
        });
        Self {
            status: template.status,
            headers,
            body,
            matching_rules,
        }
    }

    fn to_template(&self) -> Result<ResponseTemplate, PactError> {
        Ok(ResponseTemplate {
            status: self.status,
            headers: decode_headers(&self.headers, &self.matching_rules.header, false)?,
            body: decode_optional_body(self.body.as_ref(), &self.matching_rules)?,
        })
    }
}

fn query_examples(node: &MatcherNode) -> Vec<String> {
    match node.resolve_example() {
        Value::Array(items) => items.iter().map(value_to_plain_string).collect(),
        other => vec![value_to_plain_string(&other)],
    }
}

fn encode_headers(
    headers: &BTreeMap<String, MatcherNode>,
    header_rules: &mut BTreeMap<String, rules::RuleList>,
) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, node)| {
            rules::encode_named(name, node, header_rules);
            (name.clone(), node.resolve_string())
        })
        .collect()
}

fn decode_headers(
    headers: &BTreeMap<String, String>,
    header_rules: &BTreeMap<String, rules::RuleList>,
    lowercase: bool,
) -> Result<BTreeMap<String, MatcherNode>, PactError> {
    let mut nodes = BTreeMap::new();
    for (name, value) in headers {
        let node = rules::decode_named(name, &Value::String(value.clone()), header_rules)?;
        let key = if lowercase { name.to_ascii_lowercase() } else { name.clone() };
        nodes.insert(key, node);
    }
    Ok(nodes)
}

fn decode_optional_body(body: Option<&Value>, matching: &MatchingRules) -> Result<Option<MatcherNode>, PactError> {
    body.map(|example| rules::decode_body(example, &matching.body)).transpose()
}
