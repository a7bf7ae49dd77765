//! Decoded view of a request received by the mock server.

use std::collections::BTreeMap;

use axum::http::{header, request::Parts};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PactError;

/// Method and path of a request, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    /// HTTP method
    pub method: String,
    /// Request path without query
    pub path: String,
}

impl RequestSummary {
    /// Create a summary.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Summary from raw request parts.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.method.as_str(), parts.uri.path())
    }
}

impl std::fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A fully decoded incoming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    /// Upper-case HTTP method
    pub method: String,
    /// Raw request path
    pub path: String,
    /// Query parameters in arrival order per name
    pub query: BTreeMap<String, Vec<String>>,
    /// Lower-cased header names; repeated headers joined with `", "`
    pub headers: BTreeMap<String, String>,
    /// Body as JSON, or as a JSON string for non-JSON text; `None` when empty
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Start a request for tests and in-process dispatch.
    #[must_use]
    pub fn new(method: &str, path: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Add a query parameter value.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Decode request parts and the collected body.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::MalformedRequest`] for non UTF-8 header values,
    /// a JSON body that does not parse, or a non-JSON body that is not UTF-8.
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Result<Self, PactError> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in &parts.headers {
            let value = value
                .to_str()
                .map_err(|_| PactError::malformed(format!("header {name} is not valid UTF-8")))?;
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(raw) = parts.uri.query() {
            for (name, value) in url::form_urlencoded::parse(raw.as_bytes()).into_owned() {
                query.entry(name).or_default().push(value);
            }
        }

        let content_type = headers.get(header::CONTENT_TYPE.as_str()).map(String::as_str);
        let body = decode_body(content_type, body)?;

        Ok(Self {
            method: parts.method.as_str().to_ascii_uppercase(),
            path: parts.uri.path().to_string(),
            query,
            headers,
            body,
        })
    }

    /// Method and path.
    #[must_use]
    pub fn summary(&self) -> RequestSummary {
        RequestSummary::new(self.method.clone(), self.path.clone())
    }
}

fn decode_body(content_type: Option<&str>, body: &[u8]) -> Result<Option<Value>, PactError> {
    if body.is_empty() {
        return Ok(None);
    }
    let declared_json = content_type.is_some_and(is_json_media_type);
    if declared_json {
        return serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| PactError::malformed(format!("invalid JSON body: {e}")));
    }
    if content_type.is_none() {
        if let Ok(value) = serde_json::from_slice(body) {
            return Ok(Some(value));
        }
    }
    std::str::from_utf8(body)
        .map(|text| Some(Value::String(text.to_string())))
        .map_err(|_| PactError::malformed("body is neither JSON nor UTF-8 text"))
}

/// Whether a `Content-Type` value denotes JSON (`application/json`, `+json`).
#[must_use]
pub fn is_json_media_type(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}
