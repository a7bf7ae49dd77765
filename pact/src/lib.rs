//! Consumer-driven contract testing engine.
//!
//! A consumer test registers interactions on a [`MockServer`], runs its
//! client code against the server's URL, and stops the server to obtain a
//! [`RunVerdict`]. A passing run yields a [`ContractDocument`] listing every
//! exercised interaction with the matcher annotations a provider verifier
//! needs to replay it.
//!
//! ```no_run
//! use contract_pact::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), PactError> {
//! let mut server = MockServer::new("web", "catalog");
//! server.register_interaction(
//!     InteractionSpec::builder("get product 10")
//!         .given("product 10 exists")
//!         .with_request(|r| r.get("/product/10"))
//!         .will_respond_with(|r| r.status(200).body(like(json!({"id": 10, "name": "Widget"}))))
//!         .build(),
//! )?;
//!
//! let url = server.start().await?;
//! // exercise the consumer against `url`
//! # let _ = url;
//! let verdict = server.stop().await?;
//! assert!(verdict.is_pass(), "{verdict}");
//! server.write_contract()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod contract;
pub mod error;
pub mod interaction;
pub mod matcher;
pub mod publisher;
pub mod registry;
pub mod request;
pub mod rules;
pub mod server;
pub mod verification;

pub use builder::ContractDocumentBuilder;
pub use config::{ConfigError, MockServerConfig};
pub use contract::{
    ContractDocument, ContractMetadata, Interaction, PactSpecification, Participant, Request,
    Response,
};
pub use error::PactError;
pub use interaction::{
    Expectation, InteractionBuilder, InteractionId, InteractionSpec, RequestBuilder,
    RequestPattern, ResponseBuilder, ResponseTemplate,
};
pub use matcher::{MatchOutcome, MatcherNode, Mismatch, MismatchReason, match_value};
pub use publisher::{ContractPublisher, DirectoryPublisher};
pub use registry::InteractionRegistry;
pub use request::{HttpRequest, RequestSummary};
pub use rules::{MatchingRule, MatchingRules, RuleList};
pub use server::{MockServer, ServerState};
pub use verification::{
    InteractionLogEntry, MatchResult, RunVerdict, UnmetExpectation, VerificationFailure,
    VerificationTracker,
};

/// Everything a consumer test usually needs.
pub mod prelude {
    pub use crate::error::PactError;
    pub use crate::interaction::{Expectation, InteractionSpec};
    pub use crate::matcher::{array, each_like, each_like_min, like, literal, object, term};
    pub use crate::server::MockServer;
    pub use crate::verification::RunVerdict;
    pub use crate::{ContractDocument, MockServerConfig};
}
