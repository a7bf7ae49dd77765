//! Test fixtures with sample data.
//!
//! A small product catalog: the consumer is `web-frontend`, the provider
//! `catalog-service`.

use contract_pact::InteractionSpec;
use contract_pact::matcher::{each_like, like, term};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Consumer name used by the fixtures.
pub const CONSUMER: &str = "web-frontend";
/// Provider name used by the fixtures.
pub const PROVIDER: &str = "catalog-service";

/// Sample product as served by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleProduct {
    /// Product id
    pub id: u32,
    /// Product type
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name
    pub name: String,
}

impl SampleProduct {
    /// A credit card product with the given id.
    #[must_use]
    pub fn credit_card(id: u32) -> Self {
        Self {
            id,
            kind: "CREDIT_CARD".to_string(),
            name: "28 Degrees".to_string(),
        }
    }

    /// JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({"id": self.id, "type": self.kind, "name": self.name})
    }
}

/// `GET /product/{id}` answering with a type-matched product.
#[must_use]
pub fn get_product_interaction(id: u32) -> InteractionSpec {
    InteractionSpec::builder(format!("a request for product {id}"))
        .id(format!("get-product-{id}"))
        .given(format!("product {id} exists"))
        .with_request(|r| {
            r.get(format!("/product/{id}"))
                .header("Accept", "application/json")
        })
        .will_respond_with(|r| {
            r.status(200)
                .header("Content-Type", "application/json")
                .body(like(SampleProduct::credit_card(id).to_json()))
        })
        .build()
}

/// `GET /product/{digits}` answering with any product.
///
/// # Panics
///
/// Never in practice; the pattern and example are fixed and consistent.
#[must_use]
#[allow(clippy::expect_used)]
pub fn any_product_interaction() -> InteractionSpec {
    InteractionSpec::builder("a request for any product")
        .id("get-any-product")
        .given("products exist")
        .with_request(|r| {
            r.method("GET")
                .path_matching(term(r"/product/\d+", "/product/1").expect("valid product path matcher"))
        })
        .will_respond_with(|r| r.body(like(SampleProduct::credit_card(1).to_json())))
        .build()
}

/// `GET /products` answering with a non-empty product list.
#[must_use]
pub fn list_products_interaction() -> InteractionSpec {
    InteractionSpec::builder("a request for all products")
        .id("list-products")
        .given("products exist")
        .with_request(|r| r.get("/products"))
        .will_respond_with(|r| {
            r.status(200)
                .header("Content-Type", "application/json")
                .body(each_like(SampleProduct::credit_card(10).to_json()))
        })
        .build()
}

/// `POST /products` with an exact body, answering 201.
#[must_use]
pub fn create_product_interaction() -> InteractionSpec {
    InteractionSpec::builder("a request to create a product")
        .id("create-product")
        .with_request(|r| {
            r.post("/products")
                .header("Content-Type", "application/json")
                .json_body(json!({"type": "CREDIT_CARD", "name": "28 Degrees"}))
        })
        .will_respond_with(|r| {
            r.status(201)
                .header("Location", "/product/10")
                .body(like(SampleProduct::credit_card(10).to_json()))
        })
        .build()
}
