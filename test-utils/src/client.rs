//! A minimal catalog consumer, the client code exercised against mock servers.

use anyhow::{Context, Result, bail};
use contract_common::{HttpConfig, build_http_client};
use reqwest::{Client, StatusCode};
use serde_json::json;
use url::Url;

use crate::fixtures::SampleProduct;

/// HTTP client for the product catalog API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: Url,
    http: Client,
}

impl CatalogClient {
    /// Client for the catalog at `base_url`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(base_url: Url) -> Result<Self> {
        let http = build_http_client(&HttpConfig::default().with_user_agent("web-frontend/test"))
            .context("building HTTP client")?;
        Ok(Self { base_url, http })
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success status or an unexpected body.
    pub async fn get_product(&self, id: u32) -> Result<SampleProduct> {
        let url = self.base_url.join(&format!("/product/{id}"))?;
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("catalog answered {} for product {id}", response.status());
        }
        Ok(response.json().await?)
    }

    /// Fetch the product list.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success status or an unexpected body.
    pub async fn list_products(&self) -> Result<Vec<SampleProduct>> {
        let response = self.http.get(self.base_url.join("/products")?).send().await?;
        if !response.status().is_success() {
            bail!("catalog answered {} for product list", response.status());
        }
        Ok(response.json().await?)
    }

    /// Create a product; returns the `Location` header.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a status other than 201.
    pub async fn create_product(&self, kind: &str, name: &str) -> Result<String> {
        let response = self
            .http
            .post(self.base_url.join("/products")?)
            .json(&json!({"type": kind, "name": name}))
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            bail!("catalog answered {} for create", response.status());
        }
        let location = response
            .headers()
            .get("location")
            .context("missing Location header")?
            .to_str()?
            .to_string();
        Ok(location)
    }
}
