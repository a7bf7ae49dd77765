//! End-to-end consumer runs against live mock servers.
//!
//! Each test drives the catalog consumer over real HTTP and checks the
//! verdict and the contract document of the run.

use std::time::Duration;

use anyhow::Result;
use contract_common::{HttpConfig, TracingConfig, build_http_client, init_tracing};
use contract_pact::prelude::*;
use contract_pact::{DirectoryPublisher, MismatchReason, ServerState};
use serde_json::Value;
use test_utils::CatalogClient;
use test_utils::fixtures::{
    CONSUMER, PROVIDER, SampleProduct, any_product_interaction, create_product_interaction,
    get_product_interaction, list_products_interaction,
};

fn init() {
    init_tracing(&TracingConfig::default().with_log_level("debug").for_tests());
}

fn server() -> MockServer {
    let config = MockServerConfig::default()
        .with_shutdown_timeout(Duration::from_secs(1))
        .with_contract_dir(std::env::temp_dir().join(format!("pacts-{}", uuid::Uuid::new_v4())));
    MockServer::with_config(CONSUMER, PROVIDER, config)
}

#[tokio::test]
async fn get_existing_product_passes() -> Result<()> {
    init();
    let mut server = server();
    server.register_interaction(get_product_interaction(10))?;
    let url = server.start().await?;

    let product = CatalogClient::new(url)?.get_product(10).await?;
    assert_eq!(product, SampleProduct::credit_card(10));

    let verdict = server.stop().await?;
    assert!(verdict.is_pass(), "{verdict}");

    let document = server.document()?;
    assert_eq!(document.consumer.name, CONSUMER);
    assert_eq!(document.interactions.len(), 1);
    assert_eq!(document.interactions[0].request.path, "/product/10");
    assert_eq!(
        document.interactions[0].provider_state.as_deref(),
        Some("product 10 exists")
    );
    Ok(())
}

#[tokio::test]
async fn get_unknown_product_fails_with_path_diagnostic() -> Result<()> {
    init();
    let mut server = server();
    server.register_interaction(get_product_interaction(10))?;
    let url = server.start().await?;

    let http = build_http_client(&HttpConfig::default())?;
    let response = http
        .get(url.join("/product/11")?)
        .header("Accept", "application/json")
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "NoMatchingInteraction");
    assert_eq!(body["mismatches"][0]["path"], "$.path");
    assert_eq!(body["mismatches"][0]["expected"], "/product/10");
    assert_eq!(body["mismatches"][0]["actual"], "/product/11");

    let verdict = server.stop().await?;
    let failure = verdict.failure().expect("run must fail");
    assert_eq!(failure.failed_requests.len(), 1);
    assert_eq!(
        failure.failed_requests[0].mismatches[0].reason,
        MismatchReason::PathMismatch
    );
    assert_eq!(failure.unmet.len(), 1);
    assert_eq!(failure.unmet[0].id.as_str(), "get-product-10");
    assert!(matches!(server.document(), Err(PactError::RunFailed { .. })));
    Ok(())
}

#[tokio::test]
async fn list_products_returns_non_empty_array() -> Result<()> {
    init();
    let mut server = server();
    server.register_interaction(list_products_interaction())?;
    let url = server.start().await?;

    let products = CatalogClient::new(url)?.list_products().await?;
    assert!(!products.is_empty());

    assert!(server.stop().await?.is_pass());
    let document = server.document()?;
    let rules = &document.interactions[0].response.matching_rules.body;
    assert!(rules.contains_key("$"));
    assert!(rules.contains_key("$[*]"));
    Ok(())
}

#[tokio::test]
async fn document_follows_registration_order() -> Result<()> {
    init();
    let mut server = server();
    server.register_interaction(list_products_interaction())?;
    server.register_interaction(get_product_interaction(10))?;
    server.register_interaction(create_product_interaction())?;
    let url = server.start().await?;

    let client = CatalogClient::new(url)?;
    let location = client.create_product("CREDIT_CARD", "28 Degrees").await?;
    assert_eq!(location, "/product/10");
    client.get_product(10).await?;
    client.list_products().await?;

    assert!(server.stop().await?.is_pass());
    let descriptions: Vec<_> = server
        .document()?
        .interactions
        .into_iter()
        .map(|i| i.description)
        .collect();
    assert_eq!(
        descriptions,
        vec![
            "a request for all products",
            "a request for product 10",
            "a request to create a product",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_are_all_recorded() -> Result<()> {
    init();
    let mut server = server();
    server.register_interaction(any_product_interaction())?;
    let url = server.start().await?;

    let client = CatalogClient::new(url)?;
    let mut tasks = tokio::task::JoinSet::new();
    for id in 1..=16 {
        let client = client.clone();
        tasks.spawn(async move { client.get_product(id).await });
    }
    while let Some(result) = tasks.join_next().await {
        result??;
    }

    assert!(server.stop().await?.is_pass());
    assert_eq!(server.match_results().len(), 16);
    assert_eq!(server.registry().hit_count(&"get-any-product".into()), 16);
    Ok(())
}

#[tokio::test]
async fn written_contract_round_trips_for_provider_verification() -> Result<()> {
    init();
    let mut server = server();
    server.register_interaction(get_product_interaction(10))?;
    let url = server.start().await?;
    CatalogClient::new(url)?.get_product(10).await?;
    server.stop().await?;

    let path = server.write_contract()?;
    assert!(path.ends_with("web-frontend-catalog-service.json"));

    let document = ContractDocument::from_json(&std::fs::read_to_string(&path)?)?;
    let specs = document.to_specs()?;
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].request, get_product_interaction(10).request);

    let publisher = DirectoryPublisher::new(server.config().contract_dir.clone());
    let published = server.publish(&publisher).await?;
    assert_eq!(published, document);

    std::fs::remove_dir_all(&server.config().contract_dir)?;
    Ok(())
}

#[tokio::test]
async fn dropped_server_stops_serving() -> Result<()> {
    init();
    let url = {
        let mut server = server();
        server.register_interaction(get_product_interaction(10))?;
        let url = server.start().await?;
        assert_eq!(server.state(), ServerState::Listening);
        url
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let http = build_http_client(&HttpConfig::default().with_pool_max_idle(0))?;
    let result = http.get(url.join("/product/10")?).send().await;
    assert!(result.is_err());
    Ok(())
}
