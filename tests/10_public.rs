mod common;

use anyhow::Result;
use reqwest::StatusCode;

// Public surface: service info and the health contract. These tests do not
// require a reachable database.

#[tokio::test]
async fn root_reports_service_info() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(&server.base_url).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let payload = res.json::<serde_json::Value>().await?;
    assert!(payload["success"].as_bool().unwrap_or(false), "success=false: {}", payload);
    assert_eq!(payload["data"]["name"], "Workforce API");
    assert!(payload["data"]["endpoints"]["login"].is_string());

    Ok(())
}

#[tokio::test]
async fn health_always_answers_with_envelope() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", server.base_url)).send().await?;
    // 200 with a database, 503 without; both carry the JSON envelope
    assert!(
        res.status() == StatusCode::OK || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );

    let payload = res.json::<serde_json::Value>().await?;
    assert!(payload["success"].is_boolean());
    assert!(payload["data"]["status"].is_string());

    Ok(())
}

#[tokio::test]
async fn unknown_route_is_404() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/definitely-not-a-route", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}
