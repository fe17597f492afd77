mod common;

use anyhow::Result;
use reqwest::StatusCode;

// The JWT guard in front of /api/* rejects requests before any database
// access, so these tests run without one.

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in [
        "/api/auth/whoami",
        "/api/users",
        "/api/timesheets",
        "/api/leave",
        "/api/payroll",
        "/api/tasks",
        "/api/reports",
        "/api/notifications",
        "/api/settings",
        "/api/projects",
    ] {
        let res = client
            .get(format!("{}{}", server.base_url, path))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "no 401 for {}", path);

        let payload = res.json::<serde_json::Value>().await?;
        assert_eq!(payload["error"], true, "no error envelope for {}", path);
        assert_eq!(payload["code"], "UNAUTHORIZED", "wrong code for {}", path);
    }

    Ok(())
}

#[tokio::test]
async fn malformed_bearer_token_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/users", server.base_url))
        .header("authorization", "Bearer not.a.jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/users", server.base_url))
        .header("authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let payload = res.json::<serde_json::Value>().await?;
    assert_eq!(payload["code"], "UNAUTHORIZED");

    Ok(())
}

#[tokio::test]
async fn login_requires_credentials() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({ "email": "", "password": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let payload = res.json::<serde_json::Value>().await?;
    assert_eq!(payload["code"], "BAD_REQUEST");

    Ok(())
}
