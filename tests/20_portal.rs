mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn unknown_path_is_404_page() -> Result<()> {
    let server = TestServer::start().await?;
    let resp = reqwest::get(server.url("/nonexistent")).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.text().await?.contains("404 Not Found"));
    Ok(())
}

#[tokio::test]
async fn anonymous_home_page() -> Result<()> {
    let server = TestServer::start().await?;
    let resp = reqwest::get(server.url("/")).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert!(resp.text().await?.contains("You are not signed in."));
    Ok(())
}

#[tokio::test]
async fn unimplemented_module_answers_501() -> Result<()> {
    let server = TestServer::start().await?;
    let resp = reqwest::get(server.url("/jobs/postings")).await?;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    assert!(resp.text().await?.contains("./src/routes/employment"));
    Ok(())
}

#[tokio::test]
async fn register_login_and_persist() -> Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::new();
    let credentials = json!({ "username": "grace", "password": "hopper", "role": "teacher" });

    let registered = client.post(server.url("/register")).json(&credentials).send().await?;
    assert_eq!(registered.status(), StatusCode::CREATED);

    let login = client.post(server.url("/login")).json(&credentials).send().await?;
    assert_eq!(login.status(), StatusCode::OK);
    let cookie = login
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .expect("login sets a session cookie");

    let home = client.get(server.url("/")).header(header::COOKIE, &cookie).send().await?;
    assert!(home.text().await?.contains("Signed in as <strong>grace</strong>."));

    let me: Value = client
        .get(server.url("/me"))
        .header(header::COOKIE, &cookie)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(me["data"]["role"], "teacher");

    let doc: Value = serde_json::from_slice(&std::fs::read(server.db_file())?)?;
    assert_eq!(doc["users"][0]["username"], "grace");
    assert!(doc["users"][0]["passwordHash"].is_string());

    let bad = client
        .post(server.url("/login"))
        .json(&json!({ "username": "grace", "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
