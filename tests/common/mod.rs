//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;

use coin_shop::api::{build_router, AppState};
use coin_shop::auth::AuthSettings;
use coin_shop::domain::{Balance, Catalog, UserId};
use coin_shop::store::{Ledger, MemoryLedger, UserDirectory};

/// Full application over a fresh in-process ledger
pub fn memory_app() -> (Router, MemoryLedger) {
    let ledger = MemoryLedger::new();
    let state = AppState::new(
        ledger.clone(),
        Arc::new(Catalog::default()),
        AuthSettings::default(),
    );
    (build_router(state), ledger)
}

/// Insert a user directly, bypassing registration
pub async fn seed_user<L: UserDirectory>(ledger: &L, username: &str, coins: i64) -> UserId {
    ledger
        .create_user(username, "unused", Balance::new(coins).unwrap())
        .await
        .unwrap()
        .expect("username already taken")
}

pub async fn balance_of<L: Ledger>(ledger: &L, user_id: UserId) -> i64 {
    ledger
        .read_balance(user_id)
        .await
        .unwrap()
        .expect("user exists")
        .value()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    raw_json_request(method, uri, token, body.to_string())
}

/// JSON content type with an arbitrary, possibly malformed, body
pub fn raw_json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: impl Into<String>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.into())).unwrap()
}

pub fn send_coin_request(token: &str, to_user: &str, amount: i64) -> Request<Body> {
    let body = serde_json::json!({ "toUser": to_user, "amount": amount });
    json_request("POST", "/api/sendCoin", Some(token), body)
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send a request; empty bodies come back as `Value::Null`
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Register through the API and return a bearer token
pub async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
    let credentials = serde_json::json!({ "username": username, "password": password });

    let register = json_request("POST", "/api/users", None, credentials.clone());
    let (status, _) = send(app, register).await;
    assert_eq!(status, StatusCode::CREATED, "registration of {} failed", username);

    let (status, body) = send(app, json_request("POST", "/api/auth", None, credentials)).await;
    assert_eq!(status, StatusCode::OK, "login of {} failed", username);
    body["token"].as_str().expect("token in response").to_string()
}

/// Connect to DATABASE_URL and empty every table
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query(
        "TRUNCATE TABLE sessions, coin_transactions, inventories, users RESTART IDENTITY CASCADE",
    )
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
