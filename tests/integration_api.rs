//! API Integration Tests

use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::{
    get_request, json_request, memory_app, raw_json_request, register_and_login, send,
    send_coin_request,
};

#[tokio::test]
async fn test_health_check() {
    let (app, _) = memory_app();

    let response = send(&app, get_request("/health", None)).await;
    assert_eq!(response.0, StatusCode::OK);
}

#[tokio::test]
async fn test_transfer_e2e() {
    let (app, _) = memory_app();
    let alice = register_and_login(&app, "alice", "pw-a").await;
    let bob = register_and_login(&app, "bob", "pw-b").await;

    // 1. Send coins from alice to bob
    let (status, _) = send(&app, send_coin_request(&alice, "bob", 300)).await;
    assert_eq!(status, StatusCode::OK, "Transfer failed");

    // 2. Verify alice's view
    let (status, info) = send(&app, get_request("/api/info", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["coins"], 700);
    assert_eq!(info["coinHistory"]["sent"][0]["toUser"], "bob");
    assert_eq!(info["coinHistory"]["sent"][0]["amount"], 300);
    assert_eq!(info["coinHistory"]["received"], json!([]));

    // 3. Verify bob's view
    let (status, info) = send(&app, get_request("/api/info", Some(&bob))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["coins"], 1300);
    assert_eq!(info["coinHistory"]["received"][0]["fromUser"], "alice");
    assert_eq!(info["coinHistory"]["sent"], json!([]));
}

#[tokio::test]
async fn test_purchase_e2e() {
    let (app, _) = memory_app();
    let token = register_and_login(&app, "alice", "pw").await;

    for _ in 0..2 {
        let (status, _) = send(&app, get_request("/api/buy/cup", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(&app, get_request("/api/buy/book", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, info) = send(&app, get_request("/api/info", Some(&token))).await;
    assert_eq!(info["coins"], 1000 - 2 * 20 - 50);
    assert_eq!(
        info["inventory"],
        json!([
            {"type": "book", "quantity": 1},
            {"type": "cup", "quantity": 2}
        ])
    );
}

#[tokio::test]
async fn test_error_mapping() {
    let (app, _) = memory_app();
    let token = register_and_login(&app, "alice", "pw").await;

    // Unknown item
    let (status, body) = send(&app, get_request("/api/buy/yacht", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "item_not_found");

    // Non-positive amount
    let (status, body) = send(&app, send_coin_request(&token, "alice", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_amount");

    // Unknown recipient
    let (status, body) = send(&app, send_coin_request(&token, "ghost", 5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "recipient_not_found");

    // Not enough coins
    let (status, body) = send(&app, send_coin_request(&token, "alice", 5000)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "insufficient_funds");

    // Nothing above changed the balance
    let (_, info) = send(&app, get_request("/api/info", Some(&token))).await;
    assert_eq!(info["coins"], 1000);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (app, _) = memory_app();

    let (status, _) = send(&app, get_request("/api/info", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get_request("/api/info", Some("not-a-session"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "unauthorized");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/sendCoin", None, json!({"toUser": "bob", "amount": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_and_login_errors() {
    let (app, _) = memory_app();
    register_and_login(&app, "alice", "pw").await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/users", None, json!({"username": "alice", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "username_taken");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth", None, json!({"username": "alice", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "invalid_credentials");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/users", None, json!({"username": "", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_username");
}

#[tokio::test]
async fn test_info_is_idempotent() {
    let (app, _) = memory_app();
    let token = register_and_login(&app, "alice", "pw").await;
    register_and_login(&app, "bob", "pw").await;

    send(&app, send_coin_request(&token, "bob", 10)).await;
    send(&app, get_request("/api/buy/pen", Some(&token))).await;

    let (_, first) = send(&app, get_request("/api/info", Some(&token))).await;
    let (_, second) = send(&app, get_request("/api/info", Some(&token))).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let (app, _) = memory_app();
    let token = register_and_login(&app, "alice", "pw").await;
    register_and_login(&app, "bob", "pw").await;

    // Broken syntax on a protected route
    let (status, body) = send(
        &app,
        raw_json_request("POST", "/api/sendCoin", Some(&token), "{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");
    assert!(body["error"].is_string());

    // Wrong field type
    let (status, body) = send(
        &app,
        raw_json_request(
            "POST",
            "/api/sendCoin",
            Some(&token),
            r#"{"toUser": "bob", "amount": "ten"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");

    // Missing field on a public route
    let (status, body) = send(
        &app,
        raw_json_request("POST", "/api/auth", None, r#"{"username": "alice"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");

    let (_, info) = send(&app, get_request("/api/info", Some(&token))).await;
    assert_eq!(info["coins"], 1000);
}
