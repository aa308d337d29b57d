//! Balance and transaction listing endpoints

mod common;

use common::{create_test_server, create_test_server_with_config, grant, test_config, token};
use serde_json::Value;

#[tokio::test]
async fn test_balance_requires_authentication() {
    let app = create_test_server();

    let response = app.server.get("/credits/balance").await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body.get("balance").is_none());
}

#[tokio::test]
async fn test_fresh_user_has_zero_balance() {
    let app = create_test_server();

    let response = app
        .server
        .get("/credits/balance")
        .authorization_bearer(&token("user_1"))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["balance"], 0);
}

#[tokio::test]
async fn test_balance_follows_ledger() {
    let app = create_test_server();
    grant(&app.store, "user_1", 100);

    let response = app
        .server
        .get("/credits/balance")
        .authorization_bearer(&token("user_1"))
        .await;
    assert_eq!(response.json::<Value>()["balance"], 100);

    // Another user's ledger is not visible
    let response = app
        .server
        .get("/credits/balance")
        .authorization_bearer(&token("user_2"))
        .await;
    assert_eq!(response.json::<Value>()["balance"], 0);
}

#[tokio::test]
async fn test_balance_accepts_session_cookie() {
    let app = create_test_server();
    grant(&app.store, "user_1", 40);

    let response = app
        .server
        .get("/credits/balance")
        .add_cookie(cookie::Cookie::new("sf_session", token("user_1")))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["balance"], 40);
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let app = create_test_server();

    let response = app
        .server
        .get("/credits/balance")
        .authorization_bearer("not-a-real-token")
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_welcome_grant_applied_once() {
    let mut config = test_config();
    config.welcome_grant_credits = 50;
    let app = create_test_server_with_config(config);

    let response = app
        .server
        .get("/credits/balance")
        .authorization_bearer(&token("user_1"))
        .await;
    assert_eq!(response.json::<Value>()["balance"], 50);

    // A second look does not grant again
    let response = app
        .server
        .get("/credits/balance")
        .authorization_bearer(&token("user_1"))
        .await;
    assert_eq!(response.json::<Value>()["balance"], 50);

    let response = app
        .server
        .get("/credits/transactions")
        .authorization_bearer(&token("user_1"))
        .await;
    let body: Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["transactions"][0]["reason"], "grant");
}

#[tokio::test]
async fn test_transactions_listed_in_order() {
    let app = create_test_server();
    grant(&app.store, "user_1", 100);
    grant(&app.store, "user_1", 25);

    let response = app
        .server
        .get("/credits/transactions")
        .authorization_bearer(&token("user_1"))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["amount"], 100);
    assert_eq!(transactions[1]["amount"], 25);
    assert_eq!(transactions[0]["user_id"], "user_1");
}

#[tokio::test]
async fn test_transactions_require_authentication() {
    let app = create_test_server();

    let response = app.server.get("/credits/transactions").await;

    assert_eq!(response.status_code(), 401);
}
