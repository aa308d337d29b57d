//! Configuration probe and health endpoints

mod common;

use common::{create_test_server, create_test_server_with_config, test_config, TEST_AUTH_SECRET};
use serde_json::Value;

#[tokio::test]
async fn test_env_reports_presence_flags() {
    // Default test config carries only the auth secret
    let app = create_test_server();

    let response = app.server.get("/test-env").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["has_auth_secret_key"], true);
    assert_eq!(body["has_auth_publishable_key"], false);
    assert_eq!(body["has_pexels_api_key"], false);
    assert_eq!(body["has_deploy_platform_token"], false);
}

#[tokio::test]
async fn test_env_reflects_configured_secrets() {
    let mut config = test_config();
    config.identity.auth_publishable_key = Some("pk_test_123".to_string());
    config.pexels_api_key = Some("pexels-key".to_string());
    config.deploy_platform_token = Some("deploy-token".to_string());
    let app = create_test_server_with_config(config);

    let body: Value = app.server.get("/test-env").await.json();
    assert_eq!(body["has_auth_secret_key"], true);
    assert_eq!(body["has_auth_publishable_key"], true);
    assert_eq!(body["has_pexels_api_key"], true);
    assert_eq!(body["has_deploy_platform_token"], true);
}

#[tokio::test]
async fn test_env_never_leaks_secret_values() {
    let mut config = test_config();
    config.pexels_api_key = Some("pexels-key".to_string());
    config.deploy_platform_token = Some("deploy-token".to_string());
    let app = create_test_server_with_config(config);

    let response = app.server.get("/test-env").await;

    let text = response.text();
    assert!(!text.contains(TEST_AUTH_SECRET));
    assert!(!text.contains("pexels-key"));
    assert!(!text.contains("deploy-token"));
}

#[tokio::test]
async fn test_healthz_reports_ok() {
    let app = create_test_server();

    let response = app.server.get("/healthz").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}
