//! Site creation: charging, conflicts, validation, cover images

mod common;

use common::{
    create_test_app, create_test_server, grant, test_config, token, MockImageSearch,
};
use serde_json::{json, Value};

#[tokio::test]
async fn test_create_site_requires_authentication() {
    let app = create_test_server();

    let response = app
        .server
        .post("/sites")
        .json(&json!({ "name": "Demo", "subdomain": "demo" }))
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_create_site_charges_creation_cost() {
    let app = create_test_server();
    grant(&app.store, "user_1", 100);

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({ "name": "Demo Site", "subdomain": "demo" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["site"]["subdomain"], "demo");
    assert_eq!(body["site"]["name"], "Demo Site");
    assert_eq!(body["site"]["user_id"], "user_1");

    // Default creation cost is 10
    let balance: Value = app
        .server
        .get("/credits/balance")
        .authorization_bearer(&token("user_1"))
        .await
        .json();
    assert_eq!(balance["balance"], 90);

    let transactions: Value = app
        .server
        .get("/credits/transactions")
        .authorization_bearer(&token("user_1"))
        .await
        .json();
    let entries = transactions["transactions"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["reason"], "spend");
    assert_eq!(entries[1]["amount"], -10);
}

#[tokio::test]
async fn test_create_site_without_credits_rejected() {
    let app = create_test_server();

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({ "name": "Demo", "subdomain": "demo" }))
        .await;

    assert_eq!(response.status_code(), 402);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["reason"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("credits"));

    // Nothing was created or charged
    let sites: Value = app
        .server
        .get("/sites")
        .authorization_bearer(&token("user_1"))
        .await
        .json();
    assert!(sites["sites"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_subdomain_conflict_leaves_no_charge() {
    let app = create_test_server();
    grant(&app.store, "user_1", 100);
    grant(&app.store, "user_2", 100);

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({ "name": "First", "subdomain": "demo" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_2"))
        .json(&json!({ "name": "Second", "subdomain": "demo" }))
        .await;
    assert_eq!(response.status_code(), 409);

    // The rejected caller keeps their credits
    let balance: Value = app
        .server
        .get("/credits/balance")
        .authorization_bearer(&token("user_2"))
        .await
        .json();
    assert_eq!(balance["balance"], 100);
}

#[tokio::test]
async fn test_subdomain_validation() {
    let app = create_test_server();
    grant(&app.store, "user_1", 1000);

    for subdomain in ["bad_sub", "-demo", "demo-", "dem o", "www", "api", ""] {
        let response = app
            .server
            .post("/sites")
            .authorization_bearer(&token("user_1"))
            .json(&json!({ "name": "Demo", "subdomain": subdomain }))
            .await;
        assert_eq!(response.status_code(), 400, "subdomain {:?}", subdomain);
    }

    // Mixed case is normalized, not rejected
    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({ "name": "Demo", "subdomain": "  Demo " }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["site"]["subdomain"], "demo");
}

#[tokio::test]
async fn test_empty_name_rejected() {
    let app = create_test_server();
    grant(&app.store, "user_1", 100);

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({ "name": "   ", "subdomain": "demo" }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_cover_image_from_search() {
    let images = MockImageSearch::with_result("https://images.example/beach.jpg");
    let app = create_test_app(test_config(), images);
    grant(&app.store, "user_1", 100);

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({
            "name": "Beach Shop",
            "subdomain": "beach",
            "image_query": "sunny beach"
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(
        body["site"]["cover_image_url"],
        "https://images.example/beach.jpg"
    );
    assert_eq!(
        app.images.queries.read().unwrap().as_slice(),
        ["sunny beach"]
    );
}

#[tokio::test]
async fn test_image_search_failure_degrades_to_no_image() {
    let app = create_test_server();
    *app.images.fail_with.write().unwrap() = Some("provider down".to_string());
    grant(&app.store, "user_1", 100);

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({
            "name": "Beach Shop",
            "subdomain": "beach",
            "image_query": "sunny beach"
        }))
        .await;

    // The site is still created, just without a cover image
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["site"].get("cover_image_url").is_none());
}

#[tokio::test]
async fn test_no_image_query_skips_search() {
    let app = create_test_server();
    grant(&app.store, "user_1", 100);

    let response = app
        .server
        .post("/sites")
        .authorization_bearer(&token("user_1"))
        .json(&json!({ "name": "Demo", "subdomain": "demo" }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(app.images.queries.read().unwrap().is_empty());
}
