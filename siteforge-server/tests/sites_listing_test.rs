//! Site listing scope and the anonymous-caller policy

mod common;

use common::{create_test_server, create_test_server_with_config, test_config, token};
use serde_json::Value;
use siteforge_core::{NewSite, TenantStore, UserId};

fn seed_site(store: &impl TenantStore, owner: &str, subdomain: &str) {
    store
        .create_site(NewSite {
            user_id: UserId(owner.to_string()),
            subdomain: subdomain.to_string(),
            name: format!("{} site", subdomain),
            cover_image_url: None,
        })
        .unwrap();
}

#[tokio::test]
async fn test_listing_scoped_to_owner() {
    let app = create_test_server();
    seed_site(&*app.store, "user_1", "alpha");
    seed_site(&*app.store, "user_1", "beta");
    seed_site(&*app.store, "user_2", "gamma");

    let body: Value = app
        .server
        .get("/sites")
        .authorization_bearer(&token("user_1"))
        .await
        .json();
    let sites = body["sites"].as_array().unwrap();
    assert_eq!(sites.len(), 2);
    assert!(sites.iter().all(|site| site["user_id"] == "user_1"));

    let body: Value = app
        .server
        .get("/sites")
        .authorization_bearer(&token("user_2"))
        .await
        .json();
    assert_eq!(body["sites"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_anonymous_listing_empty_by_default() {
    let app = create_test_server();
    seed_site(&*app.store, "user_1", "alpha");

    let response = app.server.get("/sites").await;

    // Not an error: anonymous callers just see nothing
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["sites"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_anonymous_listing_when_unscoped_exposure_enabled() {
    let mut config = test_config();
    config.expose_unscoped_sites = true;
    let app = create_test_server_with_config(config);
    seed_site(&*app.store, "user_1", "alpha");
    seed_site(&*app.store, "user_2", "gamma");

    let body: Value = app.server.get("/sites").await.json();
    assert_eq!(body["sites"].as_array().unwrap().len(), 2);

    // Authenticated callers still get their own scope
    let body: Value = app
        .server
        .get("/sites")
        .authorization_bearer(&token("user_1"))
        .await
        .json();
    assert_eq!(body["sites"].as_array().unwrap().len(), 1);
}
