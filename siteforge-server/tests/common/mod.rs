//! Common test utilities for server integration tests

use std::sync::{Arc, RwLock};

use axum_test::TestServer;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use siteforge_core::{
    CreditStore, InMemoryStore, NewTransaction, TransactionReason, UserId,
};
use siteforge_server::{routes, AppState, Config, ImageSearch};

/// Secret the pretend identity provider signs test tokens with
pub const TEST_AUTH_SECRET: &str = "test-auth-secret";

/// Mock image search that records queries and serves a canned result
#[derive(Default, Clone)]
pub struct MockImageSearch {
    /// Queries the server asked for
    pub queries: Arc<RwLock<Vec<String>>>,
    /// URL returned for every query
    pub result: Arc<RwLock<Option<String>>>,
    /// When set, every lookup fails with this message
    pub fail_with: Arc<RwLock<Option<String>>>,
}

impl MockImageSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(url: &str) -> Self {
        let mock = Self::default();
        *mock.result.write().unwrap() = Some(url.to_string());
        mock
    }
}

impl ImageSearch for MockImageSearch {
    fn find_landscape(&self, query: &str) -> Result<Option<String>, String> {
        self.queries.write().unwrap().push(query.to_string());
        if let Some(message) = self.fail_with.read().unwrap().clone() {
            return Err(message);
        }
        Ok(self.result.read().unwrap().clone())
    }
}

/// Config the test servers run with: identity verification on, everything
/// else at defaults
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.identity.auth_secret_key = Some(TEST_AUTH_SECRET.to_string());
    config
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub images: MockImageSearch,
}

pub fn create_test_server() -> TestApp {
    create_test_server_with_config(test_config())
}

pub fn create_test_server_with_config(config: Config) -> TestApp {
    create_test_app(config, MockImageSearch::new())
}

pub fn create_test_app(config: Config, images: MockImageSearch) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let state = Arc::new(AppState::new(
        config,
        store.clone(),
        store.clone(),
        images.clone(),
    ));
    let server = TestServer::new(routes::create_router(state)).expect("Failed to create test server");
    TestApp {
        server,
        store,
        images,
    }
}

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Mint a session token the server's identity verifier accepts
pub fn token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_AUTH_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// Seed credits directly through the store
pub fn grant(store: &InMemoryStore, user_id: &str, amount: i64) {
    store
        .append_transaction(NewTransaction {
            user_id: UserId(user_id.to_string()),
            amount,
            reason: TransactionReason::Grant,
            related_conversion_id: None,
            idempotency_key: None,
        })
        .expect("Failed to seed grant");
}
