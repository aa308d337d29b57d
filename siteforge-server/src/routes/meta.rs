//! Operational endpoints: configuration probe and health

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use siteforge_core::{CreditStore, TenantStore};

use crate::error::ApiError;
use crate::images::ImageSearch;
use crate::state::AppState;

#[derive(Serialize)]
pub struct TestEnvResponse {
    pub has_auth_secret_key: bool,
    pub has_auth_publishable_key: bool,
    pub has_pexels_api_key: bool,
    pub has_deploy_platform_token: bool,
}

/// GET /test-env
///
/// Presence flags for the configured secrets. Booleans only, never the
/// values themselves.
pub async fn test_env<C, T, P>(State(state): State<Arc<AppState<C, T, P>>>) -> Json<TestEnvResponse>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let config = &state.config;
    Json(TestEnvResponse {
        has_auth_secret_key: config.identity.auth_secret_key.is_some(),
        has_auth_publishable_key: config.identity.auth_publishable_key.is_some(),
        has_pexels_api_key: config.pexels_api_key.is_some(),
        has_deploy_platform_token: config.deploy_platform_token.is_some(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /healthz
pub async fn healthz<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
) -> Result<Json<HealthResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    state.credit_store.ping()?;
    Ok(Json(HealthResponse { status: "ok" }))
}
