//! Lead endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tower_cookies::Cookies;

use siteforge_core::{CreditStore, Lead, TenantStore};

use crate::error::ApiError;
use crate::images::ImageSearch;
use crate::state::AppState;

#[derive(Serialize)]
pub struct LeadsResponse {
    pub leads: Vec<Lead>,
}

/// GET /leads
///
/// Contact submissions across all of the caller's sites, oldest first.
pub async fn list_leads<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<LeadsResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let user = state
        .identity
        .principal(&headers, &cookies)
        .ok_or(ApiError::Unauthorized)?;

    let leads = state.tenant_store.leads_for_user(&user)?;

    Ok(Json(LeadsResponse { leads }))
}
