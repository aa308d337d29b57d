//! Subdomain dispatch endpoints
//!
//! The host-rewrite middleware lands every tenant-host request here, but
//! the paths also work when addressed directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use siteforge_core::{CreditStore, NewLead, Site, TenantStore};

use crate::error::ApiError;
use crate::images::ImageSearch;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SiteDocument {
    pub site: Site,
}

/// GET /_tenant/{subdomain}
pub async fn dispatch<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    Path(subdomain): Path<String>,
) -> Result<Json<SiteDocument>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    serve_site(&state, &subdomain)
}

/// GET /_tenant/{subdomain}/{*path}
///
/// A tenant site answers every sub-path with the same document; rendering
/// is the frontend's job.
pub async fn dispatch_path<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    Path((subdomain, _path)): Path<(String, String)>,
) -> Result<Json<SiteDocument>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    serve_site(&state, &subdomain)
}

fn serve_site<C, T, P>(
    state: &AppState<C, T, P>,
    subdomain: &str,
) -> Result<Json<SiteDocument>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let site = state
        .tenant_store
        .site_by_subdomain(subdomain)?
        .ok_or(ApiError::SiteNotFound)?;
    Ok(Json(SiteDocument { site }))
}

#[derive(Serialize)]
pub struct ContactResponse {
    pub success: bool,
}

/// POST /_tenant/{subdomain}/contact
///
/// Accepts a contact-form submission for the site and files it as a lead
/// for the site's owner. The payload is stored as-is.
pub async fn submit_contact<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    Path(subdomain): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ContactResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    if !payload.is_object() {
        return Err(ApiError::Validation(
            "Contact payload must be a JSON object".to_string(),
        ));
    }

    let site = state
        .tenant_store
        .site_by_subdomain(&subdomain)?
        .ok_or(ApiError::SiteNotFound)?;
    state.tenant_store.insert_lead(NewLead {
        site_id: site.id,
        payload,
    })?;
    tracing::info!(%subdomain, "Recorded contact submission");

    Ok(Json(ContactResponse { success: true }))
}
