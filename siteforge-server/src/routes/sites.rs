//! Site endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use siteforge_core::{validate_subdomain, CreditStore, NewSite, Site, TenantStore};

use crate::error::ApiError;
use crate::images::ImageSearch;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SitesResponse {
    pub sites: Vec<Site>,
}

/// GET /sites
///
/// Authenticated callers get their own sites. Anonymous callers get an
/// empty list unless the unscoped listing is explicitly configured on.
pub async fn list_sites<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<SitesResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let sites = match state.identity.principal(&headers, &cookies) {
        Some(user) => state.tenant_store.list_sites(&user)?,
        None if state.config.expose_unscoped_sites => state.tenant_store.all_sites()?,
        None => Vec::new(),
    };

    Ok(Json(SitesResponse { sites }))
}

#[derive(Deserialize)]
pub struct CreateSiteRequest {
    pub name: String,
    pub subdomain: String,
    /// Optional query for a decorative cover image
    pub image_query: Option<String>,
}

#[derive(Serialize)]
pub struct CreateSiteResponse {
    pub success: bool,
    pub site: Site,
}

/// POST /sites
///
/// Creates a site and charges the configured creation cost in the same
/// storage transaction, so a rejected request never leaves a partial
/// charge or an orphaned site behind.
pub async fn create_site<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(request): Json<CreateSiteRequest>,
) -> Result<Json<CreateSiteResponse>, ApiError>
where
    C: CreditStore + 'static,
    T: TenantStore + 'static,
    P: ImageSearch + 'static,
{
    let user = state
        .identity
        .principal(&headers, &cookies)
        .ok_or(ApiError::Unauthorized)?;

    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation(
            "Site name must not be empty".to_string(),
        ));
    }
    let subdomain = request.subdomain.trim().to_ascii_lowercase();
    validate_subdomain(&subdomain)?;

    let cover_image_url = resolve_cover_image(&state, request.image_query).await;

    let site = state.tenant_store.provision_site(
        NewSite {
            user_id: user,
            subdomain,
            name,
            cover_image_url,
        },
        state.config.site_creation_cost,
    )?;
    tracing::info!(site_id = %site.id.0, subdomain = %site.subdomain, "Created site");

    Ok(Json(CreateSiteResponse {
        success: true,
        site,
    }))
}

/// Run the (blocking) image provider off the async runtime and degrade any
/// failure to "no image"
async fn resolve_cover_image<C, T, P>(
    state: &Arc<AppState<C, T, P>>,
    query: Option<String>,
) -> Option<String>
where
    C: CreditStore + 'static,
    T: TenantStore + 'static,
    P: ImageSearch + 'static,
{
    let query = query?.trim().to_string();
    if query.is_empty() {
        return None;
    }

    let state = Arc::clone(state);
    let result =
        tokio::task::spawn_blocking(move || state.image_search.find_landscape(&query)).await;

    match result {
        Ok(Ok(url)) => url,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "Image search failed, continuing without a cover image");
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "Image search task failed");
            None
        }
    }
}
