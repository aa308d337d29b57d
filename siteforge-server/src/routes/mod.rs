//! HTTP routes for the siteforge backend

mod credits;
mod leads;
mod meta;
mod sites;
mod tenant;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::routing::{get, post};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use siteforge_core::{CreditStore, TenantStore};

use crate::host;
use crate::images::ImageSearch;
use crate::state::AppState;

/// Upper bound on request handling, storage waits included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the router with all routes
pub fn create_router<C, T, P>(state: Arc<AppState<C, T, P>>) -> Router
where
    C: CreditStore + 'static,
    T: TenantStore + 'static,
    P: ImageSearch + 'static,
{
    let base_domain = state.config.tenant_base_domain.clone();

    let api = Router::new()
        .route("/credits/balance", get(credits::balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route(
            "/credits/pending-conversion",
            post(credits::record_pending_conversion),
        )
        .route("/credits/resolve-conversion", post(credits::resolve_conversion))
        .route("/credits/clear-conversion", post(credits::clear_conversion))
        .route("/sites", get(sites::list_sites).post(sites::create_site))
        .route("/leads", get(leads::list_leads))
        .route("/_tenant/{subdomain}", get(tenant::dispatch))
        .route("/_tenant/{subdomain}/contact", post(tenant::submit_contact))
        .route("/_tenant/{subdomain}/{*path}", get(tenant::dispatch_path))
        .route("/test-env", get(meta::test_env))
        .route("/healthz", get(meta::healthz))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state);

    // Host rewriting must see the request before path matching does, so it
    // wraps the whole API router instead of sitting in its layer stack.
    Router::new()
        .fallback_service(api)
        .layer(middleware::from_fn(move |request: Request, next: Next| {
            host::rewrite_tenant_host(base_domain.clone(), request, next)
        }))
}
