//! Siteforge backend server
//!
//! Serves the credit accounting API, the site and lead endpoints, and the
//! tenant subdomain dispatch over one SQLite-backed store.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use siteforge_core::{CreditStore, SqliteStore};
use siteforge_server::{routes, AppState, Config, DisabledImageSearch, PexelsImageSearch};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siteforge_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration. Values are logged selectively so secrets stay out
    // of the logs.
    let config = Config::from_env();
    tracing::info!(
        port = config.port,
        database = %config.database_path,
        tenant_base_domain = %config.tenant_base_domain,
        site_creation_cost = config.site_creation_cost,
        welcome_grant_credits = config.welcome_grant_credits,
        "Loaded configuration"
    );

    // Open storage and bootstrap the schema once at startup
    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    store.ensure_schema()?;

    let addr = format!("0.0.0.0:{}", config.port);

    let app = match config.pexels_api_key.clone() {
        Some(api_key) => {
            let state = Arc::new(AppState::new(
                config,
                store.clone(),
                store,
                PexelsImageSearch::new(api_key),
            ));
            routes::create_router(state)
        }
        None => {
            tracing::warn!("PEXELS_API_KEY not set, image search disabled");
            let state = Arc::new(AppState::new(
                config,
                store.clone(),
                store,
                DisabledImageSearch,
            ));
            routes::create_router(state)
        }
    };

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Siteforge backend listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
