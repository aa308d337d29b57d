//! Siteforge backend service
//!
//! Multi-tenant site-builder backend: authenticated users own sites, sites
//! collect leads, and site-building actions draw down a per-user credit
//! balance kept as an append-only ledger in `siteforge-core`. Tenant sites
//! are addressed by subdomains of the configured base domain.

pub mod config;
pub mod error;
pub mod host;
pub mod identity;
pub mod images;
pub mod routes;
pub mod state;

pub use config::{Config, IdentityConfig};
pub use error::ApiError;
pub use identity::{Identity, SESSION_COOKIE};
pub use images::{DisabledImageSearch, ImageSearch, PexelsImageSearch};
pub use state::AppState;
