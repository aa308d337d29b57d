//! Application state

use crate::config::Config;
use crate::identity::Identity;
use crate::images::ImageSearch;
use siteforge_core::{CreditStore, TenantStore};

/// Shared application state, generic over the store backends and the image
/// provider so tests can swap in in-memory implementations
pub struct AppState<C, T, P>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    pub config: Config,
    pub identity: Identity,
    pub credit_store: C,
    pub tenant_store: T,
    pub image_search: P,
}

impl<C, T, P> AppState<C, T, P>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    pub fn new(config: Config, credit_store: C, tenant_store: T, image_search: P) -> Self {
        let identity = Identity::new(&config.identity);
        Self {
            config,
            identity,
            credit_store,
            tenant_store,
            image_search,
        }
    }
}
