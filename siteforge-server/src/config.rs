//! Server configuration loaded from environment variables
//!
//! Nothing here is required at startup: a missing value degrades the
//! feature it belongs to (no image provider key means image search is
//! disabled, no identity secret means every protected route rejects) rather
//! than failing the process.

use std::env;
use std::str::FromStr;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Path to the SQLite database file
    pub database_path: String,
    /// Base domain tenant sites hang off of, e.g. `siteforge.test` makes
    /// `demo.siteforge.test` serve the site with subdomain `demo`
    pub tenant_base_domain: String,
    /// Credits charged when a site is created
    pub site_creation_cost: i64,
    /// Credits granted the first time a user is seen (0 disables the grant)
    pub welcome_grant_credits: i64,
    /// Whether unauthenticated callers may list every site instead of
    /// getting an empty list
    pub expose_unscoped_sites: bool,
    pub identity: IdentityConfig,
    /// API key for the image search provider
    pub pexels_api_key: Option<String>,
    /// Token for the site deployment platform
    pub deploy_platform_token: Option<String>,
}

/// Identity provider configuration
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Secret the identity provider signs session tokens with
    pub auth_secret_key: Option<String>,
    /// Publishable (frontend) key, only reported by the env probe
    pub auth_publishable_key: Option<String>,
    /// Dev-mode escape hatch: treat unauthenticated requests as the
    /// default principal where a route opts in
    pub allow_default_principal: bool,
    pub default_principal_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: parse_env("PORT", 3000),
            database_path: get_env("DATABASE_PATH")
                .unwrap_or_else(|| "siteforge.db".to_string()),
            tenant_base_domain: get_env("TENANT_BASE_DOMAIN")
                .unwrap_or_else(|| "siteforge.test".to_string()),
            site_creation_cost: parse_env("SITE_CREATION_COST", 10),
            welcome_grant_credits: parse_env("WELCOME_GRANT_CREDITS", 0),
            expose_unscoped_sites: flag_env("EXPOSE_UNSCOPED_SITES"),
            identity: IdentityConfig {
                auth_secret_key: get_env("AUTH_SECRET_KEY"),
                auth_publishable_key: get_env("AUTH_PUBLISHABLE_KEY"),
                allow_default_principal: flag_env("ALLOW_DEFAULT_PRINCIPAL"),
                default_principal_id: get_env("DEFAULT_PRINCIPAL_ID"),
            },
            pexels_api_key: get_env("PEXELS_API_KEY"),
            deploy_platform_token: get_env("DEPLOY_PLATFORM_TOKEN"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_path: "siteforge.db".to_string(),
            tenant_base_domain: "siteforge.test".to_string(),
            site_creation_cost: 10,
            welcome_grant_credits: 0,
            expose_unscoped_sites: false,
            identity: IdentityConfig::default(),
            pexels_api_key: None,
            deploy_platform_token: None,
        }
    }
}

/// Get an environment variable, treating empty values as unset
fn get_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    get_env(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn flag_env(key: &str) -> bool {
    matches!(
        get_env(key).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}
