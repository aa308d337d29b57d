//! Principal resolution
//!
//! The external identity provider issues HS256-signed session tokens. A
//! request may carry one as a bearer token or in the session cookie; this
//! module verifies it and yields the authenticated principal. The dev-mode
//! default principal is configuration-injected and only consulted through
//! [`Identity::principal_or_default`], so routes opt into the fallback
//! explicitly.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tower_cookies::Cookies;

use siteforge_core::UserId;

use crate::config::IdentityConfig;

/// Cookie carrying the session token for browser requests
pub const SESSION_COOKIE: &str = "sf_session";

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies session tokens against the configured identity secret
pub struct Identity {
    decoding_key: Option<DecodingKey>,
    allow_default_principal: bool,
    default_principal_id: Option<UserId>,
}

impl Identity {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            decoding_key: config
                .auth_secret_key
                .as_deref()
                .map(|secret| DecodingKey::from_secret(secret.as_bytes())),
            allow_default_principal: config.allow_default_principal,
            default_principal_id: config.default_principal_id.clone().map(UserId),
        }
    }

    /// The authenticated principal for this request, if any. Without a
    /// configured secret no token can verify, so this is always `None`.
    pub fn principal(&self, headers: &HeaderMap, cookies: &Cookies) -> Option<UserId> {
        let token = bearer_token(headers)
            .or_else(|| cookies.get(SESSION_COOKIE).map(|c| c.value().to_string()))?;
        self.verify(&token)
    }

    /// Like [`principal`](Identity::principal), falling back to the
    /// configured dev-mode default when the request carries no valid token
    pub fn principal_or_default(&self, headers: &HeaderMap, cookies: &Cookies) -> Option<UserId> {
        self.principal(headers, cookies)
            .or_else(|| self.default_principal())
    }

    fn default_principal(&self) -> Option<UserId> {
        if self.allow_default_principal {
            self.default_principal_id.clone()
        } else {
            None
        }
    }

    fn verify(&self, token: &str) -> Option<UserId> {
        let key = self.decoding_key.as_ref()?;
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, key, &validation) {
            Ok(data) => Some(UserId(data.claims.sub)),
            Err(err) => {
                tracing::debug!(error = %err, "Rejected session token");
                None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|token| token.to_string())
}
