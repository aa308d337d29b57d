//! Tenant host routing
//!
//! Requests addressed to `{subdomain}.{tenant_base_domain}` are rewritten
//! onto the internal dispatch path `/_tenant/{subdomain}{path}`, preserving
//! the original path and query, before the router matches them. Requests to
//! the apex domain, to reserved subdomains or to unrelated hosts pass
//! through untouched.

use axum::extract::Request;
use axum::http::header::HOST;
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::Response;

use siteforge_core::RESERVED_SUBDOMAINS;

/// Path prefix all rewritten tenant requests land under
pub const TENANT_DISPATCH_PREFIX: &str = "/_tenant";

pub async fn rewrite_tenant_host(base_domain: String, mut request: Request, next: Next) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    if let Some(host) = host {
        if let Some(subdomain) = tenant_subdomain(&host, &base_domain) {
            match dispatch_uri(&subdomain, request.uri()) {
                Ok(uri) => {
                    tracing::debug!(%subdomain, %uri, "Rewrote tenant host");
                    *request.uri_mut() = uri;
                }
                Err(err) => {
                    tracing::warn!(%subdomain, error = %err, "Failed to rewrite tenant host");
                }
            }
        }
    }

    next.run(request).await
}

/// The tenant label for `host`, when it is a direct subdomain of
/// `base_domain` and not reserved
pub fn tenant_subdomain(host: &str, base_domain: &str) -> Option<String> {
    let host = host.to_ascii_lowercase();
    // Ignore an explicit port
    let host = host.split(':').next().unwrap_or(&host);

    let label = host.strip_suffix(base_domain)?.strip_suffix('.')?;
    if label.is_empty() || label.contains('.') {
        return None;
    }
    if RESERVED_SUBDOMAINS.contains(&label) {
        return None;
    }
    Some(label.to_string())
}

fn dispatch_uri(subdomain: &str, original: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let rewritten = if path_and_query == "/" {
        format!("{}/{}", TENANT_DISPATCH_PREFIX, subdomain)
    } else {
        format!("{}/{}{}", TENANT_DISPATCH_PREFIX, subdomain, path_and_query)
    };
    rewritten.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "siteforge.test";

    #[test]
    fn test_direct_subdomain_is_tenant() {
        assert_eq!(
            tenant_subdomain("demo.siteforge.test", BASE),
            Some("demo".to_string())
        );
        assert_eq!(
            tenant_subdomain("demo.siteforge.test:3000", BASE),
            Some("demo".to_string())
        );
        assert_eq!(
            tenant_subdomain("DEMO.SiteForge.Test", BASE),
            Some("demo".to_string())
        );
    }

    #[test]
    fn test_apex_and_foreign_hosts_pass_through() {
        assert_eq!(tenant_subdomain("siteforge.test", BASE), None);
        assert_eq!(tenant_subdomain("siteforge.test:3000", BASE), None);
        assert_eq!(tenant_subdomain("example.com", BASE), None);
        assert_eq!(tenant_subdomain("demo.example.com", BASE), None);
        // Suffix match without the dot separator is not a subdomain
        assert_eq!(tenant_subdomain("evilsiteforge.test", BASE), None);
    }

    #[test]
    fn test_nested_subdomains_are_not_tenants() {
        assert_eq!(tenant_subdomain("a.demo.siteforge.test", BASE), None);
    }

    #[test]
    fn test_reserved_subdomains_are_not_tenants() {
        for label in ["www", "app", "api"] {
            let host = format!("{}.siteforge.test", label);
            assert_eq!(tenant_subdomain(&host, BASE), None, "{}", host);
        }
    }

    #[test]
    fn test_dispatch_uri_preserves_path_and_query() {
        let original: Uri = "/".parse().unwrap();
        assert_eq!(
            dispatch_uri("demo", &original).unwrap().to_string(),
            "/_tenant/demo"
        );

        let original: Uri = "/about".parse().unwrap();
        assert_eq!(
            dispatch_uri("demo", &original).unwrap().to_string(),
            "/_tenant/demo/about"
        );

        let original: Uri = "/contact?ref=footer&x=1".parse().unwrap();
        assert_eq!(
            dispatch_uri("demo", &original).unwrap().to_string(),
            "/_tenant/demo/contact?ref=footer&x=1"
        );
    }
}
