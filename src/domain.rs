//! Hostname based brand resolution.
//!
//! One deployment serves two white-labelled front-ends. Every request is
//! classified by its `Host` into a [`Brand`] and a [`Variant`], and the result
//! travels to later handlers as a request extension and to the browser as
//! `brand` / `variant` cookies.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand {
    Primary,
    Alternate,
}

impl Brand {
    pub fn slug(self) -> &'static str {
        match self {
            Brand::Primary => "primary",
            Brand::Alternate => "alternate",
        }
    }

    fn cookie(self) -> HeaderValue {
        match self {
            Brand::Primary => HeaderValue::from_static("brand=primary; Path=/; SameSite=Lax"),
            Brand::Alternate => HeaderValue::from_static("brand=alternate; Path=/; SameSite=Lax"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Default,
    /// The reserved subdomain under the primary root domain.
    Reserved,
}

impl Variant {
    pub fn slug(self) -> &'static str {
        match self {
            Variant::Default => "default",
            Variant::Reserved => "reserved",
        }
    }

    fn cookie(self) -> HeaderValue {
        match self {
            Variant::Default => HeaderValue::from_static("variant=default; Path=/; SameSite=Lax"),
            Variant::Reserved => HeaderValue::from_static("variant=reserved; Path=/; SameSite=Lax"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub brand: Brand,
    pub root_domain: String,
    pub subdomain: String,
    pub variant: Variant,
}

#[derive(Debug, Clone)]
pub struct DomainResolver {
    pub primary_root: String,
    pub alternate_root: String,
    pub reserved_subdomain: String,
}

impl DomainResolver {
    /// Classify a hostname. Total: malformed input falls back to the primary
    /// brand and the default variant.
    pub fn parse_domain(&self, hostname: &str) -> DomainInfo {
        let host = hostname.trim().to_ascii_lowercase();
        let host = strip_port(&host).trim_end_matches('.');
        let labels: Vec<&str> = host.split('.').filter(|label| !label.is_empty()).collect();

        let root_domain = labels[labels.len().saturating_sub(2)..].join(".");
        let subdomain = if labels.len() > 2 {
            labels[0].to_string()
        } else {
            String::new()
        };

        let brand = if root_domain == self.alternate_root {
            Brand::Alternate
        } else {
            Brand::Primary
        };
        let variant = if root_domain == self.primary_root && subdomain == self.reserved_subdomain {
            Variant::Reserved
        } else {
            Variant::Default
        };

        DomainInfo {
            brand,
            root_domain,
            subdomain,
            variant,
        }
    }
}

fn strip_port(host: &str) -> &str {
    // bracketed IPv6 literal, e.g. "[::1]:3000"
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or_default();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Per-brand values selected by downstream handlers.
#[derive(Debug, Clone)]
pub struct BrandSettings {
    pub display_name: String,
    pub notification_email: Option<String>,
    /// Upstream key billed for this brand's traffic, if it has its own.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Brands {
    pub primary: BrandSettings,
    pub alternate: BrandSettings,
}

impl Brands {
    pub fn get(&self, brand: Brand) -> &BrandSettings {
        match brand {
            Brand::Primary => &self.primary,
            Brand::Alternate => &self.alternate,
        }
    }
}

// Middleware: classify the Host, stash it for handlers and mirror it as cookies
pub async fn resolve_brand(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or_default()
        .to_string();

    let info = state.domains.parse_domain(&host);
    tracing::trace!(
        host = %host,
        brand = info.brand.slug(),
        root = %info.root_domain,
        subdomain = %info.subdomain,
        variant = info.variant.slug(),
        "resolved brand"
    );

    let (brand, variant) = (info.brand, info.variant);
    req.extensions_mut().insert(info);

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.append(header::SET_COOKIE, brand.cookie());
    headers.append(header::SET_COOKIE, variant.cookie());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> DomainResolver {
        DomainResolver {
            primary_root: "example.com".to_string(),
            alternate_root: "example.org".to_string(),
            reserved_subdomain: "app".to_string(),
        }
    }

    #[test]
    fn bare_primary_root() {
        let info = resolver().parse_domain("example.com");
        assert_eq!(info.brand, Brand::Primary);
        assert_eq!(info.root_domain, "example.com");
        assert_eq!(info.subdomain, "");
        assert_eq!(info.variant, Variant::Default);
    }

    #[test]
    fn reserved_subdomain_under_primary() {
        let info = resolver().parse_domain("app.example.com");
        assert_eq!(info.brand, Brand::Primary);
        assert_eq!(info.subdomain, "app");
        assert_eq!(info.variant, Variant::Reserved);
    }

    #[test]
    fn reserved_subdomain_under_alternate_is_default_variant() {
        let info = resolver().parse_domain("app.example.org");
        assert_eq!(info.brand, Brand::Alternate);
        assert_eq!(info.root_domain, "example.org");
        assert_eq!(info.variant, Variant::Default);
    }

    #[test]
    fn other_subdomains_and_unknown_roots() {
        let info = resolver().parse_domain("www.example.com");
        assert_eq!(info.subdomain, "www");
        assert_eq!(info.variant, Variant::Default);

        let info = resolver().parse_domain("shop.somewhere.net");
        assert_eq!(info.brand, Brand::Primary);
        assert_eq!(info.root_domain, "somewhere.net");
    }

    #[test]
    fn deep_hosts_use_last_two_labels() {
        let info = resolver().parse_domain("a.b.example.org");
        assert_eq!(info.brand, Brand::Alternate);
        assert_eq!(info.subdomain, "a");
    }

    #[test]
    fn ports_case_and_trailing_dot_are_normalised() {
        let info = resolver().parse_domain("APP.Example.com.:3000");
        assert_eq!(info.root_domain, "example.com");
        assert_eq!(info.variant, Variant::Reserved);
    }

    #[test]
    fn malformed_hosts_fall_back_to_defaults() {
        for host in ["", ".", "localhost", "localhost:3000", "[::1]:8080", "..::"] {
            let info = resolver().parse_domain(host);
            assert_eq!(info.brand, Brand::Primary, "host {host:?}");
            assert_eq!(info.variant, Variant::Default, "host {host:?}");
            assert_eq!(info.subdomain, "", "host {host:?}");
        }
        assert_eq!(resolver().parse_domain("localhost").root_domain, "localhost");
    }

    #[test]
    fn classification_is_deterministic() {
        let a = resolver().parse_domain("app.example.com");
        let b = resolver().parse_domain("app.example.com");
        assert_eq!(a, b);
    }
}
