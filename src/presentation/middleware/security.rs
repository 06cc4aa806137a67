use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::{from_fn_with_state, Next},
    response::Response,
};
use std::sync::Arc;
use tower::Layer;

use super::pipeline::{into_handler, Handler, Transformer};

/// Security headers configuration
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct SecurityConfig {
    /// Allow browsers to pre-resolve DNS for links
    pub dns_prefetch: bool,
    /// Enable HSTS (HTTP Strict Transport Security)
    pub hsts_enabled: bool,
    /// HSTS max age in seconds (default: 2 years)
    pub hsts_max_age: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
    /// Content Security Policy
    pub csp_policy: Option<String>,
    pub frame_options: FrameOptions,
    pub content_type_options: bool,
    pub xss_protection: XssProtection,
    pub referrer_policy: ReferrerPolicy,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            dns_prefetch: false,
            hsts_enabled: true,
            hsts_max_age: 63_072_000,
            hsts_include_subdomains: true,
            hsts_preload: true,
            csp_policy: Some("default-src 'self'".to_string()),
            frame_options: FrameOptions::Deny,
            content_type_options: true,
            xss_protection: XssProtection::Block,
            referrer_policy: ReferrerPolicy::NoReferrer,
        }
    }
}

/// X-Frame-Options values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOptions {
    Deny,
    SameOrigin,
}

impl FrameOptions {
    fn to_header_value(&self) -> HeaderValue {
        match self {
            FrameOptions::Deny => HeaderValue::from_static("DENY"),
            FrameOptions::SameOrigin => HeaderValue::from_static("SAMEORIGIN"),
        }
    }
}

/// X-XSS-Protection values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XssProtection {
    Disabled,
    Enabled,
    Block,
}

impl XssProtection {
    fn to_header_value(&self) -> HeaderValue {
        match self {
            XssProtection::Disabled => HeaderValue::from_static("0"),
            XssProtection::Enabled => HeaderValue::from_static("1"),
            XssProtection::Block => HeaderValue::from_static("1; mode=block"),
        }
    }
}

/// Referrer-Policy values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferrerPolicy {
    NoReferrer,
    NoReferrerWhenDowngrade,
    Origin,
    OriginWhenCrossOrigin,
    SameOrigin,
    StrictOrigin,
    StrictOriginWhenCrossOrigin,
}

impl ReferrerPolicy {
    fn to_header_value(&self) -> HeaderValue {
        let value = match self {
            ReferrerPolicy::NoReferrer => "no-referrer",
            ReferrerPolicy::NoReferrerWhenDowngrade => "no-referrer-when-downgrade",
            ReferrerPolicy::Origin => "origin",
            ReferrerPolicy::OriginWhenCrossOrigin => "origin-when-cross-origin",
            ReferrerPolicy::SameOrigin => "same-origin",
            ReferrerPolicy::StrictOrigin => "strict-origin",
            ReferrerPolicy::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
        };
        HeaderValue::from_static(value)
    }
}

impl SecurityConfig {
    fn hsts_value(&self) -> String {
        let mut hsts_value = format!("max-age={}", self.hsts_max_age);
        if self.hsts_include_subdomains {
            hsts_value.push_str("; includeSubDomains");
        }
        if self.hsts_preload {
            hsts_value.push_str("; preload");
        }
        hsts_value
    }

    /// Header set this configuration produces, in emission order
    pub fn header_set(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut set = vec![(
            HeaderName::from_static("x-dns-prefetch-control"),
            HeaderValue::from_static(if self.dns_prefetch { "on" } else { "off" }),
        )];

        set.push((header::X_FRAME_OPTIONS, self.frame_options.to_header_value()));
        set.push((HeaderName::from_static("x-xss-protection"), self.xss_protection.to_header_value()));

        if self.content_type_options {
            set.push((header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")));
        }

        if self.hsts_enabled {
            if let Ok(value) = HeaderValue::from_str(&self.hsts_value()) {
                set.push((header::STRICT_TRANSPORT_SECURITY, value));
            }
        }

        if let Some(csp) = &self.csp_policy {
            if let Ok(value) = HeaderValue::from_str(csp) {
                set.push((header::CONTENT_SECURITY_POLICY, value));
            }
        }

        set.push((header::REFERRER_POLICY, self.referrer_policy.to_header_value()));
        set
    }
}

/// Apply security headers, keeping any value a downstream handler already set
fn apply_security_headers(headers: &mut HeaderMap, config: &SecurityConfig) {
    for (name, value) in config.header_set() {
        headers.entry(name).or_insert(value);
    }
}

async fn security_headers(
    State(config): State<Arc<SecurityConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), &config);
    response
}

/// Attaches the configured security headers to every response
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    config: Arc<SecurityConfig>,
}

impl SecurityHeaders {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl Transformer for SecurityHeaders {
    fn wrap(&self, inner: Handler) -> Handler {
        into_handler(from_fn_with_state(self.config.clone(), security_headers).layer(inner))
    }
}
