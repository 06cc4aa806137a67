//! HTTP parameter pollution filtering
//!
//! Query strings and url-encoded form bodies are reduced to whitelisted
//! parameter names, each carrying only its first value.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        uri::PathAndQuery,
        HeaderValue, Method, Uri,
    },
    middleware::{from_fn_with_state, Next},
    response::Response,
};
use std::{collections::HashSet, sync::Arc};
use tower::Layer;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::pipeline::{into_handler, Handler, Transformer};

/// Which parameter collections to inspect and which names survive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HppPolicy {
    pub check_query: bool,
    pub check_body: bool,
    /// Bodies are only parsed when `Content-Type` contains this value
    pub body_content_type: String,
    pub whitelist: HashSet<String>,
    pub max_body_bytes: usize,
}

impl Default for HppPolicy {
    fn default() -> Self {
        Self {
            check_query: true,
            check_body: true,
            body_content_type: "application/x-www-form-urlencoded".to_string(),
            whitelist: ["sortby", "sortorder", "name", "age", "class"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl HppPolicy {
    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.whitelist.contains(name)
    }

    /// Drop non-whitelisted names and keep the first value of repeated ones,
    /// preserving first-occurrence order.
    ///
    /// Names are decoded for matching only. Surviving `name=value` segments
    /// are emitted byte for byte as received.
    pub fn filter_encoded(&self, encoded: &[u8]) -> Vec<u8> {
        let mut seen = HashSet::new();
        let kept: Vec<&[u8]> = encoded
            .split(|&byte| byte == b'&')
            .filter(|segment| !segment.is_empty())
            .filter(|segment| {
                let name = decode_name(segment);
                self.is_whitelisted(&name) && seen.insert(name)
            })
            .collect();

        kept.join(&b'&')
    }

    fn filter_query(&self, query: &str) -> String {
        // Segments are cut at ASCII '&', so the result stays valid UTF-8
        String::from_utf8_lossy(&self.filter_encoded(query.as_bytes())).into_owned()
    }

    fn should_check_body(&self, request: &Request) -> bool {
        self.check_body
            && request.method() == Method::POST
            && request
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|content_type| content_type.contains(&self.body_content_type))
    }
}

/// Percent-decoded name of a single `name=value` segment
fn decode_name(segment: &[u8]) -> String {
    let raw = segment.split(|&byte| byte == b'=').next().unwrap_or_default();
    form_urlencoded::parse(raw).next().map(|(name, _)| name.into_owned()).unwrap_or_default()
}

fn rewrite_query(uri: &Uri, query: &str) -> Result<Uri, axum::http::Error> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{query}", uri.path())
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

async fn filter_body(policy: &HppPolicy, request: Request) -> Request {
    let (mut parts, body) = request.into_parts();

    let filtered = match to_bytes(body, policy.max_body_bytes).await {
        Ok(bytes) => policy.filter_encoded(&bytes),
        Err(e) => {
            warn!("Failed to read form body for parameter filtering: {}", e);
            Vec::new()
        }
    };

    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(filtered.len()));
    Request::from_parts(parts, Body::from(filtered))
}

async fn hpp(State(policy): State<Arc<HppPolicy>>, mut request: Request, next: Next) -> Response {
    if policy.should_check_body(&request) {
        request = filter_body(&policy, request).await;
    }

    if policy.check_query {
        if let Some(query) = request.uri().query().filter(|query| !query.is_empty()) {
            let filtered = policy.filter_query(query);
            debug!(original = query, filtered, "Filtered query parameters");

            match rewrite_query(request.uri(), &filtered) {
                Ok(uri) => *request.uri_mut() = uri,
                Err(e) => warn!("Failed to rewrite filtered query: {}", e),
            }
        }
    }

    next.run(request).await
}

/// Pipeline stage applying an [`HppPolicy`]
#[derive(Debug, Clone)]
pub struct HppFilter {
    policy: Arc<HppPolicy>,
}

impl HppFilter {
    pub fn new(policy: HppPolicy) -> Self {
        Self { policy: Arc::new(policy) }
    }
}

impl Transformer for HppFilter {
    fn wrap(&self, inner: Handler) -> Handler {
        into_handler(from_fn_with_state(self.policy.clone(), hpp).layer(inner))
    }
}
