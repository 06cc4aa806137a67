use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
};
use std::{sync::Arc, time::Duration};
use tower::Layer;
use tracing::debug;

use super::{
    error::AppError,
    pipeline::{into_handler, Handler, Transformer},
};

/// Origin allow-list and the CORS headers attached for allowed origins
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Exact-match list; no wildcards
    pub allowed_origins: Vec<String>,
    pub allowed_headers: String,
    pub exposed_headers: String,
    pub allowed_methods: String,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://localhost:8080".to_string(),
                "https://my-example-url.com".to_string(),
            ],
            allowed_headers: "Content-Type, Authorization".to_string(),
            exposed_headers: "Authorization".to_string(),
            allowed_methods: "GET, POST, PUT, PATCH, DELETE".to_string(),
            allow_credentials: true,
            max_age: Duration::from_secs(3600),
        }
    }
}

impl CorsConfig {
    pub fn with_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed_origins: origins.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    fn apply_headers(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        let text = |value: &str| {
            HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
        };

        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, text(&self.allowed_headers));
        headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, text(&self.exposed_headers));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, text(&self.allowed_methods));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static(if self.allow_credentials { "true" } else { "false" }),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age.as_secs()));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
}

async fn origin_gate(
    State(config): State<Arc<CorsConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let allowed = request
        .headers()
        .get(header::ORIGIN)
        .filter(|value| value.to_str().is_ok_and(|origin| config.is_origin_allowed(origin)))
        .cloned();

    let Some(origin) = allowed else {
        let origin = request
            .headers()
            .get(header::ORIGIN)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();
        return AppError::OriginNotAllowed { origin }.into_response();
    };

    debug!(origin = ?origin, method = %request.method(), "Origin allowed");

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    config.apply_headers(&origin, response.headers_mut());
    response
}

/// Rejects requests whose `Origin` is not on the allow-list
#[derive(Debug, Clone)]
pub struct OriginGate {
    config: Arc<CorsConfig>,
}

impl OriginGate {
    pub fn new(config: CorsConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl Transformer for OriginGate {
    fn wrap(&self, inner: Handler) -> Handler {
        into_handler(from_fn_with_state(self.config.clone(), origin_gate).layer(inner))
    }
}
