#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use school_api::infrastructure::{config::*, http::create_app};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "https://localhost:8080";

pub fn test_config() -> AppConfig {
    AppConfig {
        mode: RuntimeMode::Local,
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 0 },
        logging: LoggingConfig { level: "debug".to_string(), format: LogFormat::Compact },
        middleware: MiddlewareConfig {
            rate_limit: RateLimitSettings {
                max_requests: 6,
                window_seconds: 60,
                trust_forwarded_headers: false,
                forwarded_header: "x-forwarded-for".to_string(),
                include_headers: false,
            },
            cors: CorsSettings {
                allowed_origins: vec![
                    ALLOWED_ORIGIN.to_string(),
                    "https://my-example-url.com".to_string(),
                ],
            },
            hpp: HppSettings {
                check_query: true,
                check_body: true,
                body_content_type: "application/x-www-form-urlencoded".to_string(),
                whitelist: ["sortby", "sortorder", "name", "age", "class"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                max_body_bytes: 1_048_576,
            },
        },
    }
}

/// Full application whose reset cycle stops on drop
pub struct TestApp {
    pub router: Router,
    shutdown: CancellationToken,
}

impl TestApp {
    pub fn new(config: &AppConfig) -> Self {
        let shutdown = CancellationToken::new();
        let router = create_app(config, shutdown.clone());
        Self { router, shutdown }
    }

    pub fn request(method: Method, path: &str) -> axum::http::request::Builder {
        Request::builder().method(method).uri(path).header(header::ORIGIN, ALLOWED_ORIGIN)
    }

    /// Send a request as if it arrived from `peer`
    pub async fn send_from(&self, peer: &str, mut request: Request<Body>) -> TestResponse {
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let response = self.router.clone().oneshot(request).await.unwrap();
        TestResponse::new(response).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        self.send_from("192.0.2.1:40000", request).await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Self::request(Method::GET, path).body(Body::empty()).unwrap()).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    async fn new(response: axum::response::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();

        Self { status, headers, body }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}
