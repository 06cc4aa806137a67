use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{from_fn, Next},
    response::Response,
};
use std::time::{Duration, Instant};
use tower::Layer;
use tracing::info;

use super::pipeline::{into_handler, Handler, Transformer};

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Milliseconds with three decimals, e.g. `12.345ms`
pub fn format_duration(duration: Duration) -> String {
    format!("{:.3}ms", duration.as_secs_f64() * 1000.0)
}

async fn response_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let mut response = next.run(request).await;

    let elapsed = start.elapsed();
    let formatted = format_duration(elapsed);

    if let Ok(value) = HeaderValue::from_str(&formatted) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = elapsed.as_secs_f64() * 1000.0,
        "Request completed"
    );

    response
}

/// Measures the time spent in the wrapped handler
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTimer;

impl Transformer for ResponseTimer {
    fn wrap(&self, inner: Handler) -> Handler {
        into_handler(from_fn(response_time).layer(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{call, get};
    use axum::http::StatusCode;
    use std::convert::Infallible;

    fn parse_millis(value: &str) -> f64 {
        value.strip_suffix("ms").unwrap().parse().unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(12_345)), "12.345ms");
        assert_eq!(format_duration(Duration::ZERO), "0.000ms");
        assert_eq!(format_duration(Duration::from_secs(2)), "2000.000ms");
    }

    #[tokio::test]
    async fn test_header_covers_inner_handler() {
        let slow = into_handler(tower::service_fn(|_request: Request| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, Infallible>(StatusCode::ACCEPTED)
        }));

        let response = call(ResponseTimer.wrap(slow), get("/execs/")).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let header = response.headers()[RESPONSE_TIME_HEADER].to_str().unwrap();
        assert!(header.ends_with("ms"));
        assert!(parse_millis(header) >= 50.0, "{header} is shorter than the handler");
    }
}
