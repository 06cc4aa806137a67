use axum::{
    body::Body,
    http::{header, Extensions, HeaderMap, StatusCode, Version},
    response::Response,
};
use http_body_util::BodyExt;
use tower::ServiceBuilder;
use tower_http::compression::{CompressionBody, CompressionLayer};
use tracing::{debug, warn};

use super::pipeline::{into_handler, Handler, Transformer};

/// Gzip-encodes response bodies for clients that advertise gzip support.
///
/// The encoder streams the inner body and is finished when that body ends.
/// Clients without gzip in `Accept-Encoding` receive the response untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCompression;

/// Compress every response body regardless of size or content type
fn always(_: StatusCode, _: Version, _: &HeaderMap, _: &Extensions) -> bool {
    true
}

fn log_stream_errors(response: Response<CompressionBody<Body>>) -> Response {
    if !response.headers().contains_key(header::CONTENT_ENCODING) {
        debug!(status = %response.status(), "Response passed through uncompressed");
    }

    response.map(|body| {
        Body::new(body.map_err(|e| {
            warn!("Response compression failed: {}", e);
            e
        }))
    })
}

impl Transformer for GzipCompression {
    fn wrap(&self, inner: Handler) -> Handler {
        into_handler(
            ServiceBuilder::new()
                .map_response(log_stream_errors)
                .layer(CompressionLayer::new().gzip(true).compress_when(always))
                .service(inner),
        )
    }
}
