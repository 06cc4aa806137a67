//! Middleware modules for HTTP request processing
//!
//! Every stage is a [`Transformer`]: it wraps a [`Handler`] and returns a new
//! one. The stages offered here:
//! - Origin gate (CORS allow-list)
//! - Gzip compression
//! - Security headers
//! - Response timing
//! - Per-client rate limiting
//! - HTTP parameter pollution filtering
//!
//! [`Pipeline`] assembles them around the routed handler.

pub mod compression;
pub mod cors;
pub mod error;
pub mod hpp;
pub mod pipeline;
pub mod rate_limit;
pub mod security;
pub mod timing;

// Re-export commonly used types
pub use compression::GzipCompression;
pub use cors::{CorsConfig, OriginGate};
pub use error::{AppError, ErrorResponse};
pub use hpp::{HppFilter, HppPolicy};
pub use pipeline::{compose, into_handler, Handler, Pipeline, Transformer};
pub use rate_limit::{
    ClientKeyExtractor, ForwardedHeader, RateLimitInfo, RateLimitPolicy, RateLimiter,
    RemoteAddress,
};
pub use security::{SecurityConfig, SecurityHeaders};
pub use timing::ResponseTimer;
