use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tracing::{debug, info, warn};

use super::{
    error::AppError,
    pipeline::{into_handler, Handler, Transformer},
};

/// Immutable quota: at most `max_requests` per client within each `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self { max_requests: 6, window: Duration::from_secs(60) }
    }
}

/// Derives the identity requests are counted against
pub trait ClientKeyExtractor: Send + Sync + fmt::Debug {
    fn client_key(&self, request: &Request) -> String;
}

/// Keys clients by the IP address of the TCP peer
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteAddress;

impl ClientKeyExtractor for RemoteAddress {
    fn client_key(&self, request: &Request) -> String {
        peer_ip(request).to_string()
    }
}

/// Keys clients by the first entry of a header set by a trusted proxy,
/// falling back to the peer address when the header is absent or unusable
#[derive(Debug, Clone)]
pub struct ForwardedHeader {
    header: HeaderName,
}

impl ForwardedHeader {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn x_forwarded_for() -> Self {
        Self::new(HeaderName::from_static("x-forwarded-for"))
    }
}

impl ClientKeyExtractor for ForwardedHeader {
    fn client_key(&self, request: &Request) -> String {
        request
            .headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
            .unwrap_or_else(|| peer_ip(request))
            .to_string()
    }
}

fn peer_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |ConnectInfo(addr)| addr.ip())
}

/// Fixed-window request counter shared by every request of one pipeline.
///
/// Counts only ever grow inside a window; the whole table is swapped for an
/// empty one at each window boundary.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    visitors: Arc<Mutex<HashMap<String, u32>>>,
    key_extractor: Arc<dyn ClientKeyExtractor>,
    include_headers: bool,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            visitors: Arc::new(Mutex::new(HashMap::new())),
            key_extractor: Arc::new(RemoteAddress),
            include_headers: false,
        }
    }

    #[must_use]
    pub fn with_key_extractor(mut self, extractor: Arc<dyn ClientKeyExtractor>) -> Self {
        self.key_extractor = extractor;
        self
    }

    /// Report the quota on allowed responses via `x-ratelimit-*` headers
    #[must_use]
    pub fn with_headers(mut self, include_headers: bool) -> Self {
        self.include_headers = include_headers;
        self
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Count one request for `client_key` and decide whether it may proceed.
    ///
    /// A client may make exactly `max_requests` requests per window; the
    /// request that pushes the count past the maximum is rejected.
    pub async fn check_rate_limit(&self, client_key: &str) -> Result<RateLimitInfo, AppError> {
        let count = {
            let mut visitors = self.visitors.lock().await;
            let count = visitors.entry(client_key.to_owned()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        if count > self.policy.max_requests {
            return Err(AppError::RateLimit {
                message: format!(
                    "too many requests, limit is {} per {:?}",
                    self.policy.max_requests, self.policy.window
                ),
            });
        }

        Ok(RateLimitInfo {
            limit: self.policy.max_requests,
            remaining: self.policy.max_requests - count,
        })
    }

    /// Replace the counter table with an empty one, returning how many clients were tracked
    pub async fn reset(&self) -> usize {
        let previous = std::mem::take(&mut *self.visitors.lock().await);
        previous.len()
    }

    pub async fn visitor_count(&self, client_key: &str) -> u32 {
        self.visitors.lock().await.get(client_key).copied().unwrap_or(0)
    }

    pub async fn tracked_clients(&self) -> usize {
        self.visitors.lock().await.len()
    }

    /// Reset the table once per window until `shutdown` is cancelled.
    ///
    /// The first reset happens one full window after the call.
    pub fn spawn_reset_cycle(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        // tokio intervals cannot have a zero period
        let window = self.policy.window.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + window, window);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        info!("Rate limit reset cycle stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let cleared = limiter.reset().await;
                        debug!(cleared, "Rate limit window reset");
                    }
                }
            }
        })
    }
}

/// Quota state reported for an allowed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
}

impl RateLimitInfo {
    pub fn add_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
    }
}

async fn rate_limit(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let client_key = limiter.key_extractor.client_key(&request);

    debug!("Rate limit check for client: {}", client_key);

    match limiter.check_rate_limit(&client_key).await {
        Ok(info) => {
            let mut response = next.run(request).await;

            if limiter.include_headers {
                info.add_headers(response.headers_mut());
            }

            response
        }
        Err(rate_limit_error) => {
            warn!("Rate limit exceeded for client: {}", client_key);
            rate_limit_error.into_response()
        }
    }
}

impl Transformer for RateLimiter {
    fn wrap(&self, inner: Handler) -> Handler {
        into_handler(from_fn_with_state(self.clone(), rate_limit).layer(inner))
    }
}
