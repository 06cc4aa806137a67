use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
};
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tower::{Layer, ServiceExt};

use crate::presentation::middleware::pipeline::{into_handler, Handler, Transformer};

/// GET request without connection info
pub fn get(uri: &str) -> Request {
    axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Attach the connection info axum inserts for real connections
pub fn with_peer(mut request: Request, peer: &str) -> Request {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Drive a handler to completion
pub async fn call(handler: Handler, request: Request) -> Response {
    handler.oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Innermost handler that records its invocation and answers 200 "ok"
pub fn echo_handler(log: Arc<Mutex<Vec<String>>>) -> Handler {
    into_handler(tower::service_fn(move |_request: Request| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push("handler".to_string());
            Ok::<_, Infallible>((StatusCode::OK, "ok").into_response())
        }
    }))
}

/// Handler that counts invocations
pub fn counting_handler(hits: Arc<Mutex<usize>>) -> Handler {
    into_handler(tower::service_fn(move |_request: Request| {
        let hits = hits.clone();
        async move {
            *hits.lock().unwrap() += 1;
            Ok::<_, Infallible>((StatusCode::OK, "ok").into_response())
        }
    }))
}

/// Transformer that logs `<name>:pre` and `<name>:post` around the inner handler
#[derive(Clone)]
pub struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { name, log }
    }
}

async fn record(State(recorder): State<Recorder>, request: Request, next: Next) -> Response {
    recorder.log.lock().unwrap().push(format!("{}:pre", recorder.name));
    let response = next.run(request).await;
    recorder.log.lock().unwrap().push(format!("{}:post", recorder.name));
    response
}

impl Transformer for Recorder {
    fn wrap(&self, inner: Handler) -> Handler {
        into_handler(from_fn_with_state(self.clone(), record).layer(inner))
    }
}
