//! Pipeline composition
//!
//! A [`Transformer`] wraps a [`Handler`] and returns a new [`Handler`]. Two
//! composition entry points exist and they list transformers in opposite
//! directions:
//!
//! - [`compose`] takes transformers innermost first. The first one wraps the
//!   handler directly and the last one listed becomes the outermost wrapper.
//! - [`Pipeline`] takes stages outermost first, so the listing order is the
//!   order in which requests see each stage's pre-logic.

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use std::{convert::Infallible, fmt, sync::Arc};
use tower::{util::BoxCloneSyncService, Service};

/// Type-erased request handler every stage consumes and produces
pub type Handler = BoxCloneSyncService<Request, Response, Infallible>;

/// Capability to wrap a handler and return a handler
pub trait Transformer: Send + Sync {
    fn wrap(&self, inner: Handler) -> Handler;
}

impl<F> Transformer for F
where
    F: Fn(Handler) -> Handler + Send + Sync,
{
    fn wrap(&self, inner: Handler) -> Handler {
        self(inner)
    }
}

/// Erase the concrete type of an infallible service
pub fn into_handler<S>(service: S) -> Handler
where
    S: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    Handler::new(
        tower::ServiceBuilder::new().map_response(IntoResponse::into_response).service(service),
    )
}

/// Wrap `handler` with each transformer in turn, innermost first.
///
/// `compose(h, [a, b, c])` yields `c(b(a(h)))`: `c` runs its pre-logic first
/// and its post-logic last.
pub fn compose<I>(handler: Handler, transformers: I) -> Handler
where
    I: IntoIterator,
    I::Item: AsRef<dyn Transformer>,
{
    transformers.into_iter().fold(handler, |inner, transformer| transformer.as_ref().wrap(inner))
}

struct Stage {
    name: &'static str,
    transformer: Arc<dyn Transformer>,
}

impl AsRef<dyn Transformer> for Stage {
    fn as_ref(&self) -> &(dyn Transformer + 'static) {
        self.transformer.as_ref()
    }
}

/// Ordered list of named stages, outermost first
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage that runs inside every stage added before it
    #[must_use]
    pub fn stage<T>(mut self, name: &'static str, transformer: T) -> Self
    where
        T: Transformer + 'static,
    {
        self.stages.push(Stage { name, transformer: Arc::new(transformer) });
        self
    }

    /// Stage names in request order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name).collect()
    }

    /// Build the composed handler around `handler`
    pub fn build(&self, handler: Handler) -> Handler {
        compose(handler, self.stages.iter().rev())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stage_names()).finish()
    }
}
