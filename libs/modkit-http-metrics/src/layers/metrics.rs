use crate::builder::ClientMetricsBuilder;
use crate::observation::Instrumentation;
use crate::provider::HttpTagsProvider;
use crate::registry::MeterRegistry;
use crate::route::route_stack;
use http::{Request, Response};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that records a timer observation for every outbound request
///
/// Each call produces exactly one observation tagged by the configured
/// [`HttpTagsProvider`]. Responses and errors of the inner service pass through
/// unchanged. A future dropped before completion is recorded as cancelled.
///
/// Route templates reach this layer through the [`crate::RouteTemplate`]
/// request extension; the thread-local route stack is consulted only when
/// `call` runs on the thread that expanded the URI.
#[derive(Clone, Debug)]
pub struct MetricsLayer {
    instrumentation: Arc<Instrumentation>,
}

impl MetricsLayer {
    /// Layer with the default tags provider and configuration
    #[must_use]
    pub fn new(registry: Arc<dyn MeterRegistry>) -> Self {
        ClientMetricsBuilder::new(registry).layer()
    }

    /// Layer with a custom tags provider
    #[must_use]
    pub fn with_tags_provider(
        registry: Arc<dyn MeterRegistry>,
        tags_provider: impl HttpTagsProvider + 'static,
    ) -> Self {
        ClientMetricsBuilder::new(registry)
            .tags_provider(tags_provider)
            .layer()
    }

    pub(crate) fn from_instrumentation(instrumentation: Arc<Instrumentation>) -> Self {
        Self { instrumentation }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            instrumentation: Arc::clone(&self.instrumentation),
        }
    }
}

/// Service that times requests to the inner service
#[derive(Clone, Debug)]
pub struct MetricsService<S> {
    inner: S,
    instrumentation: Arc<Instrumentation>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let scope = route_stack::enter();
        let observation = self.instrumentation.start(&mut req);
        let future = self.inner.call(req);
        drop(scope);

        Box::pin(async move {
            let result = future.await;
            observation.stop(&result);
            result
        })
    }
}
