use crate::builder::ClientMetricsBuilder;
use crate::observation::Instrumentation;
use crate::provider::HttpTagsProvider;
use crate::registry::MeterRegistry;
use crate::route::route_stack;
use http::{Request, Response};
use std::fmt;
use std::sync::Arc;

/// Synchronous client interceptor recording one timer observation per exchange.
///
/// The interceptor is purely observational: the continuation's response or
/// error is returned untouched, and failures while recording are logged at
/// INFO and discarded.
///
/// # Example
///
/// ```ignore
/// let registry = Arc::new(SimpleMeterRegistry::new());
/// let interceptor = MetricsInterceptor::new(registry.clone());
///
/// let response = interceptor.intercept(request, |request| transport.execute(request))?;
/// assert_eq!(registry.count("http.client.requests"), 1);
/// ```
#[derive(Clone, Debug)]
pub struct MetricsInterceptor {
    instrumentation: Arc<Instrumentation>,
}

impl MetricsInterceptor {
    /// Interceptor with the default tags provider and configuration
    #[must_use]
    pub fn new(registry: Arc<dyn MeterRegistry>) -> Self {
        ClientMetricsBuilder::new(registry).interceptor()
    }

    /// Interceptor with a custom tags provider
    #[must_use]
    pub fn with_tags_provider(
        registry: Arc<dyn MeterRegistry>,
        tags_provider: impl HttpTagsProvider + 'static,
    ) -> Self {
        ClientMetricsBuilder::new(registry)
            .tags_provider(tags_provider)
            .interceptor()
    }

    pub(crate) fn from_instrumentation(instrumentation: Arc<Instrumentation>) -> Self {
        Self { instrumentation }
    }

    /// Run `execution` (the rest of the chain) for `request` and time it.
    ///
    /// Exactly one observation is recorded, including when `execution`
    /// returns an error or panics. Routes captured on this thread and not
    /// claimed are discarded once the outermost exchange returns.
    ///
    /// # Errors
    /// Returns exactly the error produced by `execution`.
    pub fn intercept<B, R, E, F>(&self, mut request: Request<B>, execution: F) -> Result<Response<R>, E>
    where
        F: FnOnce(Request<B>) -> Result<Response<R>, E>,
        E: fmt::Display,
    {
        let _scope = route_stack::enter();
        let observation = self.instrumentation.start(&mut request);
        let result = execution(request);
        observation.stop(&result);
        result
    }
}
