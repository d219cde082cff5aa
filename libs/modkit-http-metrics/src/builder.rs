use crate::config::ClientMetricsConfig;
use crate::error::MetricsError;
use crate::interceptor::MetricsInterceptor;
use crate::layers::MetricsLayer;
use crate::observation::Instrumentation;
use crate::provider::{DefaultHttpTagsProvider, HttpTagsProvider};
use crate::registry::{MeterRegistry, TimerId};
use std::sync::Arc;

/// Builder for [`MetricsInterceptor`] and [`MetricsLayer`].
///
/// Only the registry is required. Without an explicit tags provider, a
/// [`DefaultHttpTagsProvider`] using the configured `unknown_uri` is used.
pub struct ClientMetricsBuilder {
    registry: Arc<dyn MeterRegistry>,
    tags_provider: Option<Arc<dyn HttpTagsProvider>>,
    config: ClientMetricsConfig,
}

impl ClientMetricsBuilder {
    #[must_use]
    pub fn new(registry: Arc<dyn MeterRegistry>) -> Self {
        Self {
            registry,
            tags_provider: None,
            config: ClientMetricsConfig::default(),
        }
    }

    /// Replace the tagging policy
    #[must_use]
    pub fn tags_provider(mut self, tags_provider: impl HttpTagsProvider + 'static) -> Self {
        self.tags_provider = Some(Arc::new(tags_provider));
        self
    }

    /// Replace the whole configuration
    #[must_use]
    pub fn config(mut self, config: ClientMetricsConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject the current trace context into outbound requests (`otel` feature)
    #[must_use]
    pub fn propagate_trace_context(mut self, enabled: bool) -> Self {
        self.config.propagate_trace_context = enabled;
        self
    }

    /// Build a synchronous interceptor.
    ///
    /// # Errors
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn build_interceptor(self) -> Result<MetricsInterceptor, MetricsError> {
        Ok(MetricsInterceptor::from_instrumentation(self.build()?))
    }

    /// Build a tower layer.
    ///
    /// # Errors
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn build_layer(self) -> Result<MetricsLayer, MetricsError> {
        Ok(MetricsLayer::from_instrumentation(self.build()?))
    }

    /// Infallible build for the default configuration
    pub(crate) fn interceptor(self) -> MetricsInterceptor {
        MetricsInterceptor::from_instrumentation(self.assemble())
    }

    pub(crate) fn layer(self) -> MetricsLayer {
        MetricsLayer::from_instrumentation(self.assemble())
    }

    fn build(self) -> Result<Arc<Instrumentation>, MetricsError> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> Arc<Instrumentation> {
        let Self {
            registry,
            tags_provider,
            config,
        } = self;

        let tags_provider: Arc<dyn HttpTagsProvider> = match tags_provider {
            Some(provider) => provider,
            None => Arc::new(DefaultHttpTagsProvider::new(config.unknown_uri)),
        };
        let timer = TimerId::new(config.metric_name).with_description(config.description);

        Arc::new(Instrumentation {
            registry,
            tags_provider,
            timer,
            propagate_trace_context: config.propagate_trace_context,
        })
    }
}
