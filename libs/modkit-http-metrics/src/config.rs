use crate::error::MetricsError;
use crate::provider::UNKNOWN_URI;
use serde::Deserialize;

/// Default timer name for client exchanges
pub const DEFAULT_METRIC_NAME: &str = "http.client.requests";

/// Default timer description
pub const DEFAULT_METRIC_DESCRIPTION: &str = "Timer of HTTP client exchanges";

/// Configuration of the client metrics interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientMetricsConfig {
    /// Name of the timer every exchange is recorded under
    pub metric_name: String,

    /// Human-readable timer description
    pub description: String,

    /// `uri` tag value used by the default tags provider when no route
    /// template was captured
    pub unknown_uri: String,

    /// Inject the current OpenTelemetry context into outbound request headers.
    ///
    /// Only effective with the `otel` feature; a no-op otherwise.
    pub propagate_trace_context: bool,
}

impl Default for ClientMetricsConfig {
    fn default() -> Self {
        Self {
            metric_name: DEFAULT_METRIC_NAME.to_owned(),
            description: DEFAULT_METRIC_DESCRIPTION.to_owned(),
            unknown_uri: UNKNOWN_URI.to_owned(),
            propagate_trace_context: false,
        }
    }
}

impl ClientMetricsConfig {
    /// # Errors
    /// Returns `MetricsError::InvalidConfig` if the metric name is blank.
    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.metric_name.trim().is_empty() {
            return Err(MetricsError::InvalidConfig(
                "metric_name must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}
