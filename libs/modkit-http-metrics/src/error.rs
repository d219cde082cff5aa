use thiserror::Error;

/// Errors raised by the metrics instrumentation itself.
///
/// None of these ever reach the caller of an intercepted exchange: failures
/// while recording are logged and discarded. They surface only from the
/// construction-time and helper APIs (configuration, URI template expansion,
/// header injection) and from [`crate::MeterRegistry`] / [`crate::HttpTagsProvider`]
/// implementations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricsError {
    /// Tags provider failed to derive tags for an exchange
    #[error("Failed to derive tags: {0}")]
    TagDerivation(String),

    /// Meter registry refused or failed to record an observation
    #[error("Meter registry error: {0}")]
    Registry(String),

    /// Invalid header name passed to the request view
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value passed to the request view
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// URI template could not be expanded
    #[error("Failed to expand URI template '{template}': {reason}")]
    UriTemplate {
        /// The raw template
        template: String,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Expanded template is not a valid URI
    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// Configuration rejected by validation
    #[error("Invalid metrics configuration: {0}")]
    InvalidConfig(String),
}

impl MetricsError {
    pub(crate) fn uri_template(template: &str, reason: impl Into<String>) -> Self {
        Self::UriTemplate {
            template: template.to_owned(),
            reason: reason.into(),
        }
    }
}
