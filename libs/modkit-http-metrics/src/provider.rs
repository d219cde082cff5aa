//! Tagging policy for client observations
//!
//! The interceptor itself holds no tagging policy. It asks an
//! [`HttpTagsProvider`] for the tags of every finished exchange. The default
//! provider derives the usual `method` / `uri` / `status` / `outcome` /
//! `exception` dimensions; callers can plug in their own implementation or a
//! closure through [`tags_provider_fn`].

use crate::error::MetricsError;
use crate::request::ClientRequest;
use crate::response::ClientResponse;
use crate::tags::Tags;
use std::fmt;

/// Sentinel used for the `uri` tag when no route template was captured
pub const UNKNOWN_URI: &str = "UNKNOWN";

/// `status` tag value used when the exchange produced no status code
pub const CLIENT_ERROR_STATUS: &str = "CLIENT_ERROR";

/// `exception` tag value for exchanges that completed without error
pub const NO_EXCEPTION: &str = "None";

/// Derives tags for one finished exchange.
pub trait HttpTagsProvider: Send + Sync {
    /// # Errors
    /// Returns an error if tags cannot be derived. The exchange is then left
    /// unrecorded; the error is logged and never reaches the caller.
    fn tags(
        &self,
        request: &ClientRequest,
        response: &ClientResponse<'_>,
    ) -> Result<Tags, MetricsError>;
}

/// Coarse classification of a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Unknown,
}

impl Outcome {
    #[must_use]
    pub fn for_status(status: u16) -> Self {
        match status {
            100..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirection,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "INFORMATIONAL",
            Self::Success => "SUCCESS",
            Self::Redirection => "REDIRECTION",
            Self::ClientError => "CLIENT_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default tagging policy.
///
/// | tag | value |
/// |---|---|
/// | `method` | request method |
/// | `uri` | captured route template without scheme/authority, else [`UNKNOWN_URI`] |
/// | `status` | status code, or [`CLIENT_ERROR_STATUS`] when there is none |
/// | `outcome` | [`Outcome`] of the status |
/// | `exception` | short error type name, or [`NO_EXCEPTION`] |
#[derive(Debug, Clone)]
pub struct DefaultHttpTagsProvider {
    unknown_uri: String,
}

impl Default for DefaultHttpTagsProvider {
    fn default() -> Self {
        Self::new(UNKNOWN_URI)
    }
}

impl DefaultHttpTagsProvider {
    /// Create a provider that reports `unknown_uri` when no route is known
    #[must_use]
    pub fn new(unknown_uri: impl Into<String>) -> Self {
        Self {
            unknown_uri: unknown_uri.into(),
        }
    }

    fn uri(&self, request: &ClientRequest) -> String {
        request
            .route()
            .map_or_else(|| self.unknown_uri.clone(), normalize_route)
    }
}

impl HttpTagsProvider for DefaultHttpTagsProvider {
    fn tags(
        &self,
        request: &ClientRequest,
        response: &ClientResponse<'_>,
    ) -> Result<Tags, MetricsError> {
        let status = match response.status_code() {
            0 => CLIENT_ERROR_STATUS.to_owned(),
            code => code.to_string(),
        };
        let exception = response
            .error()
            .map_or(NO_EXCEPTION, |error| error.kind());

        Ok(Tags::empty()
            .and("method", request.method())
            .and("uri", self.uri(request))
            .and("status", status)
            .and("outcome", Outcome::for_status(response.status_code()).as_str())
            .and("exception", exception))
    }
}

/// Strip scheme and authority from a route template and ensure a leading `/`.
///
/// `https://example.com/hotels/{hotel}` and `hotels/{hotel}` both become
/// `/hotels/{hotel}`.
fn normalize_route(route: &str) -> String {
    let without_origin = ["https://", "http://"]
        .iter()
        .find_map(|scheme| route.strip_prefix(scheme))
        .map_or(route, |rest| rest.find('/').map_or("", |pos| &rest[pos..]));

    if without_origin.starts_with('/') {
        without_origin.to_owned()
    } else {
        format!("/{without_origin}")
    }
}

/// Tags provider backed by a closure, see [`tags_provider_fn`]
#[derive(Clone)]
pub struct TagsProviderFn<F> {
    f: F,
}

impl<F> fmt::Debug for TagsProviderFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagsProviderFn").finish_non_exhaustive()
    }
}

/// Use a closure as an [`HttpTagsProvider`].
///
/// ```ignore
/// let provider = tags_provider_fn(|request, response| {
///     Ok(Tags::of([("method", request.method()), ("status", &response.status_code().to_string())]))
/// });
/// ```
pub fn tags_provider_fn<F>(f: F) -> TagsProviderFn<F>
where
    F: Fn(&ClientRequest, &ClientResponse<'_>) -> Result<Tags, MetricsError> + Send + Sync,
{
    TagsProviderFn { f }
}

impl<F> HttpTagsProvider for TagsProviderFn<F>
where
    F: Fn(&ClientRequest, &ClientResponse<'_>) -> Result<Tags, MetricsError> + Send + Sync,
{
    fn tags(
        &self,
        request: &ClientRequest,
        response: &ClientResponse<'_>,
    ) -> Result<Tags, MetricsError> {
        (self.f)(request, response)
    }
}
