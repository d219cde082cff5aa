use crate::error::MetricsError;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use std::sync::Arc;

/// Read-only view of an outbound request, as seen by tags providers.
///
/// The view is a snapshot taken when the exchange starts. The only mutation it
/// allows is [`ClientRequest::set_header`], used by trace-context propagation:
/// headers set through it are forwarded to the real request before dispatch.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route: Option<Arc<str>>,
    injected: HeaderMap,
}

impl ClientRequest {
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            route: None,
            injected: HeaderMap::new(),
        }
    }

    /// Snapshot an `http::Request` (body is not inspected)
    #[must_use]
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
        )
    }

    /// Attach the URI template this request was expanded from
    #[must_use]
    pub fn with_route(mut self, route: Option<Arc<str>>) -> Self {
        self.route = route;
        self
    }

    /// HTTP method name, e.g. `GET`
    #[must_use]
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// URI path; `/` when the URI has none
    #[must_use]
    pub fn path(&self) -> &str {
        match self.uri.path() {
            "" => "/",
            path => path,
        }
    }

    /// Full absolute URL, or `None` if the URI has no scheme or authority
    #[must_use]
    pub fn url(&self) -> Option<String> {
        if self.uri.scheme().is_some() && self.uri.authority().is_some() {
            Some(self.uri.to_string())
        } else {
            None
        }
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// URI template the request was expanded from, when it was captured
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// First value of header `name`; `None` if absent or not valid UTF-8
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn header_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.headers.keys().map(HeaderName::as_str)
    }

    /// Set a header on the outbound request, replacing existing values.
    ///
    /// # Errors
    /// Returns `MetricsError::InvalidHeaderName` or `MetricsError::InvalidHeaderValue`
    /// if `name` or `value` is not a valid header component.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), MetricsError> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name.clone(), value.clone());
        self.injected.insert(name, value);
        Ok(())
    }

    /// Headers set through [`ClientRequest::set_header`] since the last call
    pub(crate) fn take_injected(&mut self) -> HeaderMap {
        std::mem::take(&mut self.injected)
    }
}
