use crate::request::ClientRequest;
use http::{HeaderMap, HeaderName, Response};
use std::fmt;

/// Description of a failed exchange: the error's type name plus its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeError {
    kind: &'static str,
    message: String,
}

impl ExchangeError {
    #[must_use]
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Describe `error` by the short name of its type, e.g. `HttpError`
    #[must_use]
    pub fn from_error<E: fmt::Display + ?Sized>(error: &E) -> Self {
        Self::new(short_type_name::<E>(), error.to_string())
    }

    /// Short type name of the error (no module path, no generics)
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Read-only view of the (possibly absent) response of an exchange.
///
/// An absent response (the delegate failed before producing one) degrades to
/// status `0` and no headers.
#[derive(Debug, Clone, Copy)]
pub struct ClientResponse<'a> {
    request: &'a ClientRequest,
    status: u16,
    headers: Option<&'a HeaderMap>,
    error: Option<&'a ExchangeError>,
}

impl<'a> ClientResponse<'a> {
    /// View over a response returned by the delegate
    #[must_use]
    pub fn of<B>(request: &'a ClientRequest, response: &'a Response<B>) -> Self {
        Self {
            request,
            status: response.status().as_u16(),
            headers: Some(response.headers()),
            error: None,
        }
    }

    /// View for an exchange that produced no response
    #[must_use]
    pub fn absent(request: &'a ClientRequest) -> Self {
        Self {
            request,
            status: 0,
            headers: None,
            error: None,
        }
    }

    /// View for an exchange whose delegate failed with `error`
    #[must_use]
    pub fn failed(request: &'a ClientRequest, error: &'a ExchangeError) -> Self {
        Self {
            error: Some(error),
            ..Self::absent(request)
        }
    }

    /// Status code, `0` when there is no response
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.headers.is_some()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers?.get(name)?.to_str().ok()
    }

    pub fn header_names(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.headers
            .into_iter()
            .flat_map(HeaderMap::keys)
            .map(HeaderName::as_str)
    }

    #[must_use]
    pub fn request(&self) -> &'a ClientRequest {
        self.request
    }

    /// Delegate failure, when the exchange did not complete normally
    #[must_use]
    pub fn error(&self) -> Option<&'a ExchangeError> {
        self.error
    }
}
