//! Route template capture
//!
//! The `uri` tag should carry the template a request was expanded from
//! (`/hotels/{hotel}`), not the concrete URI. The template is known where the
//! URI is expanded, which is usually far from the interceptor. Two ways of
//! getting it there are supported:
//!
//! - **Explicit**: put a [`RouteTemplate`] into the request extensions
//!   (see [`CapturingUriTemplateHandler::expand_request`]). Always preferred.
//! - **Thread-local**: [`CapturingUriTemplateHandler`] used as a plain
//!   [`UriTemplateHandler`] records `(template, expanded URI)` on the current
//!   thread's route stack. The interceptor claims the most recent entry whose
//!   URI matches the request, on the same thread, when the exchange starts.
//!
//! Claiming pops the entry, so every captured route is consumed by at most one
//! exchange. Whatever is left unclaimed is discarded when the outermost
//! exchange on the thread finishes.

use crate::error::MetricsError;
use http::{Request, Uri};
use std::sync::Arc;

/// URI template attached to a request through `http::Extensions`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTemplate(Arc<str>);

impl RouteTemplate {
    #[must_use]
    pub fn new(template: impl Into<Arc<str>>) -> Self {
        Self(template.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attach this template to `request`
    pub fn attach<B>(self, request: &mut Request<B>) {
        request.extensions_mut().insert(self);
    }
}

/// Variables used to expand a URI template
#[derive(Debug, Clone, Copy)]
pub enum UriVariables<'a> {
    /// Consumed left to right, one per placeholder
    Positional(&'a [&'a str]),
    /// Looked up by placeholder name
    Named(&'a [(&'a str, &'a str)]),
}

/// Expands URI templates such as `https://example.com/hotels/{hotel}`.
pub trait UriTemplateHandler: Send + Sync {
    /// # Errors
    /// Returns an error if a variable is missing, the template is malformed or
    /// the expanded string is not a valid URI.
    fn expand(&self, template: &str, variables: &UriVariables<'_>) -> Result<Uri, MetricsError>;
}

/// Minimal `{name}` template expander.
///
/// Placeholders may carry a pattern suffix (`{id:\d+}`); only the name before
/// `:` is used. Substituted values are percent-encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUriTemplateHandler;

impl UriTemplateHandler for DefaultUriTemplateHandler {
    fn expand(&self, template: &str, variables: &UriVariables<'_>) -> Result<Uri, MetricsError> {
        let mut expanded = String::with_capacity(template.len());
        let mut positional = match variables {
            UriVariables::Positional(values) => values.iter(),
            UriVariables::Named(_) => std::slice::Iter::default(),
        };
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            expanded.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];
            let close = after_open
                .find('}')
                .ok_or_else(|| MetricsError::uri_template(template, "unclosed variable"))?;
            let placeholder = &after_open[..close];
            let name = placeholder
                .split_once(':')
                .map_or(placeholder, |(name, _)| name)
                .trim();

            let value = match variables {
                UriVariables::Positional(_) => positional.next().copied(),
                UriVariables::Named(pairs) => pairs
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value),
            }
            .ok_or_else(|| {
                MetricsError::uri_template(template, format!("missing value for variable '{name}'"))
            })?;

            expanded.push_str(&urlencoding::encode(value));
            rest = &after_open[close + 1..];
        }
        expanded.push_str(rest);

        Ok(expanded.parse::<Uri>()?)
    }
}

/// Decorator that records the raw template of every expansion.
///
/// Used as a [`UriTemplateHandler`], it pushes the template onto the current
/// thread's route stack. [`CapturingUriTemplateHandler::expand_request`] returns
/// the template explicitly instead and leaves the stack untouched.
#[derive(Debug, Clone, Default)]
pub struct CapturingUriTemplateHandler<H> {
    delegate: H,
}

impl<H: UriTemplateHandler> CapturingUriTemplateHandler<H> {
    #[must_use]
    pub fn new(delegate: H) -> Self {
        Self { delegate }
    }

    /// Expand `template` and return the URI together with its route template.
    ///
    /// # Errors
    /// Propagates the delegate's expansion error.
    pub fn expand_request(
        &self,
        template: &str,
        variables: &UriVariables<'_>,
    ) -> Result<(Uri, RouteTemplate), MetricsError> {
        let uri = self.delegate.expand(template, variables)?;
        Ok((uri, RouteTemplate::new(template)))
    }
}

impl<H: UriTemplateHandler> UriTemplateHandler for CapturingUriTemplateHandler<H> {
    fn expand(&self, template: &str, variables: &UriVariables<'_>) -> Result<Uri, MetricsError> {
        let slot = route_stack::push(template);
        match self.delegate.expand(template, variables) {
            Ok(uri) => {
                route_stack::bind(slot, uri.clone());
                Ok(uri)
            }
            Err(err) => {
                route_stack::discard(slot);
                Err(err)
            }
        }
    }
}

/// Resolve the route of an outgoing request: explicit extension first, then
/// the current thread's route stack.
///
/// A route captured on the stack for this request is claimed even when the
/// extension wins, so it never outlives the exchange.
pub(crate) fn resolve<B>(request: &Request<B>) -> Option<Arc<str>> {
    let captured = route_stack::claim(request.uri());
    request
        .extensions()
        .get::<RouteTemplate>()
        .map(|route| Arc::clone(&route.0))
        .or(captured)
}

/// Per-thread stack of captured route templates
///
/// Entries live until an exchange claims them or until the outermost exchange
/// running on the thread finishes, whichever comes first.
pub mod route_stack {
    use http::Uri;
    use std::cell::{Cell, RefCell};
    use std::marker::PhantomData;
    use std::sync::Arc;

    struct CapturedRoute {
        id: u64,
        template: Arc<str>,
        uri: Option<Uri>,
    }

    thread_local! {
        static ROUTES: RefCell<Vec<CapturedRoute>> = const { RefCell::new(Vec::new()) };
        static NEXT_ID: Cell<u64> = const { Cell::new(0) };
        static ACTIVE_EXCHANGES: Cell<usize> = const { Cell::new(0) };
    }

    /// Handle to one captured entry, valid until the entry is claimed or dropped
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct RouteSlot(u64);

    pub(crate) fn push(template: &str) -> RouteSlot {
        let id = NEXT_ID.get();
        NEXT_ID.set(id.wrapping_add(1));
        ROUTES.with_borrow_mut(|routes| {
            routes.push(CapturedRoute {
                id,
                template: Arc::from(template),
                uri: None,
            });
        });
        RouteSlot(id)
    }

    pub(crate) fn bind(slot: RouteSlot, uri: Uri) {
        ROUTES.with_borrow_mut(|routes| {
            if let Some(route) = routes.iter_mut().find(|route| route.id == slot.0) {
                route.uri = Some(uri);
            }
        });
    }

    pub(crate) fn discard(slot: RouteSlot) {
        ROUTES.with_borrow_mut(|routes| {
            routes.retain(|route| route.id != slot.0);
        });
        release_if_empty();
    }

    /// Pop the most recent route captured for `uri`.
    ///
    /// An exact match wins; otherwise the most recent entry with the same
    /// scheme, authority and path is taken (query strings may differ).
    pub(crate) fn claim(uri: &Uri) -> Option<Arc<str>> {
        let claimed = ROUTES.with_borrow_mut(|routes| {
            let pos = routes
                .iter()
                .rposition(|route| route.uri.as_ref() == Some(uri))
                .or_else(|| {
                    routes.iter().rposition(|route| {
                        route.uri.as_ref().is_some_and(|captured| same_target(captured, uri))
                    })
                })?;
            Some(routes.remove(pos).template)
        });
        release_if_empty();
        claimed
    }

    fn same_target(captured: &Uri, requested: &Uri) -> bool {
        captured.scheme() == requested.scheme()
            && captured.authority() == requested.authority()
            && captured.path() == requested.path()
    }

    fn release_if_empty() {
        ROUTES.with_borrow_mut(|routes| {
            if routes.is_empty() && routes.capacity() > 0 {
                *routes = Vec::new();
            }
        });
    }

    /// Marks an exchange running on the current thread.
    ///
    /// When the outermost scope on a thread is dropped, every route still on
    /// the stack is discarded.
    #[derive(Debug)]
    pub(crate) struct ExchangeScope {
        _thread_bound: PhantomData<*const ()>,
    }

    pub(crate) fn enter() -> ExchangeScope {
        ACTIVE_EXCHANGES.set(ACTIVE_EXCHANGES.get().saturating_add(1));
        ExchangeScope {
            _thread_bound: PhantomData,
        }
    }

    impl Drop for ExchangeScope {
        fn drop(&mut self) {
            let remaining = ACTIVE_EXCHANGES.get().saturating_sub(1);
            ACTIVE_EXCHANGES.set(remaining);
            if remaining == 0 {
                clear();
            }
        }
    }

    /// Number of routes captured on this thread and not yet claimed
    #[must_use]
    pub fn depth() -> usize {
        ROUTES.with_borrow(Vec::len)
    }

    /// Discard every captured route on this thread
    pub fn clear() {
        ROUTES.with_borrow_mut(|routes| *routes = Vec::new());
    }
}
