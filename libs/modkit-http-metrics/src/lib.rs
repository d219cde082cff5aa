#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP client metrics for `ModKit`
//!
//! This crate instruments outbound HTTP exchanges with a timer observation:
//! - One `http.client.requests` observation per exchange, on success, error,
//!   panic or cancellation
//! - Tags for method, URI template, status, outcome and error type
//!   (pluggable through [`HttpTagsProvider`])
//! - Recording failures are logged and never change the exchange's result
//! - URI template capture for the `uri` tag, either through a request
//!   extension or a per-thread route stack
//! - Optional OpenTelemetry trace propagation and histogram export (feature-gated)
//!
//! Two interception shapes share the same observation core:
//! [`MetricsInterceptor`] wraps a synchronous continuation, [`MetricsLayer`]
//! wraps any tower HTTP service.
//!
//! # Example
//!
//! ```ignore
//! use modkit_http_metrics::{MetricsLayer, SimpleMeterRegistry};
//! use std::sync::Arc;
//! use tower::ServiceBuilder;
//!
//! let registry = Arc::new(SimpleMeterRegistry::new());
//! let client = ServiceBuilder::new()
//!     .layer(MetricsLayer::new(registry.clone()))
//!     .service(transport);
//!
//! client.oneshot(request).await?;
//! assert_eq!(registry.count("http.client.requests"), 1);
//! ```

mod builder;
mod config;
mod error;
mod interceptor;
mod layers;
mod observation;
pub mod otel;
mod provider;
mod registry;
mod request;
mod response;
mod route;
mod tags;

pub use builder::ClientMetricsBuilder;
pub use config::{ClientMetricsConfig, DEFAULT_METRIC_DESCRIPTION, DEFAULT_METRIC_NAME};
pub use error::MetricsError;
pub use interceptor::MetricsInterceptor;
pub use layers::{MetricsLayer, MetricsService};
pub use observation::{CANCELLED, PANICKED};
pub use provider::{
    CLIENT_ERROR_STATUS, DefaultHttpTagsProvider, HttpTagsProvider, NO_EXCEPTION, Outcome,
    TagsProviderFn, UNKNOWN_URI, tags_provider_fn,
};
pub use registry::{MeterRegistry, SimpleMeterRegistry, TimerId, TimerSample, TimerSnapshot};
pub use request::ClientRequest;
pub use response::{ClientResponse, ExchangeError};
pub use route::{
    CapturingUriTemplateHandler, DefaultUriTemplateHandler, RouteTemplate, UriTemplateHandler,
    UriVariables, route_stack,
};
pub use tags::{Tag, Tags};
