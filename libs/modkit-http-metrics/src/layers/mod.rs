//! Tower layers for HTTP client middleware
//!
//! ## Available Layers
//!
//! - [`MetricsLayer`] - Records one timer observation per outbound request

mod metrics;

pub use metrics::{MetricsLayer, MetricsService};
