//! OpenTelemetry integration
//!
//! - With `otel` feature: trace context is injected into outbound requests
//!   through the request view, and [`OtelMeterRegistry`] exports observations
//!   as an OpenTelemetry histogram
//! - Without `otel` feature: injection is a no-op

use crate::request::ClientRequest;

#[cfg(feature = "otel")]
mod imp {
    use crate::error::MetricsError;
    use crate::registry::{MeterRegistry, TimerId};
    use crate::request::ClientRequest;
    use crate::tags::Tags;
    use dashmap::DashMap;
    use opentelemetry::metrics::{Histogram, Meter};
    use opentelemetry::propagation::Injector;
    use opentelemetry::{Context, KeyValue, global};
    use std::time::Duration;

    /// Adapter for injecting W3C Trace Context through the request view
    struct RequestInjector<'a>(&'a mut ClientRequest);

    impl Injector for RequestInjector<'_> {
        fn set(&mut self, key: &str, value: String) {
            if let Err(error) = self.0.set_header(key, &value) {
                tracing::debug!(header = key, %error, "Skipping trace context header");
            }
        }
    }

    /// Inject the current OpenTelemetry context into the outbound request.
    /// Uses the global propagator.
    pub fn inject_current_context(request: &mut ClientRequest) {
        let cx = Context::current();
        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&cx, &mut RequestInjector(request));
        });
    }

    /// Meter registry that records timers as OpenTelemetry `f64` histograms.
    ///
    /// One histogram (unit `s`) is created per timer name on first use; tags
    /// become attributes.
    pub struct OtelMeterRegistry {
        meter: Meter,
        pub(super) histograms: DashMap<String, Histogram<f64>>,
    }

    impl OtelMeterRegistry {
        #[must_use]
        pub fn new(meter: Meter) -> Self {
            Self {
                meter,
                histograms: DashMap::new(),
            }
        }

        /// Registry backed by the global meter provider
        #[must_use]
        pub fn global(scope: &'static str) -> Self {
            Self::new(global::meter(scope))
        }

        fn histogram(&self, timer: &TimerId) -> Histogram<f64> {
            self.histograms
                .entry(timer.name().to_owned())
                .or_insert_with(|| {
                    let builder = self
                        .meter
                        .f64_histogram(timer.name().to_owned())
                        .with_unit("s");
                    match timer.description() {
                        Some(description) => builder.with_description(description.to_owned()),
                        None => builder,
                    }
                    .build()
                })
                .clone()
        }
    }

    impl MeterRegistry for OtelMeterRegistry {
        fn record(
            &self,
            timer: &TimerId,
            tags: &Tags,
            elapsed: Duration,
        ) -> Result<(), MetricsError> {
            let attributes: Vec<KeyValue> = tags
                .iter()
                .map(|tag| KeyValue::new(tag.key().to_owned(), tag.value().to_owned()))
                .collect();
            self.histogram(timer)
                .record(elapsed.as_secs_f64(), &attributes);
            Ok(())
        }
    }
}

#[cfg(not(feature = "otel"))]
mod imp {
    use crate::request::ClientRequest;

    /// No-op: OpenTelemetry is disabled
    pub fn inject_current_context(_request: &mut ClientRequest) {
        // No-op when OTEL is disabled
    }
}

pub use imp::inject_current_context;

#[cfg(feature = "otel")]
pub use imp::OtelMeterRegistry;

/// Inject trace context and return the headers that were added
pub(crate) fn propagate(request: &mut ClientRequest) -> http::HeaderMap {
    inject_current_context(request);
    request.take_injected()
}
