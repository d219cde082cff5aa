use crate::error::MetricsError;
use crate::otel;
use crate::provider::HttpTagsProvider;
use crate::registry::{MeterRegistry, TimerId, TimerSample};
use crate::request::ClientRequest;
use crate::response::{ClientResponse, ExchangeError};
use crate::route;
use http::{Request, Response};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// `exception` kind recorded when the exchange was abandoned mid-flight
pub const CANCELLED: &str = "Cancelled";

/// `exception` kind recorded when the delegate panicked
pub const PANICKED: &str = "Panic";

/// State shared by every exchange of one interceptor
pub(crate) struct Instrumentation {
    pub(crate) registry: Arc<dyn MeterRegistry>,
    pub(crate) tags_provider: Arc<dyn HttpTagsProvider>,
    pub(crate) timer: TimerId,
    pub(crate) propagate_trace_context: bool,
}

impl Instrumentation {
    /// Build the request view and start timing the exchange.
    ///
    /// Claims the captured route for `request` and, when enabled, forwards
    /// propagated trace headers to it.
    pub(crate) fn start<B>(self: &Arc<Self>, request: &mut Request<B>) -> ClientObservation {
        let mut view = ClientRequest::from_request(request).with_route(route::resolve(request));
        if self.propagate_trace_context {
            request.headers_mut().extend(otel::propagate(&mut view));
        }

        ClientObservation {
            instrumentation: Arc::clone(self),
            request: view,
            sample: Some(TimerSample::start(Arc::clone(&self.registry))),
        }
    }

    /// Derive tags and record the sample; failures and panics of the provider
    /// or the registry are logged and discarded.
    fn record(&self, sample: TimerSample, response: &ClientResponse<'_>) {
        let provider = &self.tags_provider;
        let tags = catch_unwind(AssertUnwindSafe(|| {
            provider.tags(response.request(), response)
        }))
        .unwrap_or_else(|_| Err(MetricsError::TagDerivation("tags provider panicked".to_owned())));

        let recorded = tags.and_then(|tags| {
            catch_unwind(AssertUnwindSafe(|| sample.stop(&self.timer, &tags)))
                .unwrap_or_else(|_| {
                    Err(MetricsError::Registry("meter registry panicked".to_owned()))
                })
                .map(|elapsed| (tags, elapsed))
        });

        match recorded {
            Ok((tags, elapsed)) => {
                tracing::trace!(
                    metric = self.timer.name(),
                    tags = tags.len(),
                    elapsed = ?elapsed,
                    "Recorded client exchange"
                );
            }
            Err(error) => {
                tracing::info!(
                    target: "modkit_http_metrics",
                    metric = self.timer.name(),
                    %error,
                    "Failed to record metrics"
                );
            }
        }
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("timer", &self.timer)
            .field("propagate_trace_context", &self.propagate_trace_context)
            .finish_non_exhaustive()
    }
}

/// One in-flight exchange: the request view plus its running timer sample.
///
/// Exactly one observation is recorded per exchange. [`ClientObservation::stop`]
/// records the delegate's result; if the observation is dropped first (the
/// delegate panicked or the future was cancelled), `Drop` records it with an
/// absent response.
pub(crate) struct ClientObservation {
    instrumentation: Arc<Instrumentation>,
    request: ClientRequest,
    sample: Option<TimerSample>,
}

impl ClientObservation {
    pub(crate) fn stop<R, E>(mut self, result: &Result<Response<R>, E>)
    where
        E: fmt::Display,
    {
        let Some(sample) = self.sample.take() else {
            return;
        };
        match result {
            Ok(response) => self
                .instrumentation
                .record(sample, &ClientResponse::of(&self.request, response)),
            Err(error) => {
                let error = ExchangeError::from_error(error);
                self.instrumentation
                    .record(sample, &ClientResponse::failed(&self.request, &error));
            }
        }
    }
}

impl Drop for ClientObservation {
    fn drop(&mut self) {
        if let Some(sample) = self.sample.take() {
            let error = if std::thread::panicking() {
                ExchangeError::new(PANICKED, "delegate panicked")
            } else {
                ExchangeError::new(CANCELLED, "exchange dropped before completion")
            };
            self.instrumentation
                .record(sample, &ClientResponse::failed(&self.request, &error));
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::provider::{DefaultHttpTagsProvider, tags_provider_fn};
    use crate::registry::SimpleMeterRegistry;
    use crate::tags::Tags;
    use http::StatusCode;
    use tracing_test::traced_test;

    const TIMER: &str = "http.client.requests";

    fn instrumentation(
        registry: &Arc<SimpleMeterRegistry>,
        provider: Arc<dyn HttpTagsProvider>,
    ) -> Arc<Instrumentation> {
        Arc::new(Instrumentation {
            registry: registry.clone(),
            tags_provider: provider,
            timer: TimerId::new(TIMER),
            propagate_trace_context: false,
        })
    }

    fn get() -> Request<()> {
        Request::builder()
            .uri("https://example.com/hotels/42")
            .body(())
            .unwrap()
    }

    #[test]
    fn test_stop_records_once() {
        let registry = Arc::new(SimpleMeterRegistry::new());
        let instrumentation =
            instrumentation(&registry, Arc::new(DefaultHttpTagsProvider::default()));

        let observation = instrumentation.start(&mut get());
        let result: Result<Response<()>, std::io::Error> = Ok(Response::builder()
            .status(StatusCode::ACCEPTED)
            .body(())
            .unwrap());
        observation.stop(&result);

        assert_eq!(registry.count(TIMER), 1);
        assert!(registry.timer(TIMER, &[("status", "202")]).is_some());
    }

    #[test]
    fn test_drop_records_cancelled_exchange() {
        let registry = Arc::new(SimpleMeterRegistry::new());
        let instrumentation =
            instrumentation(&registry, Arc::new(DefaultHttpTagsProvider::default()));

        drop(instrumentation.start(&mut get()));

        let snapshot = registry.timer(TIMER, &[("exception", CANCELLED)]).unwrap();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.tags.get("status"), Some("CLIENT_ERROR"));
    }

    #[test]
    fn test_panicking_provider_is_contained() {
        let registry = Arc::new(SimpleMeterRegistry::new());
        let provider = tags_provider_fn(|_, _| -> Result<Tags, MetricsError> {
            panic!("provider bug")
        });
        let instrumentation = instrumentation(&registry, Arc::new(provider));

        let observation = instrumentation.start(&mut get());
        let result: Result<Response<()>, std::io::Error> =
            Ok(Response::builder().body(()).unwrap());
        observation.stop(&result);

        assert_eq!(registry.count(TIMER), 0);
    }

    struct PanickingRegistry;

    impl MeterRegistry for PanickingRegistry {
        fn record(&self, _: &TimerId, _: &Tags, _: std::time::Duration) -> Result<(), MetricsError> {
            panic!("registry bug")
        }
    }

    #[test]
    #[traced_test]
    fn test_panicking_registry_is_contained() {
        let instrumentation = Arc::new(Instrumentation {
            registry: Arc::new(PanickingRegistry),
            tags_provider: Arc::new(DefaultHttpTagsProvider::default()),
            timer: TimerId::new(TIMER),
            propagate_trace_context: false,
        });

        let observation = instrumentation.start(&mut get());
        let result: Result<Response<()>, std::io::Error> =
            Err(std::io::Error::other("connection reset"));
        observation.stop(&result);

        assert!(logs_contain("meter registry panicked"));
    }
}
