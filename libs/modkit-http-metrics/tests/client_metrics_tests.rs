#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests for client exchange metrics
//!
//! These tests verify that:
//! - Every exchange produces exactly one observation with the default tags
//! - Captured route templates become the `uri` tag
//! - Nested and concurrent exchanges never see each other's routes
//! - No captured route outlives the exchange that follows it
//! - The tower layer and the synchronous interceptor agree on tagging

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use modkit_http_metrics::{
    CapturingUriTemplateHandler, ClientMetricsBuilder, ClientMetricsConfig,
    DefaultUriTemplateHandler, MetricsInterceptor, MetricsLayer, RouteTemplate,
    SimpleMeterRegistry, Tags, UriTemplateHandler, UriVariables, route_stack, tags_provider_fn,
};
use tower::{Layer, ServiceExt, service_fn};

const TIMER: &str = "http.client.requests";
const HOTEL_BOOKING: &str = "https://example.com/hotels/{hotel}/bookings/{booking}";

#[derive(Debug)]
struct TransportError;

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("transport failed")
    }
}

fn respond(status: StatusCode) -> Result<Response<String>, TransportError> {
    Ok(Response::builder()
        .status(status)
        .body("OK".to_owned())
        .unwrap())
}

fn capturing() -> CapturingUriTemplateHandler<DefaultUriTemplateHandler> {
    CapturingUriTemplateHandler::new(DefaultUriTemplateHandler)
}

#[test]
fn get_without_template_is_tagged_unknown() {
    let registry = Arc::new(SimpleMeterRegistry::new());
    let interceptor = MetricsInterceptor::new(registry.clone());

    let request = Request::builder()
        .method(Method::GET)
        .uri("https://example.com/hotels/42/bookings/21")
        .body(())
        .unwrap();
    let response = interceptor
        .intercept(request, |_| respond(StatusCode::OK))
        .unwrap();

    assert_eq!(response.body(), "OK");
    let snapshot = registry
        .timer(
            TIMER,
            &[
                ("method", "GET"),
                ("uri", "UNKNOWN"),
                ("status", "200"),
                ("outcome", "SUCCESS"),
                ("exception", "None"),
            ],
        )
        .expect("default tags");
    assert_eq!(snapshot.count, 1);
    assert_eq!(snapshot.tags.len(), 5);
}

#[test]
fn captured_template_becomes_uri_tag() {
    route_stack::clear();
    let registry = Arc::new(SimpleMeterRegistry::new());
    let interceptor = MetricsInterceptor::new(registry.clone());

    let uri = capturing()
        .expand(HOTEL_BOOKING, &UriVariables::Positional(&["42", "21"]))
        .unwrap();
    let request = Request::builder().uri(uri).body(()).unwrap();
    interceptor
        .intercept(request, |_| respond(StatusCode::OK))
        .unwrap();

    assert!(
        registry
            .timer(TIMER, &[("uri", "/hotels/{hotel}/bookings/{booking}")])
            .is_some()
    );
    assert_eq!(route_stack::depth(), 0);
}

#[test]
fn nested_exchanges_keep_their_own_routes() {
    route_stack::clear();
    let registry = Arc::new(SimpleMeterRegistry::new());
    let interceptor = MetricsInterceptor::new(registry.clone());
    let handler = capturing();

    let outer_uri = handler
        .expand("/test/{id}", &UriVariables::Positional(&["123"]))
        .unwrap();
    let outer = Request::builder().uri(outer_uri).body(()).unwrap();

    interceptor
        .intercept(outer, |_| {
            let nested_uri = handler
                .expand(
                    "/nestedTest/{nestedId}",
                    &UriVariables::Named(&[("nestedId", "124")]),
                )
                .unwrap();
            let nested = Request::builder().uri(nested_uri).body(()).unwrap();
            interceptor.intercept(nested, |_| respond(StatusCode::NOT_FOUND))?;
            respond(StatusCode::OK)
        })
        .unwrap();

    let outer = registry.timer(TIMER, &[("uri", "/test/{id}")]).unwrap();
    assert_eq!(outer.tags.get("status"), Some("200"));
    let nested = registry
        .timer(TIMER, &[("uri", "/nestedTest/{nestedId}")])
        .unwrap();
    assert_eq!(nested.tags.get("outcome"), Some("CLIENT_ERROR"));
    assert_eq!(registry.count(TIMER), 2);
    assert_eq!(route_stack::depth(), 0);
}

#[test]
fn concurrent_threads_do_not_share_routes() {
    let registry = Arc::new(SimpleMeterRegistry::new());
    let interceptor = MetricsInterceptor::new(registry.clone());

    std::thread::scope(|scope| {
        for i in 0..8 {
            let interceptor = interceptor.clone();
            scope.spawn(move || {
                let handler = capturing();
                let template = format!("/service{i}/items/{{item}}");
                for item in 0..10 {
                    let item = item.to_string();
                    let uri = handler
                        .expand(&template, &UriVariables::Positional(&[item.as_str()]))
                        .unwrap();
                    let request = Request::builder().uri(uri).body(()).unwrap();
                    interceptor
                        .intercept(request, |_| respond(StatusCode::OK))
                        .unwrap();
                }
                assert_eq!(route_stack::depth(), 0);
            });
        }
    });

    for i in 0..8 {
        let route = format!("/service{i}/items/{{item}}");
        let snapshot = registry.timer(TIMER, &[("uri", route.as_str())]).unwrap();
        assert_eq!(snapshot.count, 10);
    }
    assert_eq!(registry.count(TIMER), 80);
}

#[test]
fn explicit_route_still_consumes_captured_entry() {
    route_stack::clear();
    let registry = Arc::new(SimpleMeterRegistry::new());
    let interceptor = MetricsInterceptor::new(registry.clone());
    let handler = capturing();

    for id in 0..100 {
        let id = id.to_string();
        let uri = handler
            .expand("/items/{id}", &UriVariables::Positional(&[id.as_str()]))
            .unwrap();
        let mut request = Request::builder().uri(uri).body(()).unwrap();
        RouteTemplate::new("/explicit/items/{id}").attach(&mut request);
        interceptor
            .intercept(request, |_| respond(StatusCode::OK))
            .unwrap();
        assert_eq!(route_stack::depth(), 0);
    }

    let snapshot = registry
        .timer(TIMER, &[("uri", "/explicit/items/{id}")])
        .unwrap();
    assert_eq!(snapshot.count, 100);
}

#[test]
fn request_uri_differing_from_expansion_leaves_no_entry() {
    route_stack::clear();
    let registry = Arc::new(SimpleMeterRegistry::new());
    let interceptor = MetricsInterceptor::new(registry.clone());
    let handler = capturing();

    handler
        .expand("https://example.com/a/{id}", &UriVariables::Positional(&["7"]))
        .unwrap();
    let paged = Request::builder()
        .uri("https://example.com/a/7?page=2")
        .body(())
        .unwrap();
    interceptor
        .intercept(paged, |_| respond(StatusCode::OK))
        .unwrap();
    assert!(registry.timer(TIMER, &[("uri", "/a/{id}")]).is_some());
    assert_eq!(route_stack::depth(), 0);

    handler
        .expand("https://example.com/b/{id}", &UriVariables::Positional(&["8"]))
        .unwrap();
    let elsewhere = Request::builder()
        .uri("https://other.example.com/c/9")
        .body(())
        .unwrap();
    interceptor
        .intercept(elsewhere, |_| respond(StatusCode::OK))
        .unwrap();
    assert!(registry.timer(TIMER, &[("uri", "UNKNOWN")]).is_some());
    assert_eq!(route_stack::depth(), 0);
}

#[test]
fn failed_exchange_is_recorded_and_error_returned() {
    let registry = Arc::new(SimpleMeterRegistry::new());
    let interceptor = MetricsInterceptor::new(registry.clone());

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("https://example.com/hotels/1")
        .body(())
        .unwrap();
    let err = interceptor
        .intercept(request, |_| -> Result<Response<String>, _> {
            Err(TransportError)
        })
        .unwrap_err();

    assert_eq!(err.to_string(), "transport failed");
    let snapshot = registry
        .timer(
            TIMER,
            &[
                ("method", "DELETE"),
                ("status", "CLIENT_ERROR"),
                ("outcome", "UNKNOWN"),
                ("exception", "TransportError"),
            ],
        )
        .unwrap();
    assert_eq!(snapshot.count, 1);
}

#[tokio::test]
async fn layer_with_explicit_route_and_config() {
    let registry = Arc::new(SimpleMeterRegistry::new());
    let config: ClientMetricsConfig = serde_json::from_value(serde_json::json!({
        "metric_name": "outbound.requests",
        "unknown_uri": "none"
    }))
    .unwrap();
    let layer = ClientMetricsBuilder::new(registry.clone())
        .config(config)
        .build_layer()
        .unwrap();
    let service = layer.layer(service_fn(|_req: Request<Full<Bytes>>| async {
        Ok::<_, Infallible>(
            Response::builder()
                .status(StatusCode::MOVED_PERMANENTLY)
                .body(Full::new(Bytes::new()))
                .unwrap(),
        )
    }));

    let (uri, route) = capturing()
        .expand_request(HOTEL_BOOKING, &UriVariables::Positional(&["42", "21"]))
        .unwrap();
    let mut request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap();
    route.attach(&mut request);

    let response = service.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);

    let unrouted = Request::builder()
        .uri("https://example.com/health")
        .body(Full::new(Bytes::new()))
        .unwrap();
    service.oneshot(unrouted).await.unwrap();

    let routed = registry
        .timer(
            "outbound.requests",
            &[
                ("method", "PUT"),
                ("uri", "/hotels/{hotel}/bookings/{booking}"),
                ("outcome", "REDIRECTION"),
            ],
        )
        .unwrap();
    assert_eq!(routed.count, 1);
    assert!(
        registry
            .timer("outbound.requests", &[("uri", "none")])
            .is_some()
    );
    assert_eq!(registry.count(TIMER), 0);
}

#[tokio::test]
async fn layer_with_custom_provider() {
    let registry = Arc::new(SimpleMeterRegistry::new());
    let layer = MetricsLayer::with_tags_provider(
        registry.clone(),
        tags_provider_fn(|request, response| {
            Ok(Tags::of([
                ("host", request.uri().host().unwrap_or("none").to_owned()),
                ("status", response.status_code().to_string()),
            ]))
        }),
    );
    let service = layer.layer(service_fn(|_req: Request<Full<Bytes>>| async {
        Ok::<_, Infallible>(Response::new(Full::new(Bytes::new())))
    }));

    let request = Request::builder()
        .uri("https://api.example.com/v1/things")
        .body(Full::new(Bytes::new()))
        .unwrap();
    service.oneshot(request).await.unwrap();

    let snapshot = registry
        .timer(TIMER, &[("host", "api.example.com"), ("status", "200")])
        .unwrap();
    assert_eq!(snapshot.tags.len(), 2);
}
