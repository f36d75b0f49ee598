//! Wraps a simulator router with `/metrics` and per-request tracking

use std::time::Instant;

use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{Instrument, info, info_span};

use crate::metrics;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_app(simulator: Router, prometheus: PrometheusHandle) -> Router {
    simulator
        .route(
            "/metrics",
            get(move || {
                let prometheus = prometheus.clone();
                async move { metrics_handler(&prometheus) }
            }),
        )
        .route_layer(middleware::from_fn(track_request))
}

fn metrics_handler(prometheus: &PrometheusHandle) -> Response {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        prometheus.render(),
    )
        .into_response()
}

/// Assigns a `req_<uuid>` id, runs the request inside a span carrying it,
/// and records count and latency per matched route.
async fn track_request(request: Request, next: Next) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        endpoint = %endpoint,
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let elapsed = started.elapsed();
    let status = response.status().as_u16();

    span.in_scope(|| {
        info!(
            status,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "request completed"
        );
    });
    if endpoint != "/metrics" {
        metrics::record_request(&endpoint, status, elapsed.as_secs_f64());
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::isolated_recorder;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use oauth_sim::{ResourceProviderConfig, resource_provider};
    use tower::ServiceExt;

    fn app() -> (Router, PrometheusHandle) {
        let (_recorder, handle) = isolated_recorder();
        let router = resource_provider::router(ResourceProviderConfig::new("T1"));
        (build_app(router, handle.clone()), handle)
    }

    #[tokio::test]
    async fn simulator_routes_get_a_request_id() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("authorization", "Bearer T1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(id.starts_with("req_"), "got: {id}");
        assert_eq!(id.len(), "req_".len() + 32);
    }

    #[tokio::test]
    async fn rejections_keep_their_status() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn requests_are_counted_per_endpoint() {
        let (recorder, handle) = isolated_recorder();
        let _guard = ::metrics::set_default_local_recorder(&recorder);
        let router = resource_provider::router(ResourceProviderConfig::new("T1"));
        let app = build_app(router, handle.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let output = handle.render();
        let line = output
            .lines()
            .find(|l| l.starts_with("oauth_sim_requests_total{"))
            .unwrap_or_default();
        assert!(line.contains("endpoint=\"/ping\""), "got: {output}");
        assert!(line.contains("status=\"401\""), "got: {output}");
        assert!(line.ends_with(" 1"), "got: {output}");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_prometheus_text() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }
}
