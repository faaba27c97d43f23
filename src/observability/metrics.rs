//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webid_http_requests_total` (counter): requests by method, route, status
//! - `webid_http_request_duration_seconds` (histogram): latency by method, route
//! - `webid_auth_failures_total` (counter): rejected credentials by scheme
//! - `webid_profile_writes_total` (counter): successful writes by operation

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "webid_http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "webid_http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure(scheme: &'static str) {
    counter!("webid_auth_failures_total", "scheme" => scheme).increment(1);
}

pub fn record_profile_write(op: &'static str) {
    counter!("webid_profile_writes_total", "op" => op).increment(1);
}

/// Route-level middleware recording request count and latency.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), &route, start);
    response
}
