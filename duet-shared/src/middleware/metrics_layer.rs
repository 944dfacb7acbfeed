use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const REQUESTS_TOTAL: &str = "duet_http_requests_total";
const REQUEST_DURATION: &str = "duet_http_request_duration_seconds";

/// Request counter and latency histogram, labelled by route template.
/// Requests that match no route share one `unmatched` label so raw paths
/// with ids never become label values.
pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("route", route),
        ("status", response.status().as_u16().to_string()),
    ];
    counter!(REQUESTS_TOTAL, &labels).increment(1);
    histogram!(REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());

    response
}

/// Installs the Prometheus recorder and describes the service metrics.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
        )?
        .install_recorder()?;

    describe_counter!(REQUESTS_TOTAL, "HTTP requests by route and status");
    describe_histogram!(REQUEST_DURATION, Unit::Seconds, "HTTP request latency");
    describe_counter!("duet_swipes_total", "Swipes recorded, by direction");
    describe_counter!("duet_matches_total", "Match writes, by outcome");
    describe_counter!("duet_store_conflicts_total", "Transactions that ran out of attempts");

    Ok(handle)
}
