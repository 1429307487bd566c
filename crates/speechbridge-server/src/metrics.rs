//! Prometheus metrics recording and endpoint.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use speechbridge_pipeline::StageTimings;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Middleware counting requests per matched route and status.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();
    let response = next.run(request).await;
    record_request(
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Record an HTTP request with its duration.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels).record(duration_secs);
}

/// Record per-stage latency of a pipeline run.
pub fn record_stages(timings: &StageTimings) {
    if let Some(ms) = timings.transcribe_ms {
        metrics::histogram!("pipeline_stage_seconds", "stage" => "transcribe")
            .record(ms as f64 / 1000.0);
    }
    metrics::histogram!("pipeline_stage_seconds", "stage" => "translate")
        .record(timings.translate_ms as f64 / 1000.0);
    metrics::histogram!("pipeline_stage_seconds", "stage" => "synthesize")
        .record(timings.synthesize_ms as f64 / 1000.0);
    metrics::counter!("pipeline_runs_total").increment(1);
}

/// Record an error response by status code.
pub fn record_error(status: &str) {
    let labels = [("status", status.to_string())];
    metrics::counter!("http_errors_total", &labels).increment(1);
}
