use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

// ---------------------------------------------------------------------------
// Metrics catalog
// ---------------------------------------------------------------------------

/// Register all metric descriptors at startup.
///
/// Must be called once before any metrics are recorded so the Prometheus
/// exposition carries descriptions.
pub fn describe_all_metrics() {
    // -- Stream delivery --
    describe_counter!(
        "mediagate_stream_requests_total",
        "Stream requests by response status"
    );
    describe_counter!(
        "mediagate_stream_bytes_sent_total",
        "Total media bytes handed to response bodies"
    );
    describe_histogram!(
        "mediagate_stream_request_duration_seconds",
        "Stream request handling time (excluding body transfer)"
    );

    // -- Tokens --
    describe_counter!(
        "mediagate_tokens_issued_total",
        "Signed stream URLs issued"
    );
    describe_counter!(
        "mediagate_token_rejections_total",
        "Stream token rejections by reason"
    );

    // -- Views and rate limiting --
    describe_counter!("mediagate_views_recorded_total", "View-log entries written");
    describe_counter!(
        "mediagate_rate_limited_total",
        "Requests denied by the per-(media, client) rate limiter"
    );
    describe_gauge!(
        "mediagate_rate_limiter_windows",
        "Rate-limiter windows currently tracked"
    );

    // -- Analytics cache --
    describe_counter!(
        "mediagate_analytics_requests_total",
        "Analytics reads by cache outcome"
    );
    describe_gauge!(
        "mediagate_analytics_cache_entries",
        "Analytics cache entries currently held"
    );

    // -- Uploads --
    describe_counter!("mediagate_uploads_total", "Uploaded files stored");
    describe_histogram!("mediagate_upload_size_bytes", "Uploaded file size");

    // -- Process --
    describe_gauge!("mediagate_uptime_seconds", "Process uptime");
    describe_counter!("mediagate_panic_total", "Panics caught by the panic hook");
}

// ---------------------------------------------------------------------------
// Recording helpers
// ---------------------------------------------------------------------------

pub fn inc_stream_request(status: u16) {
    counter!("mediagate_stream_requests_total", "status" => status.to_string()).increment(1);
}

pub fn add_stream_bytes_sent(bytes: u64) {
    counter!("mediagate_stream_bytes_sent_total").increment(bytes);
}

pub fn record_stream_request_duration(seconds: f64) {
    histogram!("mediagate_stream_request_duration_seconds").record(seconds);
}

pub fn inc_token_issued() {
    counter!("mediagate_tokens_issued_total").increment(1);
}

pub fn inc_token_rejected(reason: &'static str) {
    counter!("mediagate_token_rejections_total", "reason" => reason).increment(1);
}

pub fn inc_view_recorded() {
    counter!("mediagate_views_recorded_total").increment(1);
}

pub fn inc_rate_limited(endpoint: &'static str) {
    counter!("mediagate_rate_limited_total", "endpoint" => endpoint).increment(1);
}

pub fn set_rate_limiter_windows(count: f64) {
    gauge!("mediagate_rate_limiter_windows").set(count);
}

pub fn inc_analytics_request(cache_status: &'static str) {
    counter!("mediagate_analytics_requests_total", "cache" => cache_status).increment(1);
}

pub fn set_analytics_cache_entries(count: f64) {
    gauge!("mediagate_analytics_cache_entries").set(count);
}

pub fn inc_upload() {
    counter!("mediagate_uploads_total").increment(1);
}

pub fn record_upload_size(bytes: f64) {
    histogram!("mediagate_upload_size_bytes").record(bytes);
}

pub fn inc_panic_total() {
    counter!("mediagate_panic_total").increment(1);
}

// ---------------------------------------------------------------------------
// Recorder and background tasks
// ---------------------------------------------------------------------------

/// Install the Prometheus recorder. Must happen before any metric is
/// recorded; the returned handle renders the /metrics exposition.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder")
}

/// Refresh the uptime gauge every 10 seconds until cancelled.
pub async fn run_uptime_task(start_time: Instant, cancel: CancellationToken) {
    let interval = std::time::Duration::from_secs(10);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("uptime task shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {
                gauge!("mediagate_uptime_seconds").set(start_time.elapsed().as_secs_f64());
            }
        }
    }
}
