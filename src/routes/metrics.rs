use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for the pipeline's metrics.
pub fn describe_metrics() {
    metrics::describe_histogram!(
        "detection_processing_seconds",
        "Wall time of one analysis routine run"
    );
    metrics::describe_counter!(
        "detection_jobs_total",
        "Total detection jobs submitted"
    );
    metrics::describe_counter!(
        "detection_jobs_completed",
        "Total detection jobs completed with a verdict"
    );
    metrics::describe_counter!(
        "detection_jobs_failed",
        "Total detection jobs that failed"
    );
    metrics::describe_gauge!(
        "detection_queue_depth",
        "Current number of jobs waiting in the queue"
    );
}

/// Prometheus metrics scrape endpoint.
/// Returns metrics in Prometheus text exposition format.
pub async fn prometheus_metrics(
    axum::extract::State(handle): axum::extract::State<Arc<PrometheusHandle>>,
) -> impl IntoResponse {
    handle.render()
}
