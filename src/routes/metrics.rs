use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::services::job_store::JobStore;

/// State for the scrape endpoint, separate from the API state.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub jobs: Arc<dyn JobStore>,
}

/// Prometheus scrape endpoint in text exposition format.
/// Refreshes the job-store gauge so idle servers still report it.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    metrics::gauge!("translation_jobs_in_store").set(state.jobs.len().await as f64);
    state.handle.render()
}

/// Register descriptions for every metric the service emits.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "translation_jobs_submitted_total",
        "Translation jobs accepted by the submit endpoint"
    );
    metrics::describe_counter!(
        "translation_jobs_completed_total",
        "Translation jobs that produced a document"
    );
    metrics::describe_counter!(
        "translation_jobs_failed_total",
        "Translation jobs that ended in error"
    );
    metrics::describe_counter!(
        "translation_fragments_total",
        "Fragments sent through the translator"
    );
    metrics::describe_counter!(
        "translation_fragments_degraded_total",
        "Fragments left untranslated after every attempt failed"
    );
    metrics::describe_counter!(
        "translation_jobs_evicted_total",
        "Finished jobs removed by the retention sweep"
    );
    metrics::describe_histogram!(
        "translation_job_seconds",
        "Wall time of one translation job"
    );
    metrics::describe_gauge!(
        "translation_jobs_in_store",
        "Jobs currently tracked in the job store"
    );
}
