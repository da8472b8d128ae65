use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use doc_translate_hw::{
    app_state::AppState,
    config::AppConfig,
    routes::{self, metrics::MetricsState},
    services::retention,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing doc-translate-hw server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    routes::metrics::describe_metrics();

    // A missing API key leaves the server up; translation endpoints answer 503.
    let state = AppState::from_config(&config);

    let _sweeper = retention::spawn_sweeper(
        state.jobs.clone(),
        config.job_ttl(),
        config.sweep_interval(),
    );

    let metrics_state = MetricsState {
        handle: Arc::new(prometheus_handle),
        jobs: state.jobs.clone(),
    };

    let app = routes::api_router(state, config.max_upload_bytes).merge(
        Router::new()
            .route("/metrics", get(routes::metrics::prometheus_metrics))
            .with_state(metrics_state),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, in-flight jobs are abandoned");
}
