pub mod error;
pub mod health;
pub mod metrics;
pub mod translate;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// All API routes with their middleware. `/metrics` is mounted separately by the binary.
pub fn api_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/translate-file", post(translate::submit_translation))
        .route("/translate-text", post(translate::translate_text))
        .route("/status/{job_id}", get(translate::get_job_status))
        .route("/download/{job_id}", get(translate::download_result))
        .route("/jobs/{job_id}", delete(translate::discard_job))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        // Multipart's own 2 MB default would undercut the configured limit.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
