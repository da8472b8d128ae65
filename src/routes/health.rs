use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::{AppState, Backend};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub translator: ComponentHealth,
    pub jobs: JobsHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Serialize)]
pub struct JobsHealth {
    pub status: String,
    pub tracked: usize,
}

/// GET /health: translator configuration and job store size.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let translator = match &state.backend {
        Backend::Ready(_) => ComponentHealth {
            status: "ok".to_string(),
            detail: None,
        },
        Backend::Unavailable(reason) => ComponentHealth {
            status: "error".to_string(),
            detail: Some(reason.to_string()),
        },
    };

    let jobs = JobsHealth {
        status: "ok".to_string(),
        tracked: state.jobs.len().await,
    };

    let healthy = translator.status == "ok";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks { translator, jobs },
    };

    (status_code, Json(response))
}
