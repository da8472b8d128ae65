use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use garde::Validate;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::sync::Arc;
use uuid::Uuid;

use crate::app_state::{AppState, Backend};
use crate::models::job::{JobStatus, TranslationJob};
use crate::models::translation::{
    JobStatusResponse, SubmitResponse, TextTranslateRequest, TextTranslateResponse,
};
use crate::routes::error::ApiError;
use crate::services::documents::sanitize_filename;
use crate::services::job_store::StoreError;
use crate::services::runner::{JobInput, JobRunner};

fn ready_runner(state: &AppState) -> Result<&Arc<JobRunner>, ApiError> {
    match &state.backend {
        Backend::Ready(runner) => Ok(runner),
        Backend::Unavailable(reason) => Err(ApiError::ServiceUnavailable(reason.to_string())),
    }
}

/// Unknown, evicted and malformed ids all read as "not found".
async fn find_job(state: &AppState, job_id: &str) -> Result<TranslationJob, ApiError> {
    let not_found = || ApiError::NotFound(format!("job not found: {job_id}"));
    let id = Uuid::parse_str(job_id).map_err(|_| not_found())?;
    state.jobs.get(id).await.ok_or_else(not_found)
}

/// POST /translate-file: upload a document and start a translation job.
///
/// Returns as soon as the job is recorded; translation runs in the background.
pub async fn submit_translation(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    // Checked before reading the upload so a misconfigured server never creates jobs.
    let runner = ready_runner(&state)?.clone();

    let mut file: Option<(String, Bytes)> = None;
    let mut target_lang: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(sanitize_filename).unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {e}")))?;
                file = Some((filename, data));
            }
            Some("target_lang") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read target_lang: {e}")))?;
                let value = value.trim();
                if !value.is_empty() {
                    target_lang = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::BadRequest("no file found in the request".to_string()))?;
    if filename.is_empty() {
        return Err(ApiError::BadRequest("no file was selected".to_string()));
    }
    if data.is_empty() {
        return Err(ApiError::BadRequest("the uploaded file is empty".to_string()));
    }
    let target_lang = target_lang.unwrap_or_else(|| state.default_target_lang.clone());

    let job_id = state.jobs.create(&filename, &target_lang).await;
    metrics::counter!("translation_jobs_submitted_total").increment(1);
    metrics::gauge!("translation_jobs_in_store").set(state.jobs.len().await as f64);

    tracing::info!(
        job_id = %job_id,
        filename = %filename,
        target_lang = %target_lang,
        bytes = data.len(),
        "Translation job submitted"
    );

    // Detached: the job reports its outcome through the store.
    let _detached = runner.spawn(
        job_id,
        JobInput {
            bytes: data,
            filename,
            target_lang,
        },
    );

    Ok(Json(SubmitResponse {
        job_id,
        status: JobStatus::Pending,
    }))
}

/// GET /status/{job_id}: current status, progress and failure reason.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = find_job(&state, &job_id).await?;
    Ok(Json(JobStatusResponse::from(&job)))
}

/// GET /download/{job_id}: the translated file, once the job is complete.
///
/// Downloading does not evict the job; expired jobs are removed by the sweeper.
pub async fn download_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job = find_job(&state, &job_id).await?;

    let result = match (job.status, job.result) {
        (JobStatus::Complete, Some(result)) => result,
        (JobStatus::Error, _) => {
            return Err(ApiError::Conflict(format!(
                "job failed: {}",
                job.error.unwrap_or_default()
            )))
        }
        (status, _) => {
            return Err(ApiError::Conflict(format!("job is not complete yet ({status})")))
        }
    };

    tracing::info!(
        job_id = %job.id,
        result_filename = %result.filename,
        bytes = result.bytes.len(),
        "Serving translated document"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.mime_type.as_str())
        .header(header::CONTENT_DISPOSITION, content_disposition(&result.filename))
        .body(Body::from(result.bytes))
        .map_err(|e| ApiError::Internal(format!("failed to build download response: {e}")))
}

/// DELETE /jobs/{job_id}: discard a finished job before it expires.
pub async fn discard_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::NotFound(format!("job not found: {job_id}")))?;

    match state.jobs.delete_terminal(id).await {
        Ok(_) => {
            metrics::gauge!("translation_jobs_in_store").set(state.jobs.len().await as f64);
            tracing::info!(job_id = %id, "Translation job discarded");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(StoreError::NotFound(_)) => Err(ApiError::NotFound(format!("job not found: {job_id}"))),
        Err(e @ StoreError::Busy { .. }) => Err(ApiError::Conflict(e.to_string())),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

/// POST /translate-text: translate a text snippet within the request.
pub async fn translate_text(
    State(state): State<AppState>,
    body: Result<Json<TextTranslateRequest>, JsonRejection>,
) -> Result<Json<TextTranslateResponse>, ApiError> {
    let runner = ready_runner(&state)?;

    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("no text was provided".to_string()));
    }
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let target_lang = request
        .target_lang
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(&state.default_target_lang);

    let translated = runner.translator().translate(&request.text, target_lang).await;

    Ok(Json(TextTranslateResponse {
        translated_text: translated.text,
        degraded: translated.degraded,
    }))
}

/// `attachment` disposition with an ASCII fallback and the UTF-8 name (RFC 6266).
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        utf8_percent_encode(filename, NON_ALPHANUMERIC)
    )
}
