use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{JobProgress, JobStatus, TranslationJob};

/// Body of `POST /translate-text`.
#[derive(Debug, Deserialize, Validate)]
pub struct TextTranslateRequest {
    #[garde(length(min = 1, max = 100_000))]
    pub text: String,

    #[garde(length(max = 64))]
    pub target_lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextTranslateResponse {
    pub translated_text: String,
    /// True when the model could not be reached and the input was echoed back.
    pub degraded: bool,
}

/// Response after submitting a document for translation.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Response for polling a job.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub progress: JobProgress,
}

impl From<&TranslationJob> for JobStatusResponse {
    fn from(job: &TranslationJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            error: job.error.clone(),
            progress: job.progress,
        }
    }
}
