use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use uuid::Uuid;

/// Status of a translation job.
///
/// Transitions only move forward:
/// `pending -> processing -> complete | error`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    /// `complete` and `error` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

/// Translated artifact, present only once a job is `complete`.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub bytes: Bytes,
    pub filename: String,
    pub mime_type: String,
}

/// Fragment counters reported while a job is processing.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct JobProgress {
    pub done: usize,
    pub total: usize,
    pub degraded: usize,
}

/// A tracked document translation job.
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub source_filename: String,
    pub target_language: String,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal job transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl TranslationJob {
    pub fn new(source_filename: &str, target_language: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            source_filename: source_filename.to_string(),
            target_language: target_language.to_string(),
            result: None,
            error: None,
            progress: JobProgress::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn advance(&mut self, expected: JobStatus, to: JobStatus) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `pending -> processing`. Only the runner calls this.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.advance(JobStatus::Pending, JobStatus::Processing)
    }

    /// Record fragment counters. Only valid while processing.
    pub fn record_progress(&mut self, progress: JobProgress) -> Result<(), TransitionError> {
        if self.status != JobStatus::Processing {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.progress = progress;
        Ok(())
    }

    /// `processing -> complete`, attaching the artifact in the same step.
    pub fn complete(&mut self, result: JobResult) -> Result<(), TransitionError> {
        self.advance(JobStatus::Processing, JobStatus::Complete)?;
        self.result = Some(result);
        Ok(())
    }

    /// `processing -> error`, attaching the message in the same step.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(JobStatus::Processing, JobStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
