//! Background execution of translation jobs.
//!
//! Each submitted job gets its own tokio task, detached from the HTTP request
//! that created it. The task drives the job through
//! `pending -> processing -> complete | error` and writes every change through
//! the [`JobStore`]. Jobs cannot be cancelled once started.

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::job::{JobProgress, JobResult};
use crate::services::documents::{output_filename, AdapterError, AdapterRegistry, Fragment};
use crate::services::job_store::{JobStore, StoreError};
use crate::services::translator::FragmentTranslator;

/// Knobs for [`JobRunner`].
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Fragments of one job translated at the same time.
    pub fragment_concurrency: usize,
    /// Watchdog bound on a whole job.
    pub job_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            fragment_concurrency: 4,
            job_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Inputs captured at submission time.
#[derive(Debug, Clone)]
pub struct JobInput {
    pub bytes: Bytes,
    pub filename: String,
    pub target_lang: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("job store rejected update: {0}")]
    Store(#[from] StoreError),

    #[error("translation did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("internal error while processing the document")]
    Crashed,
}

pub struct JobRunner {
    store: Arc<dyn JobStore>,
    translator: Arc<FragmentTranslator>,
    adapters: Arc<AdapterRegistry>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        translator: Arc<FragmentTranslator>,
        adapters: AdapterRegistry,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            store,
            translator,
            adapters: Arc::new(adapters),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn translator(&self) -> &Arc<FragmentTranslator> {
        &self.translator
    }

    /// Run the job in the background. The returned handle may be dropped;
    /// the job keeps running and reports through the store.
    pub fn spawn(self: &Arc<Self>, job_id: Uuid, input: JobInput) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move { runner.supervise(job_id, input).await })
    }

    async fn supervise(self: Arc<Self>, job_id: Uuid, input: JobInput) {
        let started = Instant::now();

        if let Err(e) = self.store.update(job_id, Box::new(|job| job.start())).await {
            tracing::error!(job_id = %job_id, error = %e, "Could not start translation job");
            return;
        }

        tracing::info!(
            job_id = %job_id,
            filename = %input.filename,
            target_lang = %input.target_lang,
            bytes = input.bytes.len(),
            "Processing translation job"
        );

        // The pipeline runs in its own task so a panic surfaces as a JoinError
        // here instead of leaving the job stuck in `processing`.
        let job_timeout = self.settings.job_timeout;
        let pipeline = {
            let runner = Arc::clone(&self);
            tokio::spawn(async move {
                tokio::time::timeout(job_timeout, runner.run_pipeline(job_id, input)).await
            })
        };

        let outcome = match pipeline.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(PipelineError::TimedOut(job_timeout)),
            Err(join_error) => {
                tracing::error!(job_id = %job_id, error = %join_error, "Translation task crashed");
                Err(PipelineError::Crashed)
            }
        };

        let elapsed = started.elapsed();
        metrics::histogram!("translation_job_seconds").record(elapsed.as_secs_f64());

        match outcome {
            Ok(result) => {
                let filename = result.filename.clone();
                let size = result.bytes.len();
                match self
                    .store
                    .update(job_id, Box::new(move |job| job.complete(result)))
                    .await
                {
                    Ok(_) => {
                        metrics::counter!("translation_jobs_completed_total").increment(1);
                        tracing::info!(
                            job_id = %job_id,
                            result_filename = %filename,
                            bytes = size,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Translation job complete"
                        );
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "Could not store job result");
                    }
                }
            }
            Err(e) => {
                let message = e.to_string();
                metrics::counter!("translation_jobs_failed_total").increment(1);
                tracing::error!(
                    job_id = %job_id,
                    error = %message,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Translation job failed"
                );
                if let Err(e) = self
                    .store
                    .update(job_id, Box::new(move |job| job.fail(message)))
                    .await
                {
                    tracing::error!(job_id = %job_id, error = %e, "Could not record job failure");
                }
            }
        }
    }

    /// extract -> translate -> rebuild.
    async fn run_pipeline(&self, job_id: Uuid, input: JobInput) -> Result<JobResult, PipelineError> {
        let adapter = self.adapters.for_filename(&input.filename)?;
        let fragments = adapter.extract(&input.bytes).await?;

        let translated = self
            .translate_fragments(job_id, fragments, &input.target_lang)
            .await?;

        let source = input.bytes.clone();
        let output = adapter.output();
        let bytes = tokio::task::spawn_blocking(move || adapter.rebuild(&source, &translated))
            .await
            .map_err(|_| PipelineError::Crashed)??;

        Ok(JobResult {
            bytes: Bytes::from(bytes),
            filename: output_filename(&input.filename, output),
            mime_type: output.mime_type.to_string(),
        })
    }

    /// Translate every non-blank fragment with bounded concurrency and write
    /// each result back to its original index. Blank fragments pass through.
    async fn translate_fragments(
        &self,
        job_id: Uuid,
        fragments: Vec<Fragment>,
        target_lang: &str,
    ) -> Result<Vec<Fragment>, PipelineError> {
        let mut progress = JobProgress {
            total: fragments.iter().filter(|f| f.is_translatable()).count(),
            ..JobProgress::default()
        };
        self.store
            .update(job_id, Box::new(move |job| job.record_progress(progress)))
            .await?;

        tracing::debug!(job_id = %job_id, fragments = progress.total, "Translating fragments");

        let mut output = fragments.clone();
        let target_lang = target_lang.to_string();
        let mut finished = stream::iter(fragments.into_iter().filter(Fragment::is_translatable))
            .map(|fragment| {
                let translator = Arc::clone(&self.translator);
                let target_lang = target_lang.clone();
                async move {
                    let translated = translator.translate(&fragment.text, &target_lang).await;
                    (fragment.index, translated)
                }
            })
            .buffer_unordered(self.settings.fragment_concurrency.max(1));

        while let Some((index, translated)) = finished.next().await {
            progress.done += 1;
            if translated.degraded {
                progress.degraded += 1;
            }
            output[index].text = translated.text;

            let snapshot = progress;
            self.store
                .update(job_id, Box::new(move |job| job.record_progress(snapshot)))
                .await?;
        }

        if progress.degraded > 0 {
            tracing::warn!(
                job_id = %job_id,
                degraded = progress.degraded,
                fragments = progress.total,
                "Some fragments were left untranslated"
            );
        }

        Ok(output)
    }
}
