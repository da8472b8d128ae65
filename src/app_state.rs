use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    documents::AdapterRegistry,
    gemini::GeminiClient,
    job_store::{InMemoryJobStore, JobStore},
    runner::JobRunner,
    translator::FragmentTranslator,
};

/// Whether the translation model could be set up at startup.
#[derive(Clone)]
pub enum Backend {
    Ready(Arc<JobRunner>),
    /// Carries the reason, reported to clients as 503.
    Unavailable(Arc<str>),
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub backend: Backend,
    pub default_target_lang: String,
}

impl AppState {
    pub fn new(jobs: Arc<dyn JobStore>, backend: Backend, default_target_lang: &str) -> Self {
        Self {
            jobs,
            backend,
            default_target_lang: default_target_lang.to_string(),
        }
    }

    /// State whose handlers share the runner's job store.
    pub fn with_runner(runner: Arc<JobRunner>, default_target_lang: &str) -> Self {
        Self::new(
            runner.store().clone(),
            Backend::Ready(runner),
            default_target_lang,
        )
    }

    /// Wire the Gemini client, fragment translator, adapters and runner around
    /// a fresh in-memory job store.
    pub fn from_config(config: &AppConfig) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

        let backend = match config.api_key() {
            None => Backend::Unavailable(Arc::from(
                "translation service is not configured: GEMINI_API_KEY is missing or empty",
            )),
            Some(key) => {
                match GeminiClient::new(key, &config.gemini_model, &config.gemini_base_url) {
                    Ok(client) => {
                        let client = Arc::new(client);
                        let translator = Arc::new(FragmentTranslator::new(
                            client.clone(),
                            config.translator_settings(),
                        ));
                        let adapters = AdapterRegistry::with_defaults(client, config.max_part_bytes);
                        Backend::Ready(Arc::new(JobRunner::new(
                            jobs.clone(),
                            translator,
                            adapters,
                            config.runner_settings(),
                        )))
                    }
                    Err(e) => Backend::Unavailable(Arc::from(format!(
                        "translation service is not configured: {e}"
                    ))),
                }
            }
        };

        if let Backend::Unavailable(reason) = &backend {
            tracing::error!(reason = %reason, "Translation backend unavailable");
        }

        Self::new(jobs, backend, &config.default_target_lang)
    }
}
