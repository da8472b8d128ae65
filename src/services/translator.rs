use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

/// External model that turns text into text in another language.
#[async_trait]
pub trait TranslationModel: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, ModelError>;
}

/// External model that reads the text printed in an image.
#[async_trait]
pub trait ImageTextReader: Send + Sync {
    async fn read_text(&self, image: &[u8], mime_type: &str) -> Result<String, ModelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ModelError {
    /// Request URLs are dropped so nothing from the endpoint reaches logs or job errors.
    fn from(e: reqwest::Error) -> Self {
        ModelError::Http(e.without_url())
    }
}

/// Ceiling on the wait between two attempts at one fragment.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Knobs for [`FragmentTranslator`].
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    /// Permits shared by every model call in the process.
    pub max_concurrent: usize,
    /// Upper bound on a single model call.
    pub call_timeout: Duration,
    /// Attempts after the first failure.
    pub max_retries: u32,
    /// Retry `n` (counting from 1) waits `retry_base_delay * 2^(n-1)`, capped at [`MAX_BACKOFF`].
    pub retry_base_delay: Duration,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            call_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Outcome of translating one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub text: String,
    /// Set when every attempt failed and `text` is the untranslated input.
    pub degraded: bool,
}

/// Wraps a [`TranslationModel`] with a process-wide concurrency limit,
/// per-call timeouts and bounded retries.
///
/// `translate` never fails. When the model cannot produce a translation the
/// original text comes back with `degraded` set, so one bad fragment cannot
/// abort a document with hundreds of them.
pub struct FragmentTranslator {
    model: Arc<dyn TranslationModel>,
    permits: Arc<Semaphore>,
    settings: TranslatorSettings,
}

impl FragmentTranslator {
    pub fn new(model: Arc<dyn TranslationModel>, settings: TranslatorSettings) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
            model,
            settings,
        }
    }

    pub async fn translate(&self, text: &str, target_lang: &str) -> Translated {
        if text.trim().is_empty() {
            return Translated {
                text: text.to_string(),
                degraded: false,
            };
        }

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                sleep(self.backoff(attempt)).await;
            }

            match self.attempt(text, target_lang).await {
                Ok(translated) => {
                    metrics::counter!("translation_fragments_total").increment(1);
                    return Translated {
                        text: translated,
                        degraded: false,
                    };
                }
                Err(reason) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.settings.max_retries + 1,
                        chars = text.chars().count(),
                        error = %reason,
                        "Fragment translation attempt failed"
                    );
                }
            }
        }

        metrics::counter!("translation_fragments_total").increment(1);
        metrics::counter!("translation_fragments_degraded_total").increment(1);
        tracing::warn!(
            chars = text.chars().count(),
            target_lang = %target_lang,
            "Falling back to original text for fragment"
        );

        Translated {
            text: text.to_string(),
            degraded: true,
        }
    }

    /// Delay before retry `retry` (from 1), doubling each time up to [`MAX_BACKOFF`].
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.settings
            .retry_base_delay
            .saturating_mul(factor)
            .min(MAX_BACKOFF)
    }

    async fn attempt(&self, text: &str, target_lang: &str) -> Result<String, String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| format!("translation limiter closed: {e}"))?;

        match timeout(self.settings.call_timeout, self.model.translate(text, target_lang)).await {
            Ok(Ok(translated)) if translated.trim().is_empty() => {
                Err(ModelError::EmptyResponse.to_string())
            }
            Ok(Ok(translated)) => Ok(translated),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timed out after {}ms",
                self.settings.call_timeout.as_millis()
            )),
        }
    }
}
