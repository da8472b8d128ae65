use serde::Deserialize;
use std::time::Duration;

use crate::services::runner::RunnerSettings;
use crate::services::translator::TranslatorSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Gemini API key. When missing the server still starts, but translation
    /// endpoints answer 503.
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Language used when a request does not name one.
    #[serde(default = "default_target_lang")]
    pub default_target_lang: String,

    /// Model calls allowed in flight across the whole process.
    #[serde(default = "default_max_concurrent_translations")]
    pub max_concurrent_translations: usize,

    /// Fragments of a single job translated in parallel.
    #[serde(default = "default_job_fragment_concurrency")]
    pub job_fragment_concurrency: usize,

    #[serde(default = "default_fragment_timeout_secs")]
    pub fragment_timeout_secs: u64,

    #[serde(default = "default_fragment_max_retries")]
    pub fragment_max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Watchdog bound on one job, extraction to rebuild.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Finished jobs are evicted this long after their last update.
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Upload size limit in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Decompressed size limit for one XML part of a docx or pptx upload.
    #[serde(default = "default_max_part_bytes")]
    pub max_part_bytes: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-pro-latest".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_target_lang() -> String {
    "English".to_string()
}

fn default_max_concurrent_translations() -> usize {
    8
}

fn default_job_fragment_concurrency() -> usize {
    4
}

fn default_fragment_timeout_secs() -> u64 {
    60
}

fn default_fragment_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_job_timeout_secs() -> u64 {
    30 * 60
}

fn default_job_ttl_secs() -> u64 {
    60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_part_bytes() -> u64 {
    64 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// The API key, treating an empty value as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn translator_settings(&self) -> TranslatorSettings {
        TranslatorSettings {
            max_concurrent: self.max_concurrent_translations,
            call_timeout: Duration::from_secs(self.fragment_timeout_secs),
            max_retries: self.fragment_max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            fragment_concurrency: self.job_fragment_concurrency,
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> AppConfig {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.default_target_lang, "English");
        assert!(config.api_key().is_none());
        assert_eq!(config.runner_settings().fragment_concurrency, 4);
        assert_eq!(config.translator_settings().max_retries, 2);
        assert_eq!(config.max_part_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let config = from_pairs(&[("GEMINI_API_KEY", "   ")]);
        assert!(config.api_key().is_none());

        let config = from_pairs(&[("GEMINI_API_KEY", "abc123"), ("JOB_TTL_SECS", "5")]);
        assert_eq!(config.api_key(), Some("abc123"));
        assert_eq!(config.job_ttl(), Duration::from_secs(5));
    }
}
