//! Test helper utilities: mock models, an in-process app and request builders.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tower::ServiceExt;
use uuid::Uuid;

use doc_translate_hw::app_state::{AppState, Backend};
use doc_translate_hw::routes::api_router;
use doc_translate_hw::services::documents::AdapterRegistry;
use doc_translate_hw::services::job_store::{InMemoryJobStore, JobStore};
use doc_translate_hw::services::runner::{JobRunner, RunnerSettings};
use doc_translate_hw::services::translator::{
    FragmentTranslator, ImageTextReader, ModelError, TranslationModel, TranslatorSettings,
};

pub const MAX_UPLOAD: usize = 5 * 1024 * 1024;
pub const MAX_PART_BYTES: u64 = 1024 * 1024;
const BOUNDARY: &str = "X-DOC-TRANSLATE-BOUNDARY";

/// Prefixes text with the target language after an optional delay.
pub struct TaggingModel {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl TaggingModel {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationModel for TaggingModel {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.delay).await;
        Ok(format!("[{target_lang}] {text}"))
    }
}

/// Returns its input unchanged.
pub struct IdentityModel;

#[async_trait]
impl TranslationModel for IdentityModel {
    async fn translate(&self, text: &str, _target_lang: &str) -> Result<String, ModelError> {
        Ok(text.to_string())
    }
}

/// Every call fails.
pub struct FailingModel;

#[async_trait]
impl TranslationModel for FailingModel {
    async fn translate(&self, _text: &str, _target_lang: &str) -> Result<String, ModelError> {
        Err(ModelError::Api {
            status: 500,
            message: "model exploded".to_string(),
        })
    }
}

/// Vision stand-in that "reads" a fixed text from any image.
pub struct StaticReader(pub &'static str);

#[async_trait]
impl ImageTextReader for StaticReader {
    async fn read_text(&self, _image: &[u8], _mime_type: &str) -> Result<String, ModelError> {
        Ok(self.0.to_string())
    }
}

pub fn fast_translator_settings() -> TranslatorSettings {
    TranslatorSettings {
        max_concurrent: 64,
        call_timeout: Duration::from_secs(5),
        max_retries: 1,
        retry_base_delay: Duration::from_millis(1),
    }
}

/// In-process app wired to `model`, with a fresh job store.
pub fn test_app(model: Arc<dyn TranslationModel>) -> (Router, AppState) {
    test_app_with_part_limit(model, MAX_PART_BYTES)
}

/// Like [`test_app`], with a custom cap on decompressed document parts.
pub fn test_app_with_part_limit(
    model: Arc<dyn TranslationModel>,
    max_part_bytes: u64,
) -> (Router, AppState) {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let translator = Arc::new(FragmentTranslator::new(model, fast_translator_settings()));
    let adapters = AdapterRegistry::with_defaults(
        Arc::new(StaticReader("OPEN DAILY\n\nFresh bread")),
        max_part_bytes,
    );
    let runner = Arc::new(JobRunner::new(
        store,
        translator,
        adapters,
        RunnerSettings {
            fragment_concurrency: 4,
            job_timeout: Duration::from_secs(30),
        },
    ));
    let state = AppState::with_runner(runner, "English");
    (api_router(state.clone(), MAX_UPLOAD), state)
}

/// App whose translation backend failed to initialize.
pub fn unavailable_app() -> (Router, AppState) {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let state = AppState::new(
        store,
        Backend::Unavailable(Arc::from(
            "translation service is not configured: GEMINI_API_KEY is missing or empty",
        )),
        "English",
    );
    (api_router(state.clone(), MAX_UPLOAD), state)
}

/// Multipart body with an optional file part and an optional target_lang part.
pub fn multipart_request(file: Option<(&str, &[u8])>, target_lang: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(lang) = target_lang {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"target_lang\"\r\n\r\n{lang}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/translate-file")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

pub async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = send(app, request).await;
    let value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

/// Submit a file and return the new job id.
pub async fn submit(app: &Router, filename: &str, data: &[u8], target_lang: &str) -> Uuid {
    let (status, body) = send_json(
        app,
        multipart_request(Some((filename, data)), Some(target_lang)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "submit failed: {body}");
    assert_eq!(body["status"], "pending");
    body["job_id"].as_str().unwrap().parse().unwrap()
}

/// Poll `/status` until the job is terminal. Returns the final body and every status seen.
pub async fn poll_until_terminal(app: &Router, job_id: Uuid) -> (serde_json::Value, Vec<String>) {
    let mut seen = Vec::new();
    for _ in 0..1000 {
        let (status, body) = send_json(app, get(&format!("/status/{job_id}"))).await;
        assert_eq!(status, StatusCode::OK, "status failed: {body}");
        let current = body["status"].as_str().unwrap().to_string();
        if seen.last() != Some(&current) {
            seen.push(current.clone());
        }
        if current == "complete" || current == "error" {
            return (body, seen);
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} did not finish; statuses seen: {seen:?}");
}

/// Rank used to check that observed statuses only move forward.
pub fn status_rank(status: &str) -> u8 {
    match status {
        "pending" => 0,
        "processing" => 1,
        "complete" | "error" => 2,
        other => panic!("unknown status {other}"),
    }
}
