use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::services::translator::{ImageTextReader, ModelError, TranslationModel};

/// Client for the Gemini `generateContent` API.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self, ModelError> {
        if api_key.trim().is_empty() {
            return Err(ModelError::Other("GEMINI_API_KEY is empty".to_string()));
        }
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn generate(&self, parts: Vec<Part<'_>>) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [Content { parts }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        first_text(parsed)
    }
}

/// Prompt asking for a faithful translation and nothing else.
fn translation_prompt(text: &str, target_lang: &str) -> String {
    format!(
        "You are a professional translator. Translate the text below into {target_lang}, \
         keeping its meaning, tone and register. Reply with ONLY the translated text, \
         without explanations or introductory phrases.\n\n\
         Text:\n\"\"\"{text}\"\"\""
    )
}

const IMAGE_TEXT_PROMPT: &str = concat!(
    "Extract all text visible in this image, in reading order. ",
    "Separate distinct blocks with a blank line. ",
    "Reply with ONLY the extracted text."
);

fn first_text(response: GenerateResponse) -> Result<String, ModelError> {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(ModelError::EmptyResponse)
}

/// Re-attach the source's surrounding whitespace, which separates adjacent runs.
fn keep_padding(source: &str, translated: &str) -> String {
    let lead = &source[..source.len() - source.trim_start().len()];
    let trail = &source[source.trim_end().len()..];
    format!("{lead}{translated}{trail}")
}

#[async_trait]
impl TranslationModel for GeminiClient {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, ModelError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let translated = self
            .generate(vec![Part::Text {
                text: translation_prompt(text, target_lang),
            }])
            .await?;
        Ok(keep_padding(text, &translated))
    }
}

#[async_trait]
impl ImageTextReader for GeminiClient {
    async fn read_text(&self, image: &[u8], mime_type: &str) -> Result<String, ModelError> {
        self.generate(vec![
            Part::Text {
                text: IMAGE_TEXT_PROMPT.to_string(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(image),
                },
            },
        ])
        .await
    }
}
