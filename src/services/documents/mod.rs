//! Per-format document adapters.
//!
//! An adapter splits a document into ordered text [`Fragment`]s and later
//! rebuilds a document of its output format from the translated fragments.
//! Fragment `index` is the position the text is written back to, so callers
//! may translate fragments in any order.

mod flat;
mod ooxml;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use flat::{write_docx, ImageAdapter, PdfAdapter, PlainTextAdapter};
pub use ooxml::{DocxAdapter, PptxAdapter};

use crate::services::translator::{ImageTextReader, ModelError};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// One unit of translatable text and the position it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: usize,
    pub text: String,
}

impl Fragment {
    /// Whether the fragment needs a trip to the translator at all.
    pub fn is_translatable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// File type produced by an adapter's `rebuild`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub extension: &'static str,
    pub mime_type: &'static str,
}

pub const DOCX_OUTPUT: OutputFormat = OutputFormat {
    extension: "docx",
    mime_type: DOCX_MIME,
};

pub const PPTX_OUTPUT: OutputFormat = OutputFormat {
    extension: "pptx",
    mime_type: PPTX_MIME,
};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("could not extract any text from the file")]
    NoText,

    #[error("invalid document archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid document XML: {0}")]
    Xml(String),

    #[error("could not read PDF: {0}")]
    Pdf(String),

    #[error("not a readable image: {0}")]
    Image(String),

    #[error("reading text from image failed: {0}")]
    Model(#[from] ModelError),

    #[error("expected {expected} translated fragments, got {got}")]
    FragmentCount { expected: usize, got: usize },

    #[error("translated fragment at position {position} has index {index}")]
    FragmentOrder { position: usize, index: usize },

    #[error("document part {part} expands beyond {limit} bytes")]
    PartTooLarge { part: String, limit: u64 },

    #[error("document worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait DocumentAdapter: Send + Sync {
    fn output(&self) -> OutputFormat;

    /// Ordered fragments; `fragments[i].index == i`.
    async fn extract(&self, source: &[u8]) -> Result<Vec<Fragment>, AdapterError>;

    /// Rebuild from the original bytes and one translated fragment per extracted one,
    /// sorted by index.
    fn rebuild(&self, source: &[u8], translated: &[Fragment]) -> Result<Vec<u8>, AdapterError>;
}

/// Adapter lookup by lower-case file extension.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn DocumentAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every supported format. Image input needs a model that can read text from pictures.
    /// `max_part_bytes` caps the decompressed size of any archive part that is parsed.
    pub fn with_defaults(reader: Arc<dyn ImageTextReader>, max_part_bytes: u64) -> Self {
        let image: Arc<dyn DocumentAdapter> = Arc::new(ImageAdapter::new(reader));
        let text: Arc<dyn DocumentAdapter> = Arc::new(PlainTextAdapter);

        let mut registry = Self::new();
        registry.register("docx", Arc::new(DocxAdapter::new(max_part_bytes)));
        registry.register("pptx", Arc::new(PptxAdapter::new(max_part_bytes)));
        registry.register("pdf", Arc::new(PdfAdapter));
        for ext in ["png", "jpg", "jpeg", "webp"] {
            registry.register(ext, image.clone());
        }
        for ext in ["txt", "md"] {
            registry.register(ext, text.clone());
        }
        registry
    }

    pub fn register(&mut self, extension: &str, adapter: Arc<dyn DocumentAdapter>) {
        self.adapters
            .insert(extension.to_ascii_lowercase(), adapter);
    }

    pub fn for_filename(&self, filename: &str) -> Result<Arc<dyn DocumentAdapter>, AdapterError> {
        let (_, ext) = split_extension(filename);
        ext.map(str::to_ascii_lowercase)
            .and_then(|ext| self.adapters.get(&ext).cloned())
            .ok_or_else(|| AdapterError::UnsupportedFormat(filename.to_string()))
    }
}

fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    }
}

/// `translated_<stem>.<ext>` for the downloadable artifact.
pub fn output_filename(source_filename: &str, format: OutputFormat) -> String {
    let (stem, _) = split_extension(source_filename);
    format!("translated_{}.{}", stem, format.extension)
}

/// Strip directory components and characters that are unsafe in a download name.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | ':' | '*' | '?' | '<' | '>' | '|'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Split flat text into paragraph fragments on blank lines.
pub(crate) fn paragraphs(text: &str) -> Vec<Fragment> {
    let normalized = text.replace("\r\n", "\n");
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    blocks
        .into_iter()
        .enumerate()
        .map(|(index, text)| Fragment { index, text })
        .collect()
}

/// Run CPU-bound parsing of `source` on the blocking pool, off the async workers.
pub(crate) async fn off_runtime<T, F>(source: &[u8], work: F) -> Result<T, AdapterError>
where
    T: Send + 'static,
    F: FnOnce(&[u8]) -> Result<T, AdapterError> + Send + 'static,
{
    let owned = source.to_vec();
    tokio::task::spawn_blocking(move || work(&owned)).await?
}

/// `translated` must hold fragments `0..n` in index order.
pub(crate) fn check_sequence(translated: &[Fragment]) -> Result<(), AdapterError> {
    match translated
        .iter()
        .enumerate()
        .find(|(position, fragment)| fragment.index != *position)
    {
        Some((position, fragment)) => Err(AdapterError::FragmentOrder {
            position,
            index: fragment.index,
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_count(expected: usize, translated: &[Fragment]) -> Result<(), AdapterError> {
    if translated.len() != expected {
        return Err(AdapterError::FragmentCount {
            expected,
            got: translated.len(),
        });
    }
    Ok(())
}
