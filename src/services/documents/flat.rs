//! Adapters for inputs without editable structure (plain text, PDF, images).
//!
//! Their text is split into paragraphs and the translation is delivered as a
//! fresh Word document with one paragraph per fragment.

use async_trait::async_trait;
use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{
    check_sequence, off_runtime, paragraphs, AdapterError, DocumentAdapter, Fragment,
    OutputFormat, DOCX_OUTPUT,
};
use crate::services::translator::ImageTextReader;

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#
);

const ROOT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

const DOCUMENT_HEAD: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#
);

const DOCUMENT_TAIL: &str = "<w:sectPr/></w:body></w:document>";

/// Minimal Word document with one paragraph per entry. Line breaks inside an
/// entry become `<w:br/>`.
pub fn write_docx(paragraphs: &[String]) -> Result<Vec<u8>, AdapterError> {
    let mut body = String::from(DOCUMENT_HEAD);
    for paragraph in paragraphs {
        body.push_str("<w:p><w:r>");
        for (i, line) in paragraph.split('\n').enumerate() {
            if i > 0 {
                body.push_str("<w:br/>");
            }
            body.push_str(r#"<w:t xml:space="preserve">"#);
            body.push_str(&escape(line));
            body.push_str("</w:t>");
        }
        body.push_str("</w:r></w:p>");
    }
    body.push_str(DOCUMENT_TAIL);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("word/document.xml", body.as_str()),
    ] {
        writer.start_file(name, options)?;
        writer.write_all(data.as_bytes())?;
    }
    Ok(writer.finish()?.into_inner())
}

fn non_empty(fragments: Vec<Fragment>) -> Result<Vec<Fragment>, AdapterError> {
    if fragments.iter().any(Fragment::is_translatable) {
        Ok(fragments)
    } else {
        Err(AdapterError::NoText)
    }
}

/// Flat outputs are written from the fragments alone; the source is not re-read.
fn rebuild_flat(translated: &[Fragment]) -> Result<Vec<u8>, AdapterError> {
    check_sequence(translated)?;
    let texts: Vec<String> = translated.iter().map(|f| f.text.clone()).collect();
    write_docx(&texts)
}

/// UTF-8 text files.
pub struct PlainTextAdapter;

impl PlainTextAdapter {
    fn read(source: &[u8]) -> Result<Vec<Fragment>, AdapterError> {
        let text = std::str::from_utf8(source)
            .map_err(|_| AdapterError::UnsupportedFormat("text file is not UTF-8".to_string()))?;
        non_empty(paragraphs(text.trim_start_matches('\u{feff}')))
    }
}

#[async_trait]
impl DocumentAdapter for PlainTextAdapter {
    fn output(&self) -> OutputFormat {
        DOCX_OUTPUT
    }

    async fn extract(&self, source: &[u8]) -> Result<Vec<Fragment>, AdapterError> {
        off_runtime(source, Self::read).await
    }

    fn rebuild(&self, _source: &[u8], translated: &[Fragment]) -> Result<Vec<u8>, AdapterError> {
        rebuild_flat(translated)
    }
}

/// PDF text layer. Layout is not preserved.
pub struct PdfAdapter;

impl PdfAdapter {
    fn read(source: &[u8]) -> Result<Vec<Fragment>, AdapterError> {
        let document =
            lopdf::Document::load_mem(source).map_err(|e| AdapterError::Pdf(e.to_string()))?;

        let mut pages = Vec::new();
        for page in document.get_pages().into_keys() {
            match document.extract_text(&[page]) {
                Ok(text) if !text.trim().is_empty() => pages.push(text),
                Ok(_) => {}
                Err(e) => tracing::debug!(page, error = %e, "Skipping PDF page without a text layer"),
            }
        }

        non_empty(paragraphs(&pages.join("\n\n")))
    }
}

#[async_trait]
impl DocumentAdapter for PdfAdapter {
    fn output(&self) -> OutputFormat {
        DOCX_OUTPUT
    }

    async fn extract(&self, source: &[u8]) -> Result<Vec<Fragment>, AdapterError> {
        off_runtime(source, Self::read).await
    }

    fn rebuild(&self, _source: &[u8], translated: &[Fragment]) -> Result<Vec<u8>, AdapterError> {
        rebuild_flat(translated)
    }
}

/// Photos and scans. The text is read by a vision model.
pub struct ImageAdapter {
    reader: Arc<dyn ImageTextReader>,
}

impl ImageAdapter {
    pub fn new(reader: Arc<dyn ImageTextReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl DocumentAdapter for ImageAdapter {
    fn output(&self) -> OutputFormat {
        DOCX_OUTPUT
    }

    async fn extract(&self, source: &[u8]) -> Result<Vec<Fragment>, AdapterError> {
        let format = image::guess_format(source).map_err(|e| AdapterError::Image(e.to_string()))?;
        let text = self.reader.read_text(source, format.to_mime_type()).await?;
        non_empty(paragraphs(&text))
    }

    fn rebuild(&self, _source: &[u8], translated: &[Fragment]) -> Result<Vec<u8>, AdapterError> {
        rebuild_flat(translated)
    }
}
