//! Office Open XML (docx / pptx) adapters.
//!
//! Both formats are zip archives of XML parts where visible text lives in
//! run-text elements (`<w:t>` in Word, `<a:t>` in DrawingML). Each such
//! element is one fragment. Rebuilding rewrites only those elements' text and
//! copies every other archive entry unchanged, so styling, images and layout
//! survive translation.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{
    check_count, check_sequence, off_runtime, AdapterError, DocumentAdapter, Fragment,
    OutputFormat, DOCX_OUTPUT, PPTX_OUTPUT,
};

/// Decompressed size allowed for one XML part unless configured otherwise.
pub const DEFAULT_MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Word documents: body, headers, footers, footnotes and endnotes. Tables live in the same parts.
pub struct DocxAdapter {
    max_part_bytes: u64,
}

/// PowerPoint decks: text frames and tables on every slide.
pub struct PptxAdapter {
    max_part_bytes: u64,
}

impl DocxAdapter {
    pub fn new(max_part_bytes: u64) -> Self {
        Self { max_part_bytes }
    }
}

impl Default for DocxAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PART_BYTES)
    }
}

impl PptxAdapter {
    pub fn new(max_part_bytes: u64) -> Self {
        Self { max_part_bytes }
    }
}

impl Default for PptxAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PART_BYTES)
    }
}

/// Where the translatable text of one OOXML flavour lives.
struct Layout {
    text_tag: &'static [u8],
    preserve_space: bool,
    part_order: fn(&str) -> Option<(u32, u32)>,
}

const WORD: Layout = Layout {
    text_tag: b"w:t",
    preserve_space: true,
    part_order: word_part_order,
};

const SLIDES: Layout = Layout {
    text_tag: b"a:t",
    preserve_space: false,
    part_order: slide_part_order,
};

fn trailing_number(name: &str, prefix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?.strip_suffix(".xml")?;
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse().ok()
}

fn word_part_order(name: &str) -> Option<(u32, u32)> {
    match name {
        "word/document.xml" => Some((0, 0)),
        "word/footnotes.xml" => Some((3, 0)),
        "word/endnotes.xml" => Some((4, 0)),
        _ => trailing_number(name, "word/header")
            .map(|n| (1, n))
            .or_else(|| trailing_number(name, "word/footer").map(|n| (2, n))),
    }
}

fn slide_part_order(name: &str) -> Option<(u32, u32)> {
    trailing_number(name, "ppt/slides/slide").map(|n| (0, n))
}

fn xml_error(e: impl std::fmt::Display) -> AdapterError {
    AdapterError::Xml(e.to_string())
}

/// Names of the text-bearing parts, in fragment order.
fn text_parts<R: Read + std::io::Seek>(
    archive: &ZipArchive<R>,
    layout: &Layout,
) -> Vec<String> {
    let mut parts: Vec<((u32, u32), String)> = archive
        .file_names()
        .filter_map(|name| (layout.part_order)(name).map(|key| (key, name.to_string())))
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, name)| name).collect()
}

/// Read one part, refusing anything that decompresses past `limit` bytes.
/// The declared size is checked first; the read itself is capped in case it lies.
fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    limit: u64,
) -> Result<String, AdapterError> {
    let too_large = || AdapterError::PartTooLarge {
        part: name.to_string(),
        limit,
    };

    let part = archive.by_name(name)?;
    if part.size() > limit {
        return Err(too_large());
    }

    let mut xml = String::new();
    part.take(limit.saturating_add(1)).read_to_string(&mut xml)?;
    if xml.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(xml)
}

/// Text of every run-text element in `xml`, in document order.
fn collect_runs(xml: &str, layout: &Layout) -> Result<Vec<String>, AdapterError> {
    let mut reader = Reader::from_str(xml);
    let mut runs = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Eof => break,
            Event::Start(start) if start.name().as_ref() == layout.text_tag => {
                let mut text = String::new();
                loop {
                    match reader.read_event().map_err(xml_error)? {
                        Event::Text(t) => text.push_str(&t.unescape().map_err(xml_error)?),
                        Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
                        Event::End(end) if end.name().as_ref() == layout.text_tag => break,
                        Event::Eof => return Err(xml_error("unterminated text element")),
                        _ => {}
                    }
                }
                runs.push(text);
            }
            _ => {}
        }
    }

    Ok(runs)
}

/// Rewrite `xml`, replacing run text with `replacements` in order.
/// Returns the new part and how many replacements were consumed.
fn replace_runs(
    xml: &str,
    layout: &Layout,
    replacements: &[Fragment],
) -> Result<(Vec<u8>, usize), AdapterError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut used = 0;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Eof => break,
            Event::Start(start) if start.name().as_ref() == layout.text_tag => {
                let replacement = replacements
                    .get(used)
                    .ok_or(AdapterError::FragmentCount {
                        expected: used + 1,
                        got: replacements.len(),
                    })?;
                used += 1;

                let start = with_preserved_space(start.into_owned(), layout);
                writer.write_event(Event::Start(start)).map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&replacement.text)))
                    .map_err(xml_error)?;

                // Skip the original content up to and including the closing tag.
                loop {
                    match reader.read_event().map_err(xml_error)? {
                        Event::End(end) if end.name().as_ref() == layout.text_tag => {
                            writer.write_event(Event::End(end)).map_err(xml_error)?;
                            break;
                        }
                        Event::Eof => return Err(xml_error("unterminated text element")),
                        _ => {}
                    }
                }
            }
            event => writer.write_event(event).map_err(xml_error)?,
        }
    }

    Ok((writer.into_inner(), used))
}

/// Word drops leading and trailing spaces from `<w:t>` unless told otherwise.
fn with_preserved_space(mut start: BytesStart<'static>, layout: &Layout) -> BytesStart<'static> {
    if layout.preserve_space
        && !start
            .attributes()
            .flatten()
            .any(|a| a.key.as_ref() == b"xml:space")
    {
        start.push_attribute(("xml:space", "preserve"));
    }
    start
}

fn extract_archive(
    source: &[u8],
    layout: &Layout,
    max_part_bytes: u64,
) -> Result<Vec<Fragment>, AdapterError> {
    let mut archive = ZipArchive::new(Cursor::new(source))?;
    let mut fragments = Vec::new();

    for name in text_parts(&archive, layout) {
        let xml = read_part(&mut archive, &name, max_part_bytes)?;
        for text in collect_runs(&xml, layout)? {
            fragments.push(Fragment {
                index: fragments.len(),
                text,
            });
        }
    }

    Ok(fragments)
}

fn rebuild_archive(
    source: &[u8],
    translated: &[Fragment],
    layout: &Layout,
    max_part_bytes: u64,
) -> Result<Vec<u8>, AdapterError> {
    check_sequence(translated)?;
    let mut archive = ZipArchive::new(Cursor::new(source))?;

    let mut rewritten: HashMap<String, Vec<u8>> = HashMap::new();
    let mut offset = 0;
    for name in text_parts(&archive, layout) {
        let xml = read_part(&mut archive, &name, max_part_bytes)?;
        let (part, used) = replace_runs(&xml, layout, &translated[offset.min(translated.len())..])?;
        offset += used;
        rewritten.insert(name, part);
    }
    check_count(offset, translated)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // Keep the original entry order; some readers expect [Content_Types].xml first.
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        match rewritten.remove(entry.name()) {
            Some(part) => {
                let name = entry.name().to_string();
                drop(entry);
                writer.start_file(name, options)?;
                writer.write_all(&part)?;
            }
            None => writer.raw_copy_file(entry)?,
        }
    }

    Ok(writer.finish()?.into_inner())
}

#[async_trait]
impl DocumentAdapter for DocxAdapter {
    fn output(&self) -> OutputFormat {
        DOCX_OUTPUT
    }

    async fn extract(&self, source: &[u8]) -> Result<Vec<Fragment>, AdapterError> {
        let limit = self.max_part_bytes;
        off_runtime(source, move |bytes| extract_archive(bytes, &WORD, limit)).await
    }

    fn rebuild(&self, source: &[u8], translated: &[Fragment]) -> Result<Vec<u8>, AdapterError> {
        rebuild_archive(source, translated, &WORD, self.max_part_bytes)
    }
}

#[async_trait]
impl DocumentAdapter for PptxAdapter {
    fn output(&self) -> OutputFormat {
        PPTX_OUTPUT
    }

    async fn extract(&self, source: &[u8]) -> Result<Vec<Fragment>, AdapterError> {
        let limit = self.max_part_bytes;
        off_runtime(source, move |bytes| extract_archive(bytes, &SLIDES, limit)).await
    }

    fn rebuild(&self, source: &[u8], translated: &[Fragment]) -> Result<Vec<u8>, AdapterError> {
        rebuild_archive(source, translated, &SLIDES, self.max_part_bytes)
    }
}
