//! Minimal Office documents for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A Word document with one paragraph per run text, plus a table cell and an image entry.
pub fn docx_with_runs(runs: &[&str], cell: &str) -> Vec<u8> {
    let mut body = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#
    ));
    for run in runs {
        body.push_str(&format!(
            r#"<w:p><w:r><w:rPr><w:i/></w:rPr><w:t xml:space="preserve">{run}</w:t></w:r></w:p>"#
        ));
    }
    body.push_str(&format!(
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{cell}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#
    ));
    body.push_str("</w:body></w:document>");

    build_zip(&[
        ("[Content_Types].xml", b"<Types/>".to_vec()),
        ("word/document.xml", body.into_bytes()),
        ("word/media/logo.png", LOGO.to_vec()),
    ])
}

/// A deck with one text box per slide.
pub fn pptx_with_slides(slides: &[&str]) -> Vec<u8> {
    let mut entries = vec![("[Content_Types].xml".to_string(), b"<Types/>".to_vec())];
    for (i, text) in slides.iter().enumerate() {
        entries.push((
            format!("ppt/slides/slide{}.xml", i + 1),
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
            )
            .into_bytes(),
        ));
    }
    let borrowed: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    build_zip(&borrowed)
}

pub const LOGO: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];

fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
