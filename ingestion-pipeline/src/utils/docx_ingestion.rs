use std::{
    io::{Cursor, Read},
    path::Path,
};

use common::error::AppError;
use quick_xml::{events::Event, Reader};
use tracing::debug;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extracts the body text of a Word document, one paragraph per line.
pub async fn extract_docx_content(file_path: &Path) -> Result<String, AppError> {
    let docx_bytes = tokio::fs::read(file_path)
        .await
        .map_err(|err| AppError::ParseFailure(format!("Failed to read DOCX: {err}")))?;

    extract_docx_text_from_bytes(docx_bytes).await
}

pub async fn extract_docx_text_from_bytes(docx_bytes: Vec<u8>) -> Result<String, AppError> {
    let byte_len = docx_bytes.len();
    let text = tokio::task::spawn_blocking(move || {
        read_document_xml(docx_bytes).and_then(|xml| paragraphs_from_document_xml(&xml))
    })
    .await
    .map_err(|err| AppError::ParseFailure(format!("DOCX parser aborted: {err}")))??;

    debug!(byte_len, char_count = text.chars().count(), "Extracted DOCX text");

    Ok(text)
}

fn read_document_xml(docx_bytes: Vec<u8>) -> Result<String, AppError> {
    let mut archive = ZipArchive::new(Cursor::new(docx_bytes))
        .map_err(|err| AppError::ParseFailure(format!("DOCX is not a valid archive: {err}")))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| AppError::ParseFailure(format!("DOCX has no {DOCUMENT_PART}: {err}")))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|err| AppError::ParseFailure(format!("Failed to read {DOCUMENT_PART}: {err}")))?;

    Ok(xml)
}

/// Collects the text runs of every `w:p` element. Tabs and line breaks
/// inside a paragraph are kept.
fn paragraphs_from_document_xml(xml: &str) -> Result<String, AppError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| AppError::ParseFailure(format!("Malformed DOCX XML: {err}")))?;

        match event {
            Event::Start(element) => match element.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(element) => match element.name().as_ref() {
                b"w:p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" if in_paragraph => current.push('\t'),
                b"w:br" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text => {
                let text = text
                    .unescape()
                    .map_err(|err| AppError::ParseFailure(format!("Malformed DOCX text: {err}")))?;
                current.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}
