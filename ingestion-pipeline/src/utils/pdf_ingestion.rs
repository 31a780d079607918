use std::path::Path;

use common::error::AppError;
use tracing::debug;

/// Extracts the text layer of a PDF, pages in document order.
///
/// Parsing is CPU bound, so it runs on the blocking pool. A document with no
/// extractable text yields an empty string; the caller decides what that
/// means.
pub async fn extract_pdf_content(file_path: &Path) -> Result<String, AppError> {
    let pdf_bytes = tokio::fs::read(file_path)
        .await
        .map_err(|err| AppError::ParseFailure(format!("Failed to read PDF: {err}")))?;

    extract_pdf_text_from_bytes(pdf_bytes).await
}

pub async fn extract_pdf_text_from_bytes(pdf_bytes: Vec<u8>) -> Result<String, AppError> {
    let byte_len = pdf_bytes.len();
    let extraction =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf_bytes))
            .await
            .map_err(|err| AppError::ParseFailure(format!("PDF parser aborted: {err}")))?
            .map_err(|err| AppError::ParseFailure(format!("Failed to extract text from PDF: {err}")))?;

    let text = normalize_pdf_text(&extraction);
    debug!(byte_len, char_count = text.chars().count(), "Extracted PDF text layer");

    Ok(text)
}

/// Drops carriage returns and trailing spaces and collapses runs of blank
/// lines that the text layer emits between pages.
fn normalize_pdf_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;

    for line in raw.replace('\r', "").lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run = blank_run.saturating_add(1);
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}
