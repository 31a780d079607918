use std::path::Path;

use common::{error::AppError, storage::types::file_info::DocumentKind};

use super::{
    docx_ingestion::extract_docx_content, markdown::markdown_to_plain_text,
    pdf_ingestion::extract_pdf_content,
};

/// Reads `path` and returns its text according to `kind`.
pub async fn extract_text_from_file(path: &Path, kind: DocumentKind) -> Result<String, AppError> {
    match kind {
        DocumentKind::PlainText => read_utf8(path).await,
        DocumentKind::Markdown => {
            let source = read_utf8(path).await?;
            Ok(markdown_to_plain_text(&source))
        }
        DocumentKind::Pdf => extract_pdf_content(path).await,
        DocumentKind::Docx => extract_docx_content(path).await,
    }
}

async fn read_utf8(path: &Path) -> Result<String, AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| AppError::ParseFailure(format!("Failed to read upload: {err}")))?;

    let text = String::from_utf8(bytes)
        .map_err(|err| AppError::ParseFailure(format!("Upload is not valid UTF-8: {err}")))?;

    // A leading byte-order mark is not content.
    Ok(text
        .strip_prefix('\u{feff}')
        .map(str::to_owned)
        .unwrap_or(text))
}
