use std::path::Path;

use mime_guess::from_path;
use serde::Serialize;

use crate::error::AppError;

pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Document formats the ingestion pipeline can turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PlainText,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentKind {
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
            Self::Pdf => "application/pdf",
            Self::Docx => DOCX_MIME_TYPE,
        }
    }

    fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Some(Self::PlainText),
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            "application/pdf" => Some(Self::Pdf),
            DOCX_MIME_TYPE => Some(Self::Docx),
            _ => None,
        }
    }
}

/// What the upload boundary knows about a file before parsing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub kind: DocumentKind,
}

impl FileInfo {
    /// Classifies an upload from its file name and declared content type.
    ///
    /// The extension wins when it names a known format; the declared type
    /// is consulted otherwise. Anything else is `UnsupportedFileType`.
    pub fn new(
        file_name: Option<&str>,
        declared_type: Option<&str>,
        size: u64,
    ) -> Result<Self, AppError> {
        let file_name = file_name
            .map(Self::sanitize_file_name)
            .unwrap_or_default();
        let path = Path::new(&file_name);

        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DocumentKind::from_extension)
            .or_else(|| declared_type.and_then(DocumentKind::from_mime))
            .ok_or_else(|| {
                AppError::UnsupportedFileType(format!(
                    "{} ({})",
                    if file_name.is_empty() {
                        "unnamed upload"
                    } else {
                        file_name.as_str()
                    },
                    declared_type.map_or_else(|| Self::guess_mime_type(path), str::to_owned)
                ))
            })?;

        Ok(Self {
            mime_type: kind.mime_type().to_string(),
            file_name,
            size,
            kind,
        })
    }

    fn guess_mime_type(path: &Path) -> String {
        from_path(path)
            .first_or(mime::APPLICATION_OCTET_STREAM)
            .to_string()
    }

    /// Keeps only the final path component so a crafted name cannot point
    /// outside the temporary upload location.
    fn sanitize_file_name(file_name: &str) -> String {
        file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}
