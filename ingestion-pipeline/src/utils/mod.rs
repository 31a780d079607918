pub mod docx_ingestion;
pub mod file_text_extraction;
pub mod markdown;
pub mod pdf_ingestion;
