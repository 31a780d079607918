pub mod file_info;
pub mod indexed_document;
pub mod text_chunk;
