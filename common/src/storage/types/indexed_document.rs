use crate::{
    error::AppError,
    storage::{types::text_chunk::TextChunk, vector_index::VectorIndex},
};

/// The read-only payload of a session: a document's chunks and the vector
/// index built over them. Row `i` of the index is the embedding of
/// `chunks[i]`.
#[derive(Debug, Clone, Default)]
pub struct IndexedDocument {
    chunks: Vec<TextChunk>,
    index: VectorIndex,
}

impl IndexedDocument {
    pub fn new(chunks: Vec<TextChunk>, index: VectorIndex) -> Result<Self, AppError> {
        if chunks.len() != index.len() {
            return Err(AppError::InternalError(format!(
                "document has {} chunks but {} indexed vectors",
                chunks.len(),
                index.len()
            )));
        }
        if let Some(misplaced) = chunks
            .iter()
            .enumerate()
            .find(|(position, chunk)| chunk.ordinal != *position)
        {
            return Err(AppError::InternalError(format!(
                "chunk at position {} carries ordinal {}",
                misplaced.0, misplaced.1.ordinal
            )));
        }

        Ok(Self { chunks, index })
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    pub fn chunk(&self, ordinal: usize) -> Option<&TextChunk> {
        self.chunks.get(ordinal)
    }

    pub const fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
