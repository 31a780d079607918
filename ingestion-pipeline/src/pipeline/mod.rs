mod config;

pub use config::IngestionConfig;

use std::{path::Path, sync::Arc, time::Instant};

use common::{
    error::AppError,
    storage::{
        types::{file_info::DocumentKind, indexed_document::IndexedDocument, text_chunk::TextChunk},
        vector_index::VectorIndex,
    },
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use tracing::{debug, info, instrument, warn};

use crate::{chunking::chunk_text_semantically, utils::file_text_extraction::extract_text_from_file};

/// Turns an uploaded file into a fully built `IndexedDocument`.
///
/// The document is only returned once every chunk is embedded and indexed,
/// so nothing half-built is ever visible to other sessions.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    pipeline_config: IngestionConfig,
    embedding_provider: Arc<EmbeddingProvider>,
}

impl IngestionPipeline {
    pub fn new(config: &AppConfig, embedding_provider: Arc<EmbeddingProvider>) -> Self {
        Self::new_with_config(IngestionConfig::from_app_config(config), embedding_provider)
    }

    pub fn new_with_config(
        pipeline_config: IngestionConfig,
        embedding_provider: Arc<EmbeddingProvider>,
    ) -> Self {
        Self {
            pipeline_config,
            embedding_provider,
        }
    }

    pub const fn config(&self) -> &IngestionConfig {
        &self.pipeline_config
    }

    #[instrument(skip_all, fields(kind = ?kind))]
    pub async fn ingest_file(
        &self,
        path: &Path,
        kind: DocumentKind,
    ) -> Result<IndexedDocument, AppError> {
        let started = Instant::now();
        let text = extract_text_from_file(path, kind).await?;
        debug!(
            char_count = text.chars().count(),
            extract_ms = started.elapsed().as_millis(),
            "Extracted document text"
        );

        self.build_document(text).await
    }

    /// Chunks, embeds and indexes `text`.
    #[instrument(skip_all)]
    pub async fn build_document(&self, text: String) -> Result<IndexedDocument, AppError> {
        let started = Instant::now();
        let chunk_size = self.pipeline_config.chunk_size;
        let overlap = self.pipeline_config.chunk_overlap;

        let pieces =
            tokio::task::spawn_blocking(move || chunk_text_semantically(&text, chunk_size, overlap))
                .await?;
        let chunks = TextChunk::from_texts(pieces);

        if chunks.is_empty() {
            warn!("Document produced no chunks; creating an empty index");
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let mut index = VectorIndex::new();
        index.add(&vectors)?;

        let document = IndexedDocument::new(chunks, index)?;
        info!(
            chunk_count = document.len(),
            dimension = ?document.index().dimension(),
            backend = self.embedding_provider.backend_label(),
            total_ms = started.elapsed().as_millis(),
            "Document indexed"
        );

        Ok(document)
    }

    async fn embed_chunks(&self, chunks: &[TextChunk]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.pipeline_config.embedding_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embedded = self
                .embedding_provider
                .embed_batch(texts)
                .await
                .map_err(|err| AppError::EmbeddingFailure(format!("{err:#}")))?;
            vectors.extend(embedded);
        }

        Ok(vectors)
    }
}
