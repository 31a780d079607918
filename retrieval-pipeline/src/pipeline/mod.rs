mod config;

pub use config::RetrievalConfig;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{types::indexed_document::IndexedDocument, vector_index::Neighbor},
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{
    reranking::{RerankError, RerankHit, Reranker},
    PassageScore, RetrievedPassage,
};

/// How the returned passages were ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStage {
    /// No more candidates than requested, or no reranker configured.
    VectorOnly,
    Reranked,
    /// The reranker failed; candidates kept their vector order.
    RerankFallback,
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub passages: Vec<RetrievedPassage>,
    pub ranking: RankingStage,
    pub candidate_count: usize,
    pub search_duration: Duration,
    pub rerank_duration: Duration,
}

impl RetrievalOutcome {
    fn empty() -> Self {
        Self {
            passages: Vec::new(),
            ranking: RankingStage::VectorOnly,
            candidate_count: 0,
            search_duration: Duration::ZERO,
            rerank_duration: Duration::ZERO,
        }
    }
}

/// Two-stage retrieval over one session's document: exact vector search
/// overfetches candidates, then the shared reranker reorders them. Rerank
/// problems degrade to vector order and never fail the request.
#[allow(clippy::module_name_repetitions)]
pub struct RetrievalPipeline {
    embedding_provider: Arc<EmbeddingProvider>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    pub fn new(
        embedding_provider: Arc<EmbeddingProvider>,
        reranker: Option<Arc<dyn Reranker>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedding_provider,
            reranker,
            config,
        }
    }

    pub fn from_app_config(
        app_config: &AppConfig,
        embedding_provider: Arc<EmbeddingProvider>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Self {
        Self::new(
            embedding_provider,
            reranker,
            RetrievalConfig::from_app_config(app_config),
        )
    }

    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Returns at most `k` passages, most relevant first.
    pub async fn retrieve(
        &self,
        document: &Arc<IndexedDocument>,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, AppError> {
        Ok(self.retrieve_with_outcome(document, query, k).await?.passages)
    }

    #[instrument(skip_all, fields(k = k, corpus_size = document.len()))]
    pub async fn retrieve_with_outcome(
        &self,
        document: &Arc<IndexedDocument>,
        query: &str,
        k: usize,
    ) -> Result<RetrievalOutcome, AppError> {
        if k == 0 || document.is_empty() {
            debug!("Nothing to retrieve");
            return Ok(RetrievalOutcome::empty());
        }

        let query_embedding = embed_query(&self.embedding_provider, query).await?;
        self.retrieve_with_embedding(document, query, query_embedding, k)
            .await
    }

    /// Same as `retrieve_with_outcome`, reusing an already computed query
    /// embedding.
    pub async fn retrieve_with_embedding(
        &self,
        document: &Arc<IndexedDocument>,
        query: &str,
        query_embedding: Vec<f32>,
        k: usize,
    ) -> Result<RetrievalOutcome, AppError> {
        let overfetch = self.config.overfetch(k, document.len());
        if overfetch == 0 {
            return Ok(RetrievalOutcome::empty());
        }

        let search_started = Instant::now();
        let candidates = collect_candidates(document, query_embedding, overfetch).await?;
        let search_duration = search_started.elapsed();
        let candidate_count = candidates.len();

        let mut outcome = RetrievalOutcome {
            passages: Vec::new(),
            ranking: RankingStage::VectorOnly,
            candidate_count,
            search_duration,
            rerank_duration: Duration::ZERO,
        };

        if candidate_count <= k {
            outcome.passages = vector_passages(document, &candidates, k);
            return Ok(outcome);
        }

        let Some(reranker) = &self.reranker else {
            debug!("No reranker configured; keeping vector order");
            outcome.passages = vector_passages(document, &candidates, k);
            return Ok(outcome);
        };

        let rerank_started = Instant::now();
        let reranked = rerank_candidates(reranker.as_ref(), document, &candidates, query, k).await;
        outcome.rerank_duration = rerank_started.elapsed();

        match reranked {
            Ok(passages) => {
                outcome.ranking = RankingStage::Reranked;
                outcome.passages = passages;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    candidate_count,
                    "Reranking failed; falling back to vector order"
                );
                outcome.ranking = RankingStage::RerankFallback;
                outcome.passages = vector_passages(document, &candidates, k);
            }
        }

        debug!(
            ranking = ?outcome.ranking,
            returned = outcome.passages.len(),
            search_ms = outcome.search_duration.as_millis(),
            rerank_ms = outcome.rerank_duration.as_millis(),
            "Retrieval finished"
        );

        Ok(outcome)
    }
}

#[instrument(level = "trace", skip_all)]
async fn embed_query(provider: &EmbeddingProvider, query: &str) -> Result<Vec<f32>, AppError> {
    provider
        .embed(query)
        .await
        .map_err(|err| AppError::EmbeddingFailure(format!("{err:#}")))
}

/// Exact search runs on the blocking pool; it is linear in corpus size.
#[instrument(level = "trace", skip_all, fields(overfetch = overfetch))]
async fn collect_candidates(
    document: &Arc<IndexedDocument>,
    query_embedding: Vec<f32>,
    overfetch: usize,
) -> Result<Vec<Neighbor>, AppError> {
    let document = Arc::clone(document);
    tokio::task::spawn_blocking(move || document.index().search(&query_embedding, overfetch))
        .await?
}

#[instrument(level = "trace", skip_all)]
async fn rerank_candidates(
    reranker: &dyn Reranker,
    document: &IndexedDocument,
    candidates: &[Neighbor],
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedPassage>, RerankError> {
    let texts = candidates
        .iter()
        .map(|candidate| chunk_text(document, candidate.ordinal).map(str::to_owned))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| RerankError::InvalidOutput("candidate ordinal has no chunk".to_string()))?;

    let hits = reranker.rerank(query, texts, k).await?;
    if hits.is_empty() {
        return Err(RerankError::InvalidOutput(
            "reranker returned no results".to_string(),
        ));
    }

    hits.into_iter()
        .take(k)
        .map(|RerankHit { index, text, score }| {
            let candidate = candidates.get(index).ok_or_else(|| {
                RerankError::InvalidOutput(format!(
                    "hit index {index} out of range for {} candidates",
                    candidates.len()
                ))
            })?;
            Ok(RetrievedPassage {
                ordinal: candidate.ordinal,
                text,
                score: PassageScore::Rerank(score),
            })
        })
        .collect()
}

fn vector_passages(
    document: &IndexedDocument,
    candidates: &[Neighbor],
    k: usize,
) -> Vec<RetrievedPassage> {
    candidates
        .iter()
        .take(k)
        .filter_map(|candidate| {
            chunk_text(document, candidate.ordinal).map(|text| RetrievedPassage {
                ordinal: candidate.ordinal,
                text: text.to_owned(),
                score: PassageScore::VectorDistance(candidate.distance),
            })
        })
        .collect()
}

fn chunk_text(document: &IndexedDocument, ordinal: usize) -> Option<&str> {
    document.chunk(ordinal).map(|chunk| chunk.text.as_str())
}
