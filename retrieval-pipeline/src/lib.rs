pub mod answer_retrieval;
pub mod pipeline;
pub mod reranking;

use serde::Serialize;

pub use pipeline::{RankingStage, RetrievalConfig, RetrievalOutcome, RetrievalPipeline};

/// Which stage produced a passage's score. Distances and rerank scores live
/// on different scales and run in opposite directions, so they are never
/// compared with each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "stage", content = "value", rename_all = "snake_case")]
pub enum PassageScore {
    /// Squared L2 distance from the query; lower is closer.
    VectorDistance(f32),
    /// Cross-encoder relevance; higher is better.
    Rerank(f32),
}

/// A chunk chosen as context for a question, in descending relevance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub ordinal: usize,
    pub text: String,
    pub score: PassageScore,
}
