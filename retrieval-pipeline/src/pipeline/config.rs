use common::utils::config::AppConfig;

/// Tunable parameters of two-stage retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// How many vector candidates to fetch per requested passage before
    /// reranking.
    pub overfetch_factor: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
        }
    }
}

impl RetrievalConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            overfetch_factor: config.retrieval_overfetch_factor.max(1),
        }
    }

    /// Candidates to pull from the index for a request of `k` passages over
    /// a corpus of `corpus_size` chunks.
    pub const fn overfetch(&self, k: usize, corpus_size: usize) -> usize {
        let wanted = self.overfetch_factor.saturating_mul(k);
        if wanted < corpus_size {
            wanted
        } else {
            corpus_size
        }
    }
}
