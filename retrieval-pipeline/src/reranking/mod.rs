use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use common::utils::config::AppConfig;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Recoverable reranking failures. These never reach API callers; the
/// retrieval pipeline consumes them and falls back to vector order.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RerankError {
    #[error("reranker unavailable: {0}")]
    Unavailable(String),
    #[error("reranker inference failed: {0}")]
    Inference(String),
    #[error("reranker returned invalid output: {0}")]
    InvalidOutput(String),
}

/// Raw model output: a score for the candidate at `index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    pub index: usize,
    pub score: f32,
}

/// A reranked candidate. `index` points into the candidate list that was
/// passed to `rerank`.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankHit {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// Synchronous cross-encoder scoring. Implementations may block.
pub trait RerankModel: Send + Sync {
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<RerankScore>, RerankError>;
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Scores every candidate against `query` and returns at most `top_k`
    /// hits ordered by descending score. Duplicated candidates are scored
    /// independently.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<String>,
        top_k: usize,
    ) -> Result<Vec<RerankHit>, RerankError>;
}

type ModelFactory = dyn Fn() -> Result<Arc<dyn RerankModel>, RerankError> + Send + Sync;

/// Process-wide reranker handle. The model is built on first use, at most
/// once, even when many requests arrive together; every caller then shares
/// the same instance. A failed construction is remembered and reported as
/// `Unavailable` from then on.
pub struct SharedReranker {
    factory: Arc<ModelFactory>,
    model: Arc<OnceCell<Result<Arc<dyn RerankModel>, RerankError>>>,
}

impl SharedReranker {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RerankModel>, RerankError> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            model: Arc::new(OnceCell::new()),
        }
    }

    /// Returns `None` when reranking is disabled. Nothing is downloaded or
    /// loaded here; that happens on the first `rerank` call.
    pub fn maybe_from_config(config: &AppConfig) -> Option<Arc<Self>> {
        if !config.reranking_enabled {
            return None;
        }

        let config = config.clone();
        Some(Arc::new(Self::new(move || {
            let options = build_rerank_init_options(&config)?;
            let model = FastEmbedRerankModel::new(options)?;
            Ok(Arc::new(model) as Arc<dyn RerankModel>)
        })))
    }

    pub fn is_initialized(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<Arc<dyn RerankModel>, RerankError> {
        if let Some(slot) = self.model.get() {
            return slot.clone();
        }

        // Construction runs in its own task so an abandoned caller cannot
        // release the cell while the factory is still running.
        let cell = Arc::clone(&self.model);
        let factory = Arc::clone(&self.factory);
        tokio::spawn(async move {
            cell.get_or_init(|| async move {
                info!("Constructing shared reranker model");
                let built = tokio::task::spawn_blocking(move || factory())
                    .await
                    .unwrap_or_else(|err| {
                        Err(RerankError::Unavailable(format!(
                            "reranker construction aborted: {err}"
                        )))
                    });
                if let Err(err) = &built {
                    warn!(error = %err, "Reranker construction failed; reranking disabled");
                }
                built
            })
            .await
            .clone()
        })
        .await
        .unwrap_or_else(|err| {
            Err(RerankError::Unavailable(format!(
                "reranker construction task failed: {err}"
            )))
        })
    }
}

#[async_trait]
impl Reranker for SharedReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<String>,
        top_k: usize,
    ) -> Result<Vec<RerankHit>, RerankError> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let query = query.to_owned();
        let (scores, candidates) = tokio::task::spawn_blocking(move || {
            model
                .score(&query, &candidates)
                .map(|scores| (scores, candidates))
        })
        .await
        .map_err(|err| RerankError::Inference(format!("rerank task aborted: {err}")))??;

        rank_hits(scores, candidates, top_k)
    }
}

/// Validates raw scores, attaches candidate texts, sorts by descending score
/// (ties by candidate position) and keeps the first `top_k`.
fn rank_hits(
    scores: Vec<RerankScore>,
    candidates: Vec<String>,
    top_k: usize,
) -> Result<Vec<RerankHit>, RerankError> {
    let mut hits = Vec::with_capacity(scores.len());
    for RerankScore { index, score } in scores {
        let text = candidates.get(index).ok_or_else(|| {
            RerankError::InvalidOutput(format!(
                "index {index} out of range for {} candidates",
                candidates.len()
            ))
        })?;
        if !score.is_finite() {
            return Err(RerankError::InvalidOutput(format!(
                "non-finite score for candidate {index}"
            )));
        }
        hits.push(RerankHit {
            index,
            text: text.clone(),
            score,
        });
    }

    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.index.cmp(&b.index)));
    hits.truncate(top_k);

    Ok(hits)
}

/// fastembed cross-encoder. `TextRerank` needs exclusive access per call,
/// so concurrent scorers queue on the mutex.
pub struct FastEmbedRerankModel {
    engine: Mutex<TextRerank>,
}

impl FastEmbedRerankModel {
    pub fn new(options: RerankInitOptions) -> Result<Self, RerankError> {
        fs::create_dir_all(&options.cache_dir).map_err(|err| {
            RerankError::Unavailable(format!("cannot create reranker cache dir: {err}"))
        })?;

        debug!(model = ?options.model_name, "Loading fastembed reranker");
        let engine =
            TextRerank::try_new(options).map_err(|err| RerankError::Unavailable(err.to_string()))?;

        Ok(Self {
            engine: Mutex::new(engine),
        })
    }
}

impl RerankModel for FastEmbedRerankModel {
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<RerankScore>, RerankError> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| RerankError::Inference("reranker engine lock poisoned".to_string()))?;

        let results = engine
            .rerank(query.to_owned(), candidates.to_vec(), false, None)
            .map_err(|err| RerankError::Inference(err.to_string()))?;

        Ok(results
            .into_iter()
            .map(|result| RerankScore {
                index: result.index,
                score: result.score,
            })
            .collect())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| is_truthy(&value))
}

fn parse_reranker_model(code: &str) -> Result<RerankerModel, RerankError> {
    match code.trim().to_ascii_lowercase().as_str() {
        "baai/bge-reranker-base" | "bge-reranker-base" => Ok(RerankerModel::BGERerankerBase),
        "rozgo/bge-reranker-v2-m3" | "bge-reranker-v2-m3" => Ok(RerankerModel::BGERerankerV2M3),
        "jinaai/jina-reranker-v1-turbo-en" => Ok(RerankerModel::JINARerankerV1TurboEn),
        other => Err(RerankError::Unavailable(format!(
            "unknown reranking model '{other}'"
        ))),
    }
}

pub fn build_rerank_init_options(config: &AppConfig) -> Result<RerankInitOptions, RerankError> {
    let model_name = config
        .reranking_model
        .as_deref()
        .map(parse_reranker_model)
        .transpose()?
        .unwrap_or(RerankerModel::BGERerankerBase);
    let mut options = RerankInitOptions::new(model_name);

    options.cache_dir = config
        .fastembed_cache_dir
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| env::var("RERANKING_CACHE_DIR").ok().map(PathBuf::from))
        .or_else(|| env::var("FASTEMBED_CACHE_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| {
            Path::new(&config.data_dir)
                .join("fastembed")
                .join("reranker")
        });

    options.show_download_progress = config
        .fastembed_show_download_progress
        .or_else(|| env_bool("RERANKING_SHOW_DOWNLOAD_PROGRESS"))
        .or_else(|| env_bool("FASTEMBED_SHOW_DOWNLOAD_PROGRESS"))
        .unwrap_or(true);

    if let Some(max_length) = config.fastembed_max_length.or_else(|| {
        env::var("RERANKING_MAX_LENGTH")
            .ok()
            .and_then(|value| value.parse().ok())
    }) {
        options.max_length = max_length;
    }

    Ok(options)
}
