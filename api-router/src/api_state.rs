use std::sync::Arc;

use common::{storage::session_store::SessionStore, utils::config::AppConfig};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::{answer_retrieval::AnswerGenerator, RetrievalPipeline};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub sessions: Arc<SessionStore>,
    pub ingestion: Arc<IngestionPipeline>,
    pub retrieval: Arc<RetrievalPipeline>,
    pub generator: Arc<dyn AnswerGenerator>,
}

impl ApiState {
    pub fn new(
        config: &AppConfig,
        sessions: Arc<SessionStore>,
        ingestion: Arc<IngestionPipeline>,
        retrieval: Arc<RetrievalPipeline>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            config: config.clone(),
            sessions,
            ingestion,
            retrieval,
            generator,
        }
    }
}
