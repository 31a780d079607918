use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAI,
    #[default]
    FastEmbed,
    Hashed,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_query_model")]
    pub query_model: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_true")]
    pub reranking_enabled: bool,
    #[serde(default = "default_reranking_model")]
    pub reranking_model: Option<String>,
    #[serde(default)]
    pub fastembed_cache_dir: Option<String>,
    #[serde(default)]
    pub fastembed_show_download_progress: Option<bool>,
    #[serde(default)]
    pub fastembed_max_length: Option<usize>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
    #[serde(default = "default_retrieval_overfetch_factor")]
    pub retrieval_overfetch_factor: usize,
    #[serde(default = "default_context_passages")]
    pub context_passages: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            query_model: default_query_model(),
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            reranking_enabled: default_true(),
            reranking_model: default_reranking_model(),
            fastembed_cache_dir: None,
            fastembed_show_download_progress: None,
            fastembed_max_length: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_upload_bytes: default_max_upload_bytes(),
            session_timeout_secs: default_session_timeout_secs(),
            session_sweep_interval_secs: default_session_sweep_interval_secs(),
            retrieval_k: default_retrieval_k(),
            retrieval_overfetch_factor: default_retrieval_overfetch_factor(),
            context_passages: default_context_passages(),
        }
    }
}

fn default_base_url() -> String {
    "https://open.bigmodel.cn/api/paas/v4".to_string()
}

fn default_query_model() -> String {
    "glm-4-flash".to_string()
}

const fn default_http_port() -> u16 {
    8000
}

fn default_data_dir() -> String {
    "./data".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_embedding_model() -> Option<String> {
    Some("Xenova/bge-small-zh-v1.5".to_string())
}

const fn default_embedding_dimensions() -> u32 {
    512
}

const fn default_true() -> bool {
    true
}

#[allow(clippy::unnecessary_wraps)]
fn default_reranking_model() -> Option<String> {
    Some("BAAI/bge-reranker-base".to_string())
}

const fn default_chunk_size() -> usize {
    800
}

const fn default_chunk_overlap() -> usize {
    100
}

const fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

const fn default_session_timeout_secs() -> u64 {
    2 * 60 * 60
}

const fn default_session_sweep_interval_secs() -> u64 {
    10 * 60
}

const fn default_retrieval_k() -> usize {
    9
}

const fn default_retrieval_overfetch_factor() -> usize {
    3
}

const fn default_context_passages() -> usize {
    3
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
