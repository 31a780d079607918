#![allow(clippy::missing_docs_in_private_items)]

pub mod chunking;
pub mod pipeline;
pub mod utils;

pub use chunking::chunk_text_semantically;
pub use pipeline::{IngestionConfig, IngestionPipeline};
