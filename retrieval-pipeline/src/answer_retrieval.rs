use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};
use tracing::{debug, instrument};

use crate::RetrievedPassage;

/// Reply the model is told to give when the context does not cover the
/// question.
pub const INSUFFICIENT_CONTEXT_REPLY: &str =
    "Sorry, I cannot answer this question from the provided information.";

/// Turns a finished prompt into answer text.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, prompt: String) -> Result<String, AppError>;
}

/// Chat-completions backed generator for any OpenAI-compatible endpoint.
pub struct OpenAiGenerator {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &AppConfig, client: Arc<Client<OpenAIConfig>>) -> Self {
        Self::new(client, config.query_model.clone())
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: String) -> Result<String, AppError> {
        let request = create_chat_request(&self.model, prompt)
            .map_err(|err| AppError::GenerationFailure(err.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|err| AppError::GenerationFailure(err.to_string()))?;

        let answer = process_llm_response(response)?;
        debug!(answer_chars = answer.chars().count(), "Received answer");
        Ok(answer)
    }
}

pub fn create_chat_request(
    model: &str,
    prompt: String,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([ChatCompletionRequestUserMessage::from(prompt).into()])
        .build()
}

pub fn process_llm_response(response: CreateChatCompletionResponse) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AppError::GenerationFailure("No content found in LLM response".into()))
}

/// Prompt for a question answered from retrieved passages. Passages are
/// numbered in the order given.
pub fn build_context_prompt(question: &str, passages: &[RetrievedPassage]) -> String {
    let context = passages
        .iter()
        .enumerate()
        .map(|(position, passage)| {
            format!("Passage {}: {}", position.saturating_add(1), passage.text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a helpful assistant. Answer the question using the context below. \
         If the context does not contain the answer, reply exactly: \"{INSUFFICIENT_CONTEXT_REPLY}\"\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

/// Prompt for a question asked without any uploaded document.
pub fn build_direct_prompt(question: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the following question.\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}
