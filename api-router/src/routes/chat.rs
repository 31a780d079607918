use axum::{extract::State, Json};
use retrieval_pipeline::answer_retrieval::{build_context_prompt, build_direct_prompt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

/// Answers a question, grounded in the session's document when a session id
/// is given and directly otherwise.
pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::ValidationError(
            "Question must not be empty".to_string(),
        ));
    }

    let session_id = request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let prompt = if let Some(session_id) = session_id {
        let record = state.sessions.touch_and_get(session_id).await?;
        let outcome = state
            .retrieval
            .retrieve_with_outcome(&record.document, question, state.config.retrieval_k)
            .await?;
        info!(
            %session_id,
            ranking = ?outcome.ranking,
            candidates = outcome.candidate_count,
            "Retrieved context"
        );

        let context: Vec<_> = outcome
            .passages
            .into_iter()
            .take(state.config.context_passages)
            .collect();
        build_context_prompt(question, &context)
    } else {
        debug!("No session given; asking the model directly");
        build_direct_prompt(question)
    };

    let answer = state.generator.generate(prompt).await?;

    Ok(Json(ChatResponse { answer }))
}
