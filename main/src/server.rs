use std::{sync::Arc, time::Duration};

use api_router::{api_routes_v1, api_state::ApiState};
use async_openai::{config::OpenAIConfig, Client};
use axum::Router;
use common::{
    storage::session_store::SessionStore,
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::{
    answer_retrieval::{AnswerGenerator, OpenAiGenerator},
    reranking::{Reranker, SharedReranker},
    RetrievalPipeline,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let openai_client = Arc::new(Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let embedding_provider = Arc::new(
        EmbeddingProvider::from_config(&config, Some(Arc::clone(&openai_client))).await?,
    );
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    // Built lazily on the first rerank, shared by every session.
    let reranker =
        SharedReranker::maybe_from_config(&config).map(|shared| shared as Arc<dyn Reranker>);
    info!(reranking_enabled = reranker.is_some(), "Reranker handle ready");

    let sessions = Arc::new(SessionStore::from_config(&config));
    let ingestion = Arc::new(IngestionPipeline::new(
        &config,
        Arc::clone(&embedding_provider),
    ));
    let retrieval = Arc::new(RetrievalPipeline::from_app_config(
        &config,
        embedding_provider,
        reranker,
    ));
    let generator: Arc<dyn AnswerGenerator> =
        Arc::new(OpenAiGenerator::from_config(&config, openai_client));

    let api_state = ApiState::new(
        &config,
        Arc::clone(&sessions),
        ingestion,
        retrieval,
        generator,
    );

    let shutdown = CancellationToken::new();
    let sweeper = sessions.spawn_sweeper(
        Duration::from_secs(config.session_sweep_interval_secs),
        shutdown.clone(),
    );

    let app = build_router(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(err) = sweeper.await {
        error!("Session sweeper ended abnormally: {}", err);
    }
    info!("Server stopped");

    Ok(())
}

fn build_router(api_state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(api_state)
}

/// Resolves on Ctrl-C or when `shutdown` is cancelled elsewhere, and
/// cancels `shutdown` either way.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(err) => {
                error!("Failed to listen for Ctrl-C: {}", err);
                shutdown.cancelled().await;
            }
        },
        () = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use common::{error::AppError, utils::config::AppConfig};
    use retrieval_pipeline::reranking::{RerankError, RerankHit};
    use serde_json::Value;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docqa-test-boundary";

    /// Records every prompt and answers with a fixed string.
    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnswerGenerator for RecordingGenerator {
        async fn generate(&self, prompt: String) -> Result<String, AppError> {
            self.prompts.lock().await.push(prompt);
            Ok("generated answer".to_string())
        }
    }

    struct UnavailableReranker;

    #[async_trait]
    impl Reranker for UnavailableReranker {
        async fn rerank(
            &self,
            _query: &str,
            _candidates: Vec<String>,
            _top_k: usize,
        ) -> Result<Vec<RerankHit>, RerankError> {
            Err(RerankError::Unavailable("model not downloaded".to_string()))
        }
    }

    struct TestApp {
        router: Router,
        sessions: Arc<SessionStore>,
        generator: Arc<RecordingGenerator>,
    }

    fn test_config() -> AppConfig {
        AppConfig {
            openai_api_key: "test-key".into(),
            openai_base_url: "https://example.com".into(),
            http_port: 0,
            chunk_size: 12,
            chunk_overlap: 2,
            ..Default::default()
        }
    }

    fn test_app(config: &AppConfig) -> TestApp {
        // Use hashed embeddings for tests to avoid external dependencies
        let embedding_provider = Arc::new(
            EmbeddingProvider::new_hashed(64).expect("failed to create hashed embedding provider"),
        );
        let sessions = Arc::new(SessionStore::from_config(config));
        let generator = Arc::new(RecordingGenerator::default());
        let api_state = ApiState::new(
            config,
            Arc::clone(&sessions),
            Arc::new(IngestionPipeline::new(config, Arc::clone(&embedding_provider))),
            Arc::new(RetrievalPipeline::from_app_config(
                config,
                embedding_provider,
                Some(Arc::new(UnavailableReranker) as Arc<dyn Reranker>),
            )),
            Arc::clone(&generator) as Arc<dyn AnswerGenerator>,
        );

        TestApp {
            router: build_router(api_state),
            sessions,
            generator,
        }
    }

    fn upload_request(file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn chat_request(payload: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn upload_notes(app: &TestApp) -> (String, u64) {
        let text = "向量检索按距离排序。重排序模型提升精度。会话两小时后过期。上传的文件不会保存。";
        let response = app
            .router
            .clone()
            .oneshot(upload_request("notes.txt", "text/plain", text.as_bytes()))
            .await
            .expect("upload response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let session_id = body["session_id"].as_str().expect("session id").to_string();
        let chunk_count = body["chunk_count"].as_u64().expect("chunk count");
        (session_id, chunk_count)
    }

    #[tokio::test]
    async fn probes_respond() {
        let app = test_app(&test_config());

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
        assert_eq!(json_body(ready_response).await["active_sessions"], 0);
    }

    #[tokio::test]
    async fn upload_then_chat_uses_retrieved_context() {
        let app = test_app(&test_config());

        let (session_id, chunk_count) = upload_notes(&app).await;
        assert_eq!(chunk_count, 4);
        assert!(app.sessions.contains(&session_id).await);

        let response = app
            .router
            .clone()
            .oneshot(chat_request(&serde_json::json!({
                "question": "会话多久过期？",
                "session_id": session_id,
            })))
            .await
            .expect("chat response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["answer"], "generated answer");

        let prompts = app.generator.prompts.lock().await;
        let prompt = prompts.first().expect("prompt sent to generator");
        assert!(prompt.contains("Passage 1:"));
        assert!(prompt.contains("Passage 3:"));
        assert!(!prompt.contains("Passage 4:"));
        assert!(prompt.contains("Question: 会话多久过期？"));
    }

    #[tokio::test]
    async fn chat_without_session_asks_directly() {
        let app = test_app(&test_config());

        let response = app
            .router
            .clone()
            .oneshot(chat_request(&serde_json::json!({ "question": "你好" })))
            .await
            .expect("chat response");

        assert_eq!(response.status(), StatusCode::OK);
        let prompts = app.generator.prompts.lock().await;
        assert!(prompts
            .first()
            .is_some_and(|prompt| !prompt.contains("Context:")));
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = test_app(&test_config());

        let response = app
            .router
            .oneshot(chat_request(&serde_json::json!({
                "question": "anything",
                "session_id": "does-not-exist",
            })))
            .await
            .expect("chat response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["error"]
            .as_str()
            .is_some_and(|message| message.contains("does-not-exist")));
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let app = test_app(&test_config());

        let response = app
            .router
            .oneshot(chat_request(&serde_json::json!({ "question": "   " })))
            .await
            .expect("chat response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_upload_is_415() {
        let app = test_app(&test_config());

        let response = app
            .router
            .oneshot(upload_request("photo.png", "image/png", b"\x89PNG"))
            .await
            .expect("upload response");

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(app.sessions.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let config = AppConfig {
            max_upload_bytes: 8,
            ..test_config()
        };
        let app = test_app(&config);

        let response = app
            .router
            .oneshot(upload_request(
                "notes.txt",
                "text/plain",
                b"this file is larger than eight bytes",
            ))
            .await
            .expect("upload response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.sessions.is_empty().await);
    }

    #[tokio::test]
    async fn empty_document_still_opens_a_session() {
        let app = test_app(&test_config());

        let response = app
            .router
            .clone()
            .oneshot(upload_request("empty.md", "text/markdown", b""))
            .await
            .expect("upload response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["chunk_count"], 0);
        let session_id = body["session_id"].as_str().expect("session id").to_string();

        let response = app
            .router
            .oneshot(chat_request(&serde_json::json!({
                "question": "anything?",
                "session_id": session_id,
            })))
            .await
            .expect("chat response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deleted_session_is_gone() {
        let app = test_app(&test_config());
        let (session_id, _) = upload_notes(&app).await;

        let delete = |id: String| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/sessions/{id}"))
                .body(Body::empty())
                .expect("request")
        };

        let response = app
            .router
            .clone()
            .oneshot(delete(session_id.clone()))
            .await
            .expect("delete response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .router
            .clone()
            .oneshot(delete(session_id.clone()))
            .await
            .expect("delete response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .router
            .oneshot(chat_request(&serde_json::json!({
                "question": "还在吗？",
                "session_id": session_id,
            })))
            .await
            .expect("chat response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shutdown_signal_resolves_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), shutdown_signal(token.clone()))
            .await
            .expect("shutdown future resolves");
        assert!(token.is_cancelled());
    }
}
