//! Retrieval chat routes: the answer is streamed as plain text, with the
//! message index and a source manifest carried in response headers.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use navigator_chat::sources::encode_sources_header;
use navigator_chat::types::{ChatStatus, RetrievalRequest};
use navigator_core::Error;

use crate::error::ApiError;
use crate::state::AppState;

pub const MESSAGE_INDEX_HEADER: &str = "x-message-index";
pub const SOURCES_HEADER: &str = "x-sources";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/retrieval", post(retrieval))
        .route("/chat/status", get(get_status))
}

async fn retrieval(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let span = info_span!("retrieval", request_id = %Uuid::new_v4());
    stream_answer(state, body).instrument(span).await
}

async fn stream_answer(state: Arc<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: RetrievalRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))?;
    info!(messages = request.messages.len(), "Retrieval request");

    let result = state.retrieval_pipeline().run(request.messages).await?;
    let sources = encode_sources_header(&result.documents)?;

    // The body outlives this span, so carry it along for mid-stream failures.
    let span = Span::current();
    let answer = result.answer.map(move |chunk| {
        if let Err(e) = &chunk {
            span.in_scope(|| error!("Answer stream aborted: {}", e));
        }
        chunk
    });

    Response::builder()
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(MESSAGE_INDEX_HEADER, result.message_index.to_string())
        .header(SOURCES_HEADER, sources)
        .body(Body::from_stream(answer))
        .map_err(|e| ApiError(Error::Internal(format!("Failed to build response: {}", e))))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<ChatStatus> {
    let document_count = match state.store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Vector store count failed: {}", e);
            None
        }
    };

    let llm_available = state.model.is_available();
    Json(ChatStatus {
        llm_available,
        llm_provider: llm_available.then(|| state.model.provider_name().to_string()),
        model: llm_available.then(|| state.model.model_name().to_string()),
        embedding_provider: state
            .embedder
            .is_available()
            .then(|| state.embedder.name().to_string()),
        vector_store: state.store.name().to_string(),
        vector_store_available: document_count.is_some(),
        document_count,
    })
}
