//! Shared application state.

use std::sync::Arc;

use navigator_chat::providers::create_chat_model;
use navigator_chat::tools::weather::{self, Weather};
use navigator_chat::{ChatModel, LLMConfig, RetrievalPipeline, ToolPipeline};
use navigator_core::config::DEFAULT_TOP_K;
use navigator_core::NavigatorConfig;
use navigator_store::{create_embedder, create_vector_store, Embedder, VectorStore};

/// Shared application state accessible from all route handlers.
///
/// Holds only long-lived clients. Every request builds its own pipeline, so
/// no conversation data is shared between requests.
pub struct AppState {
    pub model: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub top_k: usize,
}

impl AppState {
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            model,
            embedder,
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Wire up provider clients from configuration. Missing credentials
    /// yield placeholder clients that fail per request.
    pub async fn from_config(config: &NavigatorConfig, llm_config: &LLMConfig) -> Self {
        let client = reqwest::Client::new();
        let model = create_chat_model(
            client.clone(),
            llm_config.resolve_provider(),
            llm_config.max_tokens,
        );
        let embedder = create_embedder(client.clone(), llm_config.resolve_embeddings());
        let store = create_vector_store(client, config, embedder.as_ref()).await;

        Self::new(model, embedder, store).with_top_k(config.top_k)
    }

    pub fn retrieval_pipeline(&self) -> RetrievalPipeline {
        RetrievalPipeline::new(self.model.clone(), self.embedder.clone(), self.store.clone())
            .with_top_k(self.top_k)
    }

    pub fn weather_pipeline(&self) -> ToolPipeline<Weather> {
        weather::pipeline(self.model.clone())
    }
}
