//! Embedding clients.
//!
//! The `Embedder` trait abstracts over embedding generation.
//! Implementations:
//! - `OpenAiEmbedder`: OpenAI-compatible `/v1/embeddings`
//! - `GeminiEmbedder`: Google `embedContent` (`embedding-001`, 768-dim)
//! - `UnavailableEmbedder`: no credentials; every call fails with a config error

use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use navigator_core::{Error, Result};

pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "embedding-001";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a text string.
    async fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Short provider name for logs and status output.
    fn name(&self) -> &str;

    /// Check if the embedder can serve requests.
    fn is_available(&self) -> bool {
        true
    }
}

/// Resolved embedding provider with credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingProvider {
    OpenAI { api_key: String, model: String },
    Gemini { api_key: String, model: String },
}

/// Create the embedder for the resolved provider, or a placeholder that
/// reports the missing configuration on use.
pub fn create_embedder(client: Client, provider: Option<EmbeddingProvider>) -> Arc<dyn Embedder> {
    match provider {
        Some(EmbeddingProvider::OpenAI { api_key, model }) => {
            info!("Using OpenAI embeddings (model={})", model);
            Arc::new(OpenAiEmbedder::new(client, api_key, model))
        }
        Some(EmbeddingProvider::Gemini { api_key, model }) => {
            info!("Using Gemini embeddings (model={})", model);
            Arc::new(GeminiEmbedder::new(client, api_key, model))
        }
        None => {
            warn!("No embedding provider configured. Retrieval requests will fail.");
            Arc::new(UnavailableEmbedder)
        }
    }
}

/// Placeholder embedder used when no provider key is configured.
pub struct UnavailableEmbedder;

#[async_trait]
impl Embedder for UnavailableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Array1<f32>> {
        Err(Error::Config("No embedding provider configured".into()))
    }

    fn dimension(&self) -> usize {
        0
    }

    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.into(),
            api_key,
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        debug!("Embedding {} chars with {}", text.len(), self.model);
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| Error::Retrieval(format!("Embedding request failed: {}", e)))?;

        let body = read_json(response).await?;
        parse_vector(&body["data"][0]["embedding"])
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Google Generative Language `embedContent` endpoint.
pub struct GeminiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url: GEMINI_BASE_URL.into(),
            api_key,
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        debug!("Embedding {} chars with {}", text.len(), self.model);
        let response = self
            .client
            .post(format!("{}/models/{}:embedContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "model": format!("models/{}", self.model),
                "content": { "parts": [{ "text": text }] },
            }))
            .send()
            .await
            .map_err(|e| Error::Retrieval(format!("Embedding request failed: {}", e)))?;

        let body = read_json(response).await?;
        parse_vector(&body["embedding"]["values"])
    }

    fn dimension(&self) -> usize {
        768
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Retrieval(format!(
            "Embedding API error {}: {}",
            status, body
        )));
    }
    response
        .json()
        .await
        .map_err(|e| Error::Retrieval(format!("Invalid embedding response: {}", e)))
}

fn parse_vector(value: &serde_json::Value) -> Result<Array1<f32>> {
    let values = value
        .as_array()
        .ok_or_else(|| Error::Retrieval("Embedding response has no vector".into()))?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::Retrieval("Embedding contains a non-numeric value".into()))
        })
        .collect::<Result<Vec<f32>>>()
        .map(Array1::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        let v = parse_vector(&json!([0.5, -1.0, 2])).unwrap();
        assert_eq!(v.to_vec(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_vector_rejects_garbage() {
        assert!(matches!(
            parse_vector(&json!({"oops": true})),
            Err(Error::Retrieval(_))
        ));
        assert!(matches!(
            parse_vector(&json!([0.1, "x"])),
            Err(Error::Retrieval(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_embedder_reports_config_error() {
        let embedder = create_embedder(Client::new(), None);
        assert!(!embedder.is_available());
        let err = embedder.embed("hi").await.unwrap_err();
        assert_eq!(err.status(), 503);
    }
}
