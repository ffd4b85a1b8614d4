//! The vector store seam and its factory.

use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use tracing::{info, warn};

use navigator_core::{NavigatorConfig, Result};

use crate::embedder::Embedder;
use crate::memory::InMemoryStore;
use crate::supabase::SupabaseStore;
use crate::types::RetrievedDocument;

/// Nearest-neighbour document lookup.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `k` documents ordered by descending similarity.
    async fn similarity_search(
        &self,
        embedding: &Array1<f32>,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Total number of stored documents.
    async fn count(&self) -> Result<usize>;

    /// Short backend name for logs and status output.
    fn name(&self) -> &str;
}

/// Build the configured store: Supabase when credentials are present,
/// otherwise the in-memory store seeded from the documents file.
pub async fn create_vector_store(
    client: Client,
    config: &NavigatorConfig,
    embedder: &dyn Embedder,
) -> Arc<dyn VectorStore> {
    if let Some(settings) = &config.supabase {
        info!(
            "Using Supabase vector store (table={}, query={})",
            settings.table, settings.query_name
        );
        return Arc::new(SupabaseStore::new(client, settings.clone()));
    }

    let path = config.documents_file();
    let store = if path.exists() {
        match InMemoryStore::load(path, embedder).await {
            Ok(store) => store,
            Err(e) => {
                warn!("Failed to load {}: {}. Starting empty.", path.display(), e);
                InMemoryStore::default()
            }
        }
    } else {
        info!("No documents file at {}. Starting empty.", path.display());
        InMemoryStore::default()
    };
    Arc::new(store)
}
