//! In-memory vector store with a pre-normalized embedding matrix.

use std::path::Path;

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use tracing::{info, warn};

use navigator_core::{Error, Result};

use crate::embedder::Embedder;
use crate::types::{RetrievedDocument, StoredDocument};
use crate::vector_store::VectorStore;

/// Cosine-similarity search over documents held in memory.
#[derive(Default)]
pub struct InMemoryStore {
    documents: Vec<RetrievedDocument>,
    /// One L2-normalized row per document, same order as `documents`.
    matrix: Array2<f32>,
}

impl InMemoryStore {
    /// Build a store from documents that all carry embeddings of one dimension.
    pub fn from_documents(stored: Vec<StoredDocument>) -> Result<Self> {
        let mut documents = Vec::with_capacity(stored.len());
        let mut flat = Vec::new();
        let mut dim = None;

        for doc in stored {
            let embedding = doc.embedding.ok_or_else(|| {
                Error::Retrieval("Document is missing an embedding".into())
            })?;
            match dim {
                None => dim = Some(embedding.len()),
                Some(d) if d != embedding.len() => {
                    return Err(Error::Retrieval(format!(
                        "Embedding dimension mismatch: expected {}, got {}",
                        d,
                        embedding.len()
                    )));
                }
                Some(_) => {}
            }
            flat.extend(normalize(Array1::from(embedding)).iter().copied());
            documents.push(RetrievedDocument::new(doc.content, doc.metadata));
        }

        let matrix = Array2::from_shape_vec((documents.len(), dim.unwrap_or(0)), flat)
            .map_err(|e| Error::Internal(format!("Matrix build failed: {}", e)))?;

        Ok(Self { documents, matrix })
    }

    /// Load `documents.json`, embedding any document stored without a vector.
    pub async fn load(path: &Path, embedder: &dyn Embedder) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut stored: Vec<StoredDocument> = serde_json::from_str(&raw)?;

        let mut ready = Vec::with_capacity(stored.len());
        for mut doc in stored.drain(..) {
            if doc.embedding.is_none() {
                match embedder.embed(&doc.content).await {
                    Ok(v) => doc.embedding = Some(v.to_vec()),
                    Err(e) => {
                        warn!("Skipping document that could not be embedded: {}", e);
                        continue;
                    }
                }
            }
            ready.push(doc);
        }

        let store = Self::from_documents(ready)?;
        info!(
            "Loaded {} documents from {}",
            store.documents.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn similarity_search(
        &self,
        embedding: &Array1<f32>,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        if self.documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != self.matrix.ncols() {
            return Err(Error::Retrieval(format!(
                "Query dimension {} does not match store dimension {}",
                embedding.len(),
                self.matrix.ncols()
            )));
        }

        let q_norm = embedding.dot(embedding).sqrt();
        if q_norm < 1e-9 {
            return Ok(Vec::new());
        }
        let q = embedding / q_norm;

        // (N, dim) @ (dim,) → (N,)
        let similarities = self.matrix.dot(&q);

        let mut indexed: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        indexed.truncate(k);

        Ok(indexed
            .into_iter()
            .map(|(i, score)| {
                let mut doc = self.documents[i].clone();
                doc.similarity = Some(score as f64);
                doc
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm < 1e-9 {
        v
    } else {
        v / norm
    }
}
