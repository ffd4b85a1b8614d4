//! Document types shared by the stores and the retrieval pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document returned by a similarity search. Lives for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl RetrievedDocument {
    pub fn new(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            metadata,
            similarity: None,
        }
    }
}

/// A document as persisted for the in-memory store (`documents.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Precomputed embedding. Missing embeddings are filled in at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Normalize a PostgREST `metadata` column, which may be null or non-object.
pub(crate) fn metadata_object(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
