//! Checkpoints of the retrieval pipeline, reported to an observer.

use tracing::{debug, info};

use navigator_store::RetrievedDocument;

/// Receives pipeline checkpoints. Never affects control flow.
pub trait RetrievalObserver: Send + Sync {
    fn standalone_question(&self, _question: &str) {}

    fn documents_retrieved(&self, _documents: &[RetrievedDocument]) {}

    fn answer_started(&self, _context_chars: usize) {}
}

/// Default observer: structured `tracing` events.
pub struct TracingObserver;

impl RetrievalObserver for TracingObserver {
    fn standalone_question(&self, question: &str) {
        info!(question, "Standalone question for retrieval");
    }

    fn documents_retrieved(&self, documents: &[RetrievedDocument]) {
        info!(count = documents.len(), "Retrieved documents");
        if documents.is_empty() {
            info!("No documents found in vector store");
        }
        for (i, doc) in documents.iter().enumerate() {
            let preview: String = doc.content.chars().take(100).collect();
            debug!(
                index = i + 1,
                similarity = doc.similarity,
                metadata = %serde_json::Value::Object(doc.metadata.clone()),
                "Doc: {}...",
                preview
            );
        }
    }

    fn answer_started(&self, context_chars: usize) {
        debug!(context_chars, "Answer stream started");
    }
}
