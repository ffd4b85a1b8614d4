//! Source manifest sent alongside a streamed answer for citation display.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use navigator_core::Result;
use navigator_store::RetrievedDocument;

/// Characters of document content kept in each manifest entry.
pub const SOURCE_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    #[serde(rename = "pageContent")]
    pub page_content: String,
    pub metadata: Map<String, Value>,
}

impl From<&RetrievedDocument> for SourceEntry {
    fn from(doc: &RetrievedDocument) -> Self {
        let preview: String = doc.content.chars().take(SOURCE_PREVIEW_CHARS).collect();
        Self {
            page_content: format!("{}...", preview),
            metadata: doc.metadata.clone(),
        }
    }
}

pub fn source_manifest(documents: &[RetrievedDocument]) -> Vec<SourceEntry> {
    documents.iter().map(SourceEntry::from).collect()
}

/// Base64-encoded JSON manifest, suitable for an `x-sources` header.
pub fn encode_sources_header(documents: &[RetrievedDocument]) -> Result<String> {
    let json = serde_json::to_vec(&source_manifest(documents))?;
    Ok(BASE64.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(content: &str, metadata: Value) -> RetrievedDocument {
        let Value::Object(map) = metadata else {
            panic!("metadata must be an object");
        };
        RetrievedDocument::new(content, map)
    }

    fn decode(header: &str) -> Vec<SourceEntry> {
        serde_json::from_slice(&BASE64.decode(header).unwrap()).unwrap()
    }

    #[test]
    fn test_short_content_still_gets_ellipsis() {
        let docs = vec![doc("GymNavigator is a gym management app.", json!({"id": 1}))];
        let header = encode_sources_header(&docs).unwrap();
        let decoded: Value = serde_json::from_slice(&BASE64.decode(&header).unwrap()).unwrap();
        assert_eq!(
            decoded,
            json!([{"pageContent": "GymNavigator is a gym management app....", "metadata": {"id": 1}}])
        );
    }

    #[test]
    fn test_long_content_truncated_to_fifty_chars() {
        let long = "x".repeat(200);
        let entries = decode(&encode_sources_header(&[doc(&long, json!({}))]).unwrap());
        assert_eq!(entries[0].page_content.chars().count(), SOURCE_PREVIEW_CHARS + 3);
        assert!(entries[0].page_content.ends_with("..."));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let content = "ü".repeat(60);
        let entry = SourceEntry::from(&doc(&content, json!({})));
        assert_eq!(entry.page_content, format!("{}...", "ü".repeat(50)));
    }

    #[test]
    fn test_manifest_length_matches_documents() {
        for n in 0..5 {
            let docs: Vec<_> = (0..n)
                .map(|i| doc(&format!("document {}", i), json!({"id": i})))
                .collect();
            let entries = decode(&encode_sources_header(&docs).unwrap());
            assert_eq!(entries.len(), n);
            assert!(entries
                .iter()
                .all(|e| e.page_content.chars().count() <= SOURCE_PREVIEW_CHARS + 3));
        }
    }
}
