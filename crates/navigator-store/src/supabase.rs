//! Supabase vector store over PostgREST.
//!
//! Similarity search calls the `match_documents` stored procedure; the
//! document count uses an exact-count HEAD request against the table.

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::header::{HeaderMap, CONTENT_RANGE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use navigator_core::{Error, Result, SupabaseSettings};

use crate::types::{metadata_object, RetrievedDocument};
use crate::vector_store::VectorStore;

pub struct SupabaseStore {
    client: Client,
    settings: SupabaseSettings,
}

/// Row shape returned by `match_documents`.
#[derive(Debug, Deserialize)]
struct MatchRow {
    content: Option<String>,
    metadata: Option<serde_json::Value>,
    similarity: Option<f64>,
}

impl SupabaseStore {
    pub fn new(client: Client, settings: SupabaseSettings) -> Self {
        Self { client, settings }
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.settings.private_key)
            .bearer_auth(&self.settings.private_key)
    }
}

#[async_trait]
impl VectorStore for SupabaseStore {
    async fn similarity_search(
        &self,
        embedding: &Array1<f32>,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let url = format!(
            "{}/rest/v1/rpc/{}",
            self.settings.url, self.settings.query_name
        );
        debug!("Calling {} with match_count={}", url, k);

        let response = self
            .auth(self.client.post(&url))
            .json(&json!({
                "query_embedding": embedding.to_vec(),
                "match_count": k,
                "filter": {},
            }))
            .send()
            .await
            .map_err(|e| Error::Retrieval(format!("Vector store request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Retrieval(format!(
                "Vector store error {}: {}",
                status, body
            )));
        }

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .map_err(|e| Error::Retrieval(format!("Invalid vector store response: {}", e)))?;

        Ok(rows
            .into_iter()
            .take(k)
            .map(|row| RetrievedDocument {
                content: row.content.unwrap_or_default(),
                metadata: metadata_object(row.metadata),
                similarity: row.similarity,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let url = format!("{}/rest/v1/{}?select=*", self.settings.url, self.settings.table);
        let response = self
            .auth(self.client.head(&url))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| Error::Retrieval(format!("Count request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Retrieval(format!(
                "Count request returned {}",
                response.status()
            )));
        }

        parse_content_range(response.headers())
            .ok_or_else(|| Error::Retrieval("Missing Content-Range count".into()))
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

/// Extract the total from `Content-Range: 0-24/3573` or `*/0`.
fn parse_content_range(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_content_range() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-24/3573"));
        assert_eq!(parse_content_range(&headers), Some(3573));

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("*/0"));
        assert_eq!(parse_content_range(&headers), Some(0));

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("*/*"));
        assert_eq!(parse_content_range(&headers), None);
    }

    #[test]
    fn test_match_row_tolerates_null_metadata() {
        let rows: Vec<MatchRow> = serde_json::from_value(json!([
            {"id": 1, "content": "a", "metadata": null, "similarity": 0.9},
            {"id": 2, "content": "b", "metadata": {"page": 3}},
        ]))
        .unwrap();
        assert!(metadata_object(rows[0].metadata.clone()).is_empty());
        assert_eq!(metadata_object(rows[1].metadata.clone())["page"], json!(3));
        assert_eq!(rows[1].similarity, None);
    }
}
