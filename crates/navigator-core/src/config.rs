//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_TABLE: &str = "documents";
pub const DEFAULT_QUERY_NAME: &str = "match_documents";

/// Paths to Navigator data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
    /// Documents for the in-memory vector store (`data/documents.json`).
    pub documents_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the root if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            llm_config_file: root.join("llm-config.json"),
            documents_file: root.join("documents.json"),
            root,
        })
    }
}

/// Connection settings for a Supabase (PostgREST) vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseSettings {
    pub url: String,
    #[serde(skip_serializing)]
    pub private_key: String,
    pub table: String,
    pub query_name: String,
}

/// Top-level Navigator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Number of documents fetched per retrieval.
    pub top_k: usize,
    /// Supabase store, when `SUPABASE_URL` and `SUPABASE_PRIVATE_KEY` are set.
    pub supabase: Option<SupabaseSettings>,
    /// Override for the in-memory store's document file.
    pub vector_store_file: Option<PathBuf>,
}

impl NavigatorConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`NavigatorConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> std::io::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT);
        let top_k = parse_or(&lookup, "RETRIEVAL_TOP_K", DEFAULT_TOP_K).max(1);

        let supabase = match (lookup("SUPABASE_URL"), lookup("SUPABASE_PRIVATE_KEY")) {
            (Some(url), Some(private_key)) if !url.is_empty() && !private_key.is_empty() => {
                Some(SupabaseSettings {
                    url: url.trim_end_matches('/').to_string(),
                    private_key,
                    table: lookup("SUPABASE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.into()),
                    query_name: lookup("SUPABASE_QUERY_NAME")
                        .unwrap_or_else(|| DEFAULT_QUERY_NAME.into()),
                })
            }
            _ => None,
        };

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            top_k,
            supabase,
            vector_store_file: lookup("VECTOR_STORE_FILE").map(PathBuf::from),
        })
    }

    /// Document file used by the in-memory store.
    pub fn documents_file(&self) -> &Path {
        self.vector_store_file
            .as_deref()
            .unwrap_or(&self.data_paths.documents_file)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data");
        let config = NavigatorConfig::from_lookup(&dir, lookup_from(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert!(config.supabase.is_none());
        assert_eq!(config.documents_file(), dir.join("documents.json"));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_supabase_requires_both_values() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data");
        let partial =
            NavigatorConfig::from_lookup(&dir, lookup_from(&[("SUPABASE_URL", "https://x.co")]))
                .unwrap();
        assert!(partial.supabase.is_none());

        let full = NavigatorConfig::from_lookup(
            &dir,
            lookup_from(&[
                ("SUPABASE_URL", "https://x.supabase.co/"),
                ("SUPABASE_PRIVATE_KEY", "secret"),
            ]),
        )
        .unwrap();
        let supabase = full.supabase.unwrap();
        assert_eq!(supabase.url, "https://x.supabase.co");
        assert_eq!(supabase.table, "documents");
        assert_eq!(supabase.query_name, "match_documents");
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data");
        let config = NavigatorConfig::from_lookup(
            &dir,
            lookup_from(&[("PORT", "not-a-port"), ("RETRIEVAL_TOP_K", "0")]),
        )
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.top_k, 1);
    }
}
