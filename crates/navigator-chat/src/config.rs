//! LLM configuration loading and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use navigator_store::embedder::{DEFAULT_GEMINI_EMBEDDING_MODEL, DEFAULT_OPENAI_EMBEDDING_MODEL};
use navigator_store::EmbeddingProvider;

use crate::types::LLMProvider;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_MAX_TOKENS: usize = 2048;

/// Stored LLM configuration (read from llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default = "default_preferred")]
    pub embedding_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_openai_embedding_model")]
    pub openai_embedding_model: String,
    #[serde(default = "default_gemini_embedding_model")]
    pub gemini_embedding_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_openai_embedding_model() -> String {
    DEFAULT_OPENAI_EMBEDDING_MODEL.into()
}
fn default_gemini_embedding_model() -> String {
    DEFAULT_GEMINI_EMBEDDING_MODEL.into()
}
fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "auto".into(),
            embedding_provider: "auto".into(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            google_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.into(),
            groq_model: DEFAULT_GROQ_MODEL.into(),
            openai_embedding_model: DEFAULT_OPENAI_EMBEDDING_MODEL.into(),
            gemini_embedding_model: DEFAULT_GEMINI_EMBEDDING_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            config_path: PathBuf::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`LLMConfig::load`] with an injectable variable source.
    pub fn load_with<F>(config_path: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: LLMConfig = match std::fs::read_to_string(config_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => LLMConfig::default(),
        };

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for API keys
        if config.openai_api_key.is_none() {
            config.openai_api_key = lookup("OPENAI_API_KEY");
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = lookup("ANTHROPIC_API_KEY");
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = lookup("GROQ_API_KEY");
        }
        if config.google_api_key.is_none() {
            config.google_api_key = lookup("GOOGLE_API_KEY");
        }
        if let Some(p) = lookup("LLM_PROVIDER") {
            config.preferred_provider = p;
        }

        info!(
            "LLM config loaded (preferred={}, embeddings={})",
            config.preferred_provider, config.embedding_provider
        );
        config
    }

    /// Resolve which chat provider and model to use.
    pub fn resolve_provider(&self) -> Option<(LLMProvider, String, String)> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return match self.preferred_provider.as_str() {
                "openai" => self
                    .openai_api_key
                    .as_ref()
                    .map(|k| (LLMProvider::OpenAI, self.openai_model.clone(), k.clone())),
                "anthropic" => self
                    .anthropic_api_key
                    .as_ref()
                    .map(|k| (LLMProvider::Anthropic, self.anthropic_model.clone(), k.clone())),
                "groq" => self
                    .groq_api_key
                    .as_ref()
                    .map(|k| (LLMProvider::Groq, self.groq_model.clone(), k.clone())),
                _ => None,
            };
        }

        // Auto mode: Anthropic > Groq > OpenAI
        if let Some(k) = &self.anthropic_api_key {
            return Some((LLMProvider::Anthropic, self.anthropic_model.clone(), k.clone()));
        }
        if let Some(k) = &self.groq_api_key {
            return Some((LLMProvider::Groq, self.groq_model.clone(), k.clone()));
        }
        if let Some(k) = &self.openai_api_key {
            return Some((LLMProvider::OpenAI, self.openai_model.clone(), k.clone()));
        }

        None
    }

    /// Resolve the embedding provider. Auto mode prefers Gemini, then OpenAI.
    pub fn resolve_embeddings(&self) -> Option<EmbeddingProvider> {
        let gemini = || {
            self.google_api_key.as_ref().map(|k| EmbeddingProvider::Gemini {
                api_key: k.clone(),
                model: self.gemini_embedding_model.clone(),
            })
        };
        let openai = || {
            self.openai_api_key.as_ref().map(|k| EmbeddingProvider::OpenAI {
                api_key: k.clone(),
                model: self.openai_embedding_model.clone(),
            })
        };

        match self.embedding_provider.as_str() {
            "gemini" => gemini(),
            "openai" => openai(),
            "auto" => gemini().or_else(openai),
            _ => None,
        }
    }
}
