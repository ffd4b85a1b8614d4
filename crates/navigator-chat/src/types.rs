//! Chat types matching the browser client's API surface.

use serde::{Deserialize, Serialize};

use crate::tools::InvokeOptions;

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    Groq,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Groq => write!(f, "groq"),
        }
    }
}

/// Speaker of a chat message. Unknown roles are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Other(name) => name,
        }
    }
}

/// Chat message in conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Body of `POST /api/chat/retrieval`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrievalRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Body of `POST /api/tools/weather`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolInvokeRequest {
    pub input: String,
    #[serde(flatten)]
    pub options: InvokeOptions,
}

/// Chat status response.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStatus {
    #[serde(rename = "llmAvailable")]
    pub llm_available: bool,
    #[serde(rename = "llmProvider")]
    pub llm_provider: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "embeddingProvider")]
    pub embedding_provider: Option<String>,
    #[serde(rename = "vectorStore")]
    pub vector_store: String,
    #[serde(rename = "vectorStoreAvailable")]
    pub vector_store_available: bool,
    #[serde(rename = "documentCount")]
    pub document_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_roundtrip_keeps_unknown_roles() {
        let messages: Vec<ChatMessage> = serde_json::from_value(json!([
            {"role": "user", "content": "hi"},
            {"role": "function", "content": "{}"},
        ]))
        .unwrap();
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Other("function".into()));
        assert_eq!(
            serde_json::to_value(&messages[1]).unwrap(),
            json!({"role": "function", "content": "{}"})
        );
    }

    #[test]
    fn test_retrieval_request_defaults_to_empty() {
        let req: RetrievalRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.messages.is_empty());
    }

    #[test]
    fn test_tool_request_options() {
        let req: ToolInvokeRequest = serde_json::from_value(json!({
            "input": "weather in Austin TX",
            "forceStructuredOutput": true,
        }))
        .unwrap();
        assert!(req.options.force_structured_output);

        let req: ToolInvokeRequest =
            serde_json::from_value(json!({"input": "weather in Austin TX"})).unwrap();
        assert!(!req.options.force_structured_output);
    }
}
