//! External LLM provider streaming implementations.
//!
//! Each provider streams chunks via SSE from their respective APIs.
//! OpenAI and Groq use the same format. Anthropic uses a different one.
//! The request is sent and its status checked before the stream is returned,
//! so rejected calls surface as errors rather than as a failed stream.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use navigator_core::{Error, Result};

use crate::tools::ToolSpecification;
use crate::types::{ChatMessage, LLMProvider, Role};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Boxed stream type for returning different stream implementations.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// A single streamed piece of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    /// Fragment of a tool call. `name` is only present on the first fragment
    /// of each call; `arguments` is raw JSON text to append.
    ToolCall {
        index: usize,
        name: Option<String>,
        arguments: String,
    },
    Done {
        tokens_used: usize,
    },
}

/// How the model is asked to shape its output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputBinding {
    FreeText,
    /// Output must be JSON conforming to the tool's parameter schema.
    StructuredOutput(ToolSpecification),
    /// The model must call exactly this tool.
    ForcedTool(ToolSpecification),
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub binding: OutputBinding,
}

impl ModelRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f64) -> Self {
        Self {
            messages,
            temperature,
            binding: OutputBinding::FreeText,
        }
    }

    pub fn with_binding(mut self, binding: OutputBinding) -> Self {
        self.binding = binding;
        self
    }
}

/// The model provider seam.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a call and return its output as an ordered chunk stream.
    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream>;

    /// Run a call to completion and return the concatenated text.
    async fn invoke(&self, request: ModelRequest) -> Result<String> {
        let mut stream = self.stream(request).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            if let StreamChunk::Token(token) = chunk? {
                text.push_str(&token);
            }
        }
        Ok(text)
    }

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }
}

/// Create the chat model for the resolved provider, or a placeholder that
/// reports the missing configuration on use.
pub fn create_chat_model(
    client: Client,
    resolved: Option<(LLMProvider, String, String)>,
    max_tokens: usize,
) -> Arc<dyn ChatModel> {
    match resolved {
        Some((provider, model, api_key)) => {
            info!("Using {} chat model {}", provider, model);
            Arc::new(ProviderModel::new(client, provider, model, api_key).with_max_tokens(max_tokens))
        }
        None => {
            warn!("No LLM provider configured. Chat requests will fail.");
            Arc::new(UnavailableModel)
        }
    }
}

/// Placeholder used when no provider key is configured.
pub struct UnavailableModel;

#[async_trait]
impl ChatModel for UnavailableModel {
    async fn stream(&self, _request: ModelRequest) -> Result<ChunkStream> {
        Err(Error::Config("No LLM provider configured".into()))
    }

    fn provider_name(&self) -> &str {
        "none"
    }

    fn model_name(&self) -> &str {
        ""
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// HTTP streaming client for one provider/model pair.
pub struct ProviderModel {
    client: Client,
    provider: LLMProvider,
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: usize,
}

impl ProviderModel {
    pub fn new(client: Client, provider: LLMProvider, model: String, api_key: String) -> Self {
        let base_url = match provider {
            LLMProvider::OpenAI => OPENAI_BASE_URL,
            LLMProvider::Groq => GROQ_BASE_URL,
            LLMProvider::Anthropic => ANTHROPIC_BASE_URL,
        };
        Self {
            client,
            provider,
            model,
            api_key,
            base_url: base_url.into(),
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(None, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} returned {}: {}", self.provider, status, body);
            return Err(Error::provider(
                Some(status.as_u16()),
                format!("API error {}: {}", status, body),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for ProviderModel {
    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream> {
        match self.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => {
                let body = openai_request_body(&self.model, &request, self.max_tokens);
                let url = format!("{}/chat/completions", self.base_url);
                debug!("Streaming from {} with model {}", url, self.model);

                let response = self
                    .send(self.client.post(&url).bearer_auth(&self.api_key).json(&body))
                    .await?;
                Ok(Box::pin(openai_sse(response.bytes_stream())))
            }
            LLMProvider::Anthropic => {
                let structured = matches!(request.binding, OutputBinding::StructuredOutput(_));
                let body = anthropic_request_body(&self.model, &request, self.max_tokens);
                debug!("Streaming from Anthropic with model {}", self.model);

                let response = self
                    .send(
                        self.client
                            .post(format!("{}/messages", self.base_url))
                            .header("x-api-key", &self.api_key)
                            .header("anthropic-version", "2023-06-01")
                            .json(&body),
                    )
                    .await?;
                Ok(Box::pin(anthropic_sse(response.bytes_stream(), structured)))
            }
        }
    }

    fn provider_name(&self) -> &str {
        match self.provider {
            LLMProvider::OpenAI => "openai",
            LLMProvider::Anthropic => "anthropic",
            LLMProvider::Groq => "groq",
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------

fn openai_request_body(model: &str, request: &ModelRequest, max_tokens: usize) -> Value {
    let msgs: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
        .collect();

    let mut body = json!({
        "model": model,
        "messages": msgs,
        "temperature": request.temperature,
        "max_tokens": max_tokens,
        "stream": true,
    });

    match &request.binding {
        OutputBinding::FreeText => {}
        OutputBinding::StructuredOutput(tool) => {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": tool.name,
                    "description": tool.description,
                    "schema": tool.parameters,
                    "strict": true,
                },
            });
        }
        OutputBinding::ForcedTool(tool) => {
            body["tools"] = json!([{
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                },
            }]);
            body["tool_choice"] = json!({
                "type": "function",
                "function": { "name": tool.name },
            });
        }
    }

    body
}

fn anthropic_request_body(model: &str, request: &ModelRequest, max_tokens: usize) -> Value {
    // Separate system message from conversation
    let system_msg: Option<String> = request
        .messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.clone());

    let conv_msgs: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
        .collect();

    let mut body = json!({
        "model": model,
        "messages": conv_msgs,
        "temperature": request.temperature,
        "max_tokens": max_tokens,
        "stream": true,
    });

    if let Some(sys) = system_msg {
        body["system"] = json!(sys);
    }

    // No native structured output: both bindings force the tool.
    match &request.binding {
        OutputBinding::FreeText => {}
        OutputBinding::StructuredOutput(tool) | OutputBinding::ForcedTool(tool) => {
            body["tools"] = json!([{
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.parameters,
            }]);
            body["tool_choice"] = json!({ "type": "tool", "name": tool.name });
        }
    }

    body
}

// ---------------------------------------------------------------
// SSE decoding
// ---------------------------------------------------------------

/// What a single decoded SSE event asks the stream to do.
#[derive(Debug, PartialEq)]
enum EventAction {
    Emit(Vec<StreamChunk>),
    Finish,
    Fail(String),
}

/// Stream from OpenAI-compatible APIs (OpenAI, Groq).
fn openai_sse<S, B, E>(body: S) -> impl Stream<Item = Result<StreamChunk>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    sse_stream(body, |data| {
        if data.trim() == "[DONE]" {
            return EventAction::Finish;
        }
        match serde_json::from_str::<Value>(data) {
            Ok(parsed) => openai_event(&parsed),
            Err(_) => EventAction::Emit(Vec::new()),
        }
    })
}

/// Stream from Anthropic's Messages API.
fn anthropic_sse<S, B, E>(
    body: S,
    structured: bool,
) -> impl Stream<Item = Result<StreamChunk>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    sse_stream(body, move |data| match serde_json::from_str::<Value>(data) {
        Ok(parsed) => anthropic_event(&parsed, structured),
        Err(_) => EventAction::Emit(Vec::new()),
    })
}

/// Shared line-buffered SSE loop; `decode` handles each `data:` payload.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across reads decode intact.
fn sse_stream<S, B, E, F>(body: S, decode: F) -> impl Stream<Item = Result<StreamChunk>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(&str) -> EventAction + Send + 'static,
{
    async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();
        let mut token_count = 0usize;

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(Error::provider(None, format!("Stream read error: {}", e)));
                    return;
                }
            };

            buffer.extend_from_slice(bytes.as_ref());

            // Process complete SSE lines
            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                let text = String::from_utf8_lossy(&raw);
                let line = text.trim();

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                // Anthropic also sends "event: " lines; the data line carries the type.
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };

                match decode(data.trim_start()) {
                    EventAction::Emit(chunks) => {
                        for chunk in chunks {
                            token_count += 1;
                            yield Ok(chunk);
                        }
                    }
                    EventAction::Finish => {
                        yield Ok(StreamChunk::Done { tokens_used: token_count });
                        return;
                    }
                    EventAction::Fail(msg) => {
                        error!("Provider stream error: {}", msg);
                        yield Err(Error::provider(None, msg));
                        return;
                    }
                }
            }
        }

        yield Ok(StreamChunk::Done { tokens_used: token_count });
    }
}

fn openai_event(parsed: &Value) -> EventAction {
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return EventAction::Fail(msg.to_string());
    }

    let delta = &parsed["choices"][0]["delta"];
    let mut chunks = Vec::new();

    if let Some(content) = delta["content"].as_str() {
        if !content.is_empty() {
            chunks.push(StreamChunk::Token(content.to_string()));
        }
    }

    if let Some(calls) = delta["tool_calls"].as_array() {
        for (position, call) in calls.iter().enumerate() {
            let index = call["index"].as_u64().map(|i| i as usize).unwrap_or(position);
            let name = call["function"]["name"].as_str().map(str::to_string);
            let arguments = call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if name.is_some() || !arguments.is_empty() {
                chunks.push(StreamChunk::ToolCall {
                    index,
                    name,
                    arguments,
                });
            }
        }
    }

    EventAction::Emit(chunks)
}

/// Decode one Anthropic event. In structured mode the forced tool's
/// arguments are reported as plain text, like OpenAI's `json_schema` output.
fn anthropic_event(parsed: &Value, structured: bool) -> EventAction {
    let index = parsed["index"].as_u64().unwrap_or(0) as usize;

    match parsed["type"].as_str() {
        Some("content_block_start") => {
            let block = &parsed["content_block"];
            if block["type"].as_str() == Some("tool_use") && !structured {
                let name = block["name"].as_str().map(str::to_string);
                return EventAction::Emit(vec![StreamChunk::ToolCall {
                    index,
                    name,
                    arguments: String::new(),
                }]);
            }
            EventAction::Emit(Vec::new())
        }
        Some("content_block_delta") => {
            let delta = &parsed["delta"];
            match delta["type"].as_str() {
                Some("text_delta") => match delta["text"].as_str() {
                    Some(text) if !text.is_empty() => {
                        EventAction::Emit(vec![StreamChunk::Token(text.to_string())])
                    }
                    _ => EventAction::Emit(Vec::new()),
                },
                Some("input_json_delta") => {
                    let partial = delta["partial_json"].as_str().unwrap_or_default();
                    if partial.is_empty() {
                        EventAction::Emit(Vec::new())
                    } else if structured {
                        EventAction::Emit(vec![StreamChunk::Token(partial.to_string())])
                    } else {
                        EventAction::Emit(vec![StreamChunk::ToolCall {
                            index,
                            name: None,
                            arguments: partial.to_string(),
                        }])
                    }
                }
                _ => EventAction::Emit(Vec::new()),
            }
        }
        Some("message_stop") => EventAction::Finish,
        Some("error") => EventAction::Fail(
            parsed["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        ),
        _ => EventAction::Emit(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;

    fn weather_tool() -> ToolSpecification {
        ToolSpecification {
            name: "get_weather".into(),
            description: "Weather search parameters".into(),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_openai_body_forced_tool() {
        let request = ModelRequest::new(vec![ChatMessage::user("weather in Austin TX")], 0.0)
            .with_binding(OutputBinding::ForcedTool(weather_tool()));
        let body = openai_request_body("gpt-4o-mini", &request, 256);

        assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(body["tool_choice"]["function"]["name"], "get_weather");
        assert!(body.get("response_format").is_none());
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_openai_body_structured_output() {
        let request = ModelRequest::new(vec![ChatMessage::user("x")], 0.0)
            .with_binding(OutputBinding::StructuredOutput(weather_tool()));
        let body = openai_request_body("gpt-4o-mini", &request, 256);

        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_anthropic_body_moves_system_and_forces_tool() {
        let request = ModelRequest::new(
            vec![ChatMessage::system("be helpful"), ChatMessage::user("hi")],
            0.0,
        )
        .with_binding(OutputBinding::StructuredOutput(weather_tool()));
        let body = anthropic_request_body("claude", &request, 256);

        assert_eq!(body["system"], "be helpful");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "get_weather"}));
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
    }

    #[test]
    fn test_openai_event_text_and_tool_calls() {
        let text = openai_event(&json!({"choices": [{"delta": {"content": "Hel"}}]}));
        assert_eq!(text, EventAction::Emit(vec![StreamChunk::Token("Hel".into())]));

        let first = openai_event(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_1", "type": "function",
             "function": {"name": "get_weather", "arguments": ""}}
        ]}}]}));
        assert_eq!(
            first,
            EventAction::Emit(vec![StreamChunk::ToolCall {
                index: 0,
                name: Some("get_weather".into()),
                arguments: String::new(),
            }])
        );

        let next = openai_event(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "{\"city\""}}
        ]}}]}));
        assert_eq!(
            next,
            EventAction::Emit(vec![StreamChunk::ToolCall {
                index: 0,
                name: None,
                arguments: "{\"city\"".into(),
            }])
        );
    }

    #[test]
    fn test_openai_event_error_payload() {
        let action = openai_event(&json!({"error": {"message": "overloaded"}}));
        assert_eq!(action, EventAction::Fail("overloaded".into()));
    }

    #[test]
    fn test_anthropic_tool_events() {
        let start = json!({"type": "content_block_start", "index": 0,
            "content_block": {"type": "tool_use", "id": "t1", "name": "get_weather", "input": {}}});
        let delta = json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "input_json_delta", "partial_json": "{\"city\": \"Aus"}});

        assert_eq!(
            anthropic_event(&start, false),
            EventAction::Emit(vec![StreamChunk::ToolCall {
                index: 0,
                name: Some("get_weather".into()),
                arguments: String::new(),
            }])
        );
        assert_eq!(
            anthropic_event(&delta, false),
            EventAction::Emit(vec![StreamChunk::ToolCall {
                index: 0,
                name: None,
                arguments: "{\"city\": \"Aus".into(),
            }])
        );

        // Structured mode reports the same arguments as text.
        assert_eq!(anthropic_event(&start, true), EventAction::Emit(Vec::new()));
        assert_eq!(
            anthropic_event(&delta, true),
            EventAction::Emit(vec![StreamChunk::Token("{\"city\": \"Aus".into())])
        );
    }

    #[test]
    fn test_anthropic_stop_and_error() {
        assert_eq!(
            anthropic_event(&json!({"type": "message_stop"}), false),
            EventAction::Finish
        );
        assert_eq!(
            anthropic_event(
                &json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
                false
            ),
            EventAction::Fail("Overloaded".into())
        );
    }

    fn body(parts: &[&[u8]]) -> impl Stream<Item = std::result::Result<bytes::Bytes, Infallible>> {
        let parts: Vec<_> = parts
            .iter()
            .map(|p| Ok(bytes::Bytes::copy_from_slice(p)))
            .collect();
        tokio_stream::iter(parts)
    }

    async fn drain(stream: impl Stream<Item = Result<StreamChunk>>) -> Vec<Result<StreamChunk>> {
        Box::pin(stream).collect().await
    }

    #[tokio::test]
    async fn test_sse_keeps_characters_split_across_reads() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Zürich\"}}]}\n\n".as_bytes();
        let cut = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let chunks = drain(openai_sse(body(&[&line[..cut], &line[cut..], b"data: [DONE]\n"]))).await;
        let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Token("Zürich".into()),
                StreamChunk::Done { tokens_used: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_reassembles_lines_and_stops_at_done() {
        let chunks = drain(openai_sse(body(&[
            b": keep-alive\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"Hel",
            b"lo\"}}]}\r\n\r\ndata: [DO",
            b"NE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        ])))
        .await;
        let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Token("Hello".into()),
                StreamChunk::Done { tokens_used: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_anthropic_stops_at_message_stop() {
        let chunks = drain(anthropic_sse(
            body(&[
                b"event: content_block_delta\n",
                b"data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
                b"event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
            ]),
            false,
        ))
        .await;
        let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Token("Hi".into()),
                StreamChunk::Done { tokens_used: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_provider_error_event_fails_stream() {
        let chunks = drain(openai_sse(body(&[
            b"data: {\"error\":{\"message\":\"rate limited\"}}\n\n",
        ])))
        .await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], Err(Error::Provider { message, .. }) if message == "rate limited"));
    }

    #[tokio::test]
    async fn test_sse_read_error_fails_stream() {
        let parts: Vec<std::result::Result<bytes::Bytes, &'static str>> =
            vec![Ok(bytes::Bytes::from_static(b"data: {\"choices\":[")), Err("connection reset")];
        let chunks = drain(openai_sse(tokio_stream::iter(parts))).await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], Err(Error::Provider { message, .. }) if message.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_unavailable_model() {
        let model = create_chat_model(Client::new(), None, 256);
        assert!(!model.is_available());
        let err = model
            .invoke(ModelRequest::new(vec![ChatMessage::user("hi")], 0.2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
