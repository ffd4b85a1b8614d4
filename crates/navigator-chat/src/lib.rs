//! Conversational retrieval and tool invocation over external LLM streaming
//! (OpenAI/Anthropic/Groq).
//!
//! Both pipelines are plain sequences of typed stages. Model output is
//! consumed as an ordered stream and forwarded to the caller chunk by chunk.

pub mod config;
pub mod observe;
pub mod partial_json;
pub mod prompts;
pub mod providers;
pub mod retrieval;
pub mod sources;
pub mod stream;
pub mod tools;
pub mod types;

pub use config::LLMConfig;
pub use providers::{ChatModel, ModelRequest, OutputBinding, StreamChunk};
pub use retrieval::{ConversationTurn, RetrievalAnswer, RetrievalPipeline};
pub use stream::{StreamUpdate, StreamableValue};
pub use tools::{ExecutionMode, InvokeOptions, ToolPipeline, ToolSpecification};
pub use types::*;
