//! Tool-invocation pipeline.
//!
//! Prompts the model with a fixed system instruction and the user's input,
//! binds it to one tool (forced tool call or structured output), and streams
//! each partial parse of the arguments to the caller.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{debug, warn, Instrument};

use navigator_core::{Error, Result};

use crate::partial_json::parse_partial_json;
use crate::providers::{ChatModel, ModelRequest, OutputBinding, StreamChunk};
use crate::stream::{StreamWriter, StreamableValue};
use crate::types::ChatMessage;

pub mod weather;

pub const TOOL_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the tools provided to best assist the user.";

const UPDATE_BUFFER: usize = 64;

/// A tool the model can be bound to. `name` is also the key results are
/// extracted under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpecification {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpecification {
    /// Derive the parameter schema from `T`.
    pub fn for_type<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut parameters = serde_json::to_value(schema_for!(T))
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        if let Value::Object(map) = &mut parameters {
            map.remove("$schema");
        }
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Caller options for [`ToolPipeline::invoke`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InvokeOptions {
    #[serde(default, rename = "forceStructuredOutput")]
    pub force_structured_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    StructuredOutput,
    ForcedTool,
}

impl From<InvokeOptions> for ExecutionMode {
    fn from(options: InvokeOptions) -> Self {
        if options.force_structured_output {
            ExecutionMode::StructuredOutput
        } else {
            ExecutionMode::ForcedTool
        }
    }
}

/// Binds a model to the tool described by `T`.
pub struct ToolPipeline<T> {
    model: Arc<dyn ChatModel>,
    spec: ToolSpecification,
    _output: PhantomData<fn() -> T>,
}

impl<T> ToolPipeline<T>
where
    T: DeserializeOwned + Serialize + JsonSchema + Send + 'static,
{
    pub fn new(model: Arc<dyn ChatModel>, spec: ToolSpecification) -> Self {
        Self {
            model,
            spec,
            _output: PhantomData,
        }
    }

    pub fn specification(&self) -> &ToolSpecification {
        &self.spec
    }

    pub fn build_request(&self, input: &str, mode: ExecutionMode) -> ModelRequest {
        let binding = match mode {
            ExecutionMode::StructuredOutput => OutputBinding::StructuredOutput(self.spec.clone()),
            ExecutionMode::ForcedTool => OutputBinding::ForcedTool(self.spec.clone()),
        };
        ModelRequest::new(
            vec![
                ChatMessage::system(TOOL_SYSTEM_PROMPT),
                ChatMessage::user(input),
            ],
            0.0,
        )
        .with_binding(binding)
    }

    /// Start the call in the background and return its streamable value.
    ///
    /// The value ends with `done` on success or an `error` marker on provider
    /// or parse failure. Dropping it stops the background task.
    pub fn invoke(&self, input: &str, options: InvokeOptions) -> StreamableValue {
        let mode = ExecutionMode::from(options);
        let request = self.build_request(input, mode);
        let model = Arc::clone(&self.model);
        let tool_name = self.spec.name.clone();
        let (writer, value) = StreamableValue::channel(UPDATE_BUFFER);

        let task = async move {
            match stream_arguments::<T>(model.as_ref(), request, mode, &tool_name, &writer).await
            {
                Ok(()) => writer.done().await,
                Err(e) => {
                    warn!("Tool pipeline for {} failed: {}", tool_name, e);
                    writer.error(&e).await;
                }
            }
        };
        tokio::spawn(task.in_current_span());

        value
    }
}

async fn stream_arguments<T>(
    model: &dyn ChatModel,
    request: ModelRequest,
    mode: ExecutionMode,
    tool_name: &str,
    writer: &StreamWriter,
) -> Result<()>
where
    T: DeserializeOwned + Serialize,
{
    let mut stream = model.stream(request).await?;
    let mut arguments = ArgumentBuffer::new(mode, tool_name);
    let mut last: Option<Value> = None;

    while let Some(chunk) = stream.next().await {
        if !arguments.push(chunk?) {
            continue;
        }
        let Some(partial) = arguments.current().and_then(parse_partial_json) else {
            continue;
        };
        if last.as_ref() == Some(&partial) {
            continue;
        }
        if !writer.update(partial.clone()).await {
            debug!("Consumer of {} went away; stopping", tool_name);
            return Ok(());
        }
        last = Some(partial);
    }

    let parsed: T = parse_arguments(arguments.current(), tool_name)?;
    let value = serde_json::to_value(&parsed)?;
    if last.as_ref() != Some(&value) {
        writer.update(value).await;
    }
    Ok(())
}

/// Strictly parse the complete argument text into `T`.
pub fn parse_arguments<T: DeserializeOwned>(text: Option<&str>, tool_name: &str) -> Result<T> {
    let text = text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Parse(format!("Model returned no {} output", tool_name)))?;

    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Parse(format!("Malformed {} arguments: {}", tool_name, e)))?;

    serde_json::from_value(value)
        .map_err(|e| Error::Parse(format!("{} arguments do not match schema: {}", tool_name, e)))
}

/// Accumulates the raw JSON text the model produces for the bound tool.
struct ArgumentBuffer<'a> {
    mode: ExecutionMode,
    tool_name: &'a str,
    text: String,
    calls: BTreeMap<usize, ToolCallBuffer>,
}

#[derive(Default)]
struct ToolCallBuffer {
    name: Option<String>,
    arguments: String,
}

impl<'a> ArgumentBuffer<'a> {
    fn new(mode: ExecutionMode, tool_name: &'a str) -> Self {
        Self {
            mode,
            tool_name,
            text: String::new(),
            calls: BTreeMap::new(),
        }
    }

    /// Record a chunk. Returns whether the bound tool's text changed.
    fn push(&mut self, chunk: StreamChunk) -> bool {
        match (self.mode, chunk) {
            (ExecutionMode::StructuredOutput, StreamChunk::Token(token)) => {
                self.text.push_str(&token);
                !token.is_empty()
            }
            (_, StreamChunk::ToolCall {
                index,
                name,
                arguments,
            }) => {
                let call = self.calls.entry(index).or_default();
                if call.name.is_none() {
                    call.name = name;
                }
                call.arguments.push_str(&arguments);
                call.name.as_deref() == Some(self.tool_name) && !arguments.is_empty()
            }
            _ => false,
        }
    }

    /// Text for the bound tool: structured text, or the first call made
    /// under the tool's name.
    fn current(&self) -> Option<&str> {
        if self.mode == ExecutionMode::StructuredOutput && !self.text.is_empty() {
            return Some(&self.text);
        }
        self.calls
            .values()
            .find(|call| call.name.as_deref() == Some(self.tool_name))
            .map(|call| call.arguments.as_str())
    }
}
