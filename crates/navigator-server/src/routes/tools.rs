//! Tool invocation routes. Each update of the streamable value is sent as
//! one SSE event whose data is the JSON-encoded update.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::routing::post;
use axum::Router;
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use navigator_chat::tools::weather;
use navigator_chat::types::ToolInvokeRequest;
use navigator_core::Error;

use crate::error::ApiError;
use crate::state::AppState;

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tools/weather", post(invoke_weather))
}

async fn invoke_weather(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Sse<SseStream>, ApiError> {
    let span = info_span!("tool", request_id = %Uuid::new_v4(), tool = weather::NAME);
    stream_weather(state, body).instrument(span).await
}

async fn stream_weather(state: Arc<AppState>, body: Bytes) -> Result<Sse<SseStream>, ApiError> {
    let request: ToolInvokeRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))?;
    if request.input.trim().is_empty() {
        return Err(Error::Validation("Input must not be empty".into()).into());
    }
    info!(
        structured = request.options.force_structured_output,
        "Tool invocation"
    );

    let value = state.weather_pipeline().invoke(&request.input, request.options);
    let events = value.into_stream().map(|update| {
        let data = serde_json::to_string(&update).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().data(data))
    });

    let stream: SseStream = Box::pin(events);
    Ok(Sse::new(stream))
}
